//! # Storage Keys
//!
//! What a caller can ask the pool for: currency at a given tier, or an item
//! that the conversion gateway turns into (or out of) currency.

use std::fmt;
use std::num::NonZeroU32;

use crate::error::{LedgerError, LedgerResult};

/// Unique identifier for an item type.
pub type ItemId = u32;

/// Execution mode for any pool operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Mode {
    /// Dry run. Reports what would happen, changes nothing.
    Simulate,
    /// Commits the operation.
    Modulate,
}

impl Mode {
    /// Returns true if this mode commits changes.
    #[inline]
    #[must_use]
    pub const fn is_modulate(self) -> bool {
        matches!(self, Self::Modulate)
    }
}

/// A validated currency tier, always `>= 1`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TierKey(NonZeroU32);

impl TierKey {
    /// Tier 1, the unscaled currency unit.
    pub const BASE: Self = Self(NonZeroU32::MIN);

    /// Creates a tier key, or `None` for tier 0.
    #[inline]
    #[must_use]
    pub const fn new(index: u32) -> Option<Self> {
        match NonZeroU32::new(index) {
            Some(index) => Some(Self(index)),
            None => None,
        }
    }

    /// Returns the 1-based tier index.
    #[inline]
    #[must_use]
    pub const fn index(self) -> u32 {
        self.0.get()
    }

    /// Returns the tier above this one.
    #[inline]
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

impl fmt::Display for TierKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tier {}", self.0)
    }
}

/// A key addressed to the pool's storage surface.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StorageKey {
    /// Currency at the given tier. Tier 0 is malformed.
    Tier(u32),
    /// A convertible item.
    Item(ItemId),
}

impl StorageKey {
    /// Currency at tier 1.
    pub const BASE: Self = Self::Tier(1);

    /// Validates this key as a currency tier.
    ///
    /// # Errors
    ///
    /// Returns `MalformedKey` for item keys and for tier 0.
    pub fn tier(self) -> LedgerResult<TierKey> {
        match self {
            Self::Tier(index) => TierKey::new(index)
                .ok_or_else(|| LedgerError::MalformedKey("tier 0".to_string())),
            Self::Item(item) => Err(LedgerError::MalformedKey(format!("item {item}"))),
        }
    }
}

impl From<TierKey> for StorageKey {
    fn from(tier: TierKey) -> Self {
        Self::Tier(tier.index())
    }
}
