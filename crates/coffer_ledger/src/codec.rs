//! # Tier Codec
//!
//! Pool totals are unbounded, but storage surfaces count in 64-bit slots.
//! A total is therefore shown as positional digits in base [`TIER_LIMIT`]:
//!
//! ```text
//! total = m(1) + m(2) * LIMIT + m(3) * LIMIT^2 + ...      0 <= m(t) < LIMIT
//! ```
//!
//! Each digit is reported as a separate "tier" key. The encoding is minimal
//! (no leading zero tiers) except that zero itself encodes as `[(1, 0)]`.

use num_bigint::BigUint;
use num_traits::{ToPrimitive, Zero};

use crate::key::TierKey;

/// Arbitrary precision, never negative.
pub type Amount = BigUint;

/// Base of the tier encoding: one more than `i64::MAX`.
pub const TIER_LIMIT: u64 = 1 << 63;

/// One digit of an encoded total.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TierDigit {
    /// Which tier this digit belongs to.
    pub tier: TierKey,
    /// Magnitude at this tier, always `< TIER_LIMIT`.
    pub magnitude: u64,
}

/// Returns [`TIER_LIMIT`] as an [`Amount`].
#[inline]
#[must_use]
pub fn tier_limit() -> Amount {
    Amount::from(TIER_LIMIT)
}

/// Highest tier currency can be inserted at. One unit there is an integer
/// of roughly 64 KiB.
pub const MAX_INSERT_TIER: u32 = 1 << 13;

/// Bit position of one unit at `tier`: `63 * (tier-1)`.
#[inline]
#[must_use]
pub fn tier_offset(tier: TierKey) -> u64 {
    u64::from(TIER_LIMIT.trailing_zeros()) * u64::from(tier.index() - 1)
}

/// Raw value of one unit at `tier`: `LIMIT^(tier-1)`.
#[must_use]
pub fn tier_multiplier(tier: TierKey) -> Amount {
    Amount::from(1u32) << tier_offset(tier)
}

/// Splits `total` into tier digits, lowest tier first.
#[must_use]
pub fn encode(total: &Amount) -> Vec<TierDigit> {
    let limit = tier_limit();
    let mut rest = total.clone();
    let mut tier = TierKey::BASE;
    let mut digits = Vec::with_capacity(1);

    while rest >= limit {
        digits.push(TierDigit {
            tier,
            magnitude: saturating_u64(&(&rest % &limit)),
        });
        rest /= &limit;
        tier = tier.next();
    }

    digits.push(TierDigit {
        tier,
        magnitude: saturating_u64(&rest),
    });
    digits
}

/// Reassembles a total from tier digits.
///
/// Digits may come in any order; repeated tiers are summed.
#[must_use]
pub fn decode(digits: &[TierDigit]) -> Amount {
    digits.iter().fold(Amount::zero(), |acc, digit| {
        acc + Amount::from(digit.magnitude) * tier_multiplier(digit.tier)
    })
}

/// Narrows an amount to `u64`, clamping at `u64::MAX`.
#[inline]
#[must_use]
pub(crate) fn saturating_u64(value: &Amount) -> u64 {
    value.to_u64().unwrap_or(u64::MAX)
}
