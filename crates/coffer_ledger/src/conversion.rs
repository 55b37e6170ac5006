//! # Conversion Gateway
//!
//! Trades discrete items for pool currency at a fixed unit price.
//!
//! ## Metering
//!
//! Every call moves at most `max_operations` units, one at a time. On
//! Modulate each unit must first be paid for in power:
//!
//! ```text
//! for unit in 0..min(amount, max_operations):
//!     available = power.probe(cost)        // dry run
//!     if available < cost: stop            // full unit or nothing
//!     power.commit(cost)                   // never more than probed
//!     move one unit price of currency
//! ```
//!
//! Simulate commits nothing, so each unit instead probes for the running
//! total `cost * (k + 1)`. A dry run therefore reports what a commit with the
//! same budget would move.

use std::collections::{BTreeMap, BTreeSet};

use num_traits::Zero;
use tracing::debug;

use crate::account::{AccountId, AccountPool};
use crate::codec::Amount;
use crate::distribution::{DistributionEngine, ExtractScope};
use crate::error::{LedgerError, LedgerResult};
use crate::key::{ItemId, Mode};
use crate::knowledge::KnowledgeBook;
use crate::price::{PriceError, PriceOracle};

/// Default cap on units moved by a single conversion call.
pub const MAX_OPERATIONS: u32 = 96;

/// External power budget that pays for conversions.
pub trait PowerSource {
    /// Returns how much of `max` could be drawn right now. Draws nothing.
    fn probe(&self, max: u64) -> u64;

    /// Draws `amount`. Callers never commit more than the last probe.
    fn commit(&mut self, amount: u64);
}

/// External view of conventional (physical) storage.
pub trait StoredInventory {
    /// Units of `item` currently held outside the pool.
    fn stored_count(&self, item: ItemId) -> u64;
}

impl StoredInventory for BTreeMap<ItemId, u64> {
    fn stored_count(&self, item: ItemId) -> u64 {
        self.get(&item).copied().unwrap_or(0)
    }
}

/// Who started an operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ActionSource {
    /// A player acting on their own behalf.
    Player {
        /// The player's account.
        account: AccountId,
        /// True when acting through the transmutation terminal.
        at_terminal: bool,
    },
    /// An automated machine.
    Machine {
        /// Account of the machine's owner.
        owner: AccountId,
    },
    /// No identifiable initiator.
    Anonymous,
}

impl ActionSource {
    /// The account behind this source, if any.
    #[must_use]
    pub const fn account(self) -> Option<AccountId> {
        match self {
            Self::Player { account, .. } => Some(account),
            Self::Machine { owner } => Some(owner),
            Self::Anonymous => None,
        }
    }

    /// The player's account, if a player started the operation.
    #[must_use]
    pub const fn player(self) -> Option<AccountId> {
        match self {
            Self::Player { account, .. } => Some(account),
            _ => None,
        }
    }
}

/// One item conversion request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ItemRequest {
    /// Item being converted.
    pub item: ItemId,
    /// Units requested.
    pub amount: u64,
    /// Commit or dry run.
    pub mode: Mode,
    /// Who asked.
    pub source: ActionSource,
}

/// Result of a successful conversion call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ItemConversion {
    /// Units actually converted.
    pub units: u64,
    /// Set when this call unlocked the item for an account.
    pub learned: Option<(AccountId, ItemId)>,
}

/// Per-account conversion counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ConversionStats {
    /// Items fed into the pool.
    pub items_inserted: u64,
    /// Items pulled out of the pool.
    pub items_extracted: u64,
}

/// Item <-> currency conversion with a per-call cap and power metering.
pub struct ConversionGateway {
    prices: Box<dyn PriceOracle>,
    knowledge: Box<dyn KnowledgeBook>,
    max_operations: u32,
    /// Power drawn per unit of currency moved. Zero disables metering.
    power_per_currency: u64,
    stats: BTreeMap<AccountId, ConversionStats>,
}

impl ConversionGateway {
    /// Creates a gateway with the default cap and one power per currency.
    #[must_use]
    pub fn new(prices: Box<dyn PriceOracle>, knowledge: Box<dyn KnowledgeBook>) -> Self {
        Self {
            prices,
            knowledge,
            max_operations: MAX_OPERATIONS,
            power_per_currency: 1,
            stats: BTreeMap::new(),
        }
    }

    /// Sets the per-call unit cap.
    #[must_use]
    pub fn with_max_operations(mut self, max_operations: u32) -> Self {
        self.max_operations = max_operations;
        self
    }

    /// Sets the power drawn per unit of currency.
    #[must_use]
    pub fn with_power_per_currency(mut self, power_per_currency: u64) -> Self {
        self.power_per_currency = power_per_currency;
        self
    }

    /// Returns the per-call unit cap.
    #[must_use]
    pub const fn max_operations(&self) -> u32 {
        self.max_operations
    }

    /// Returns the knowledge collaborator.
    #[must_use]
    pub fn knowledge(&self) -> &dyn KnowledgeBook {
        self.knowledge.as_ref()
    }

    /// Returns conversion counters for an account.
    #[must_use]
    pub fn stats(&self, account: AccountId) -> ConversionStats {
        self.stats.get(&account).copied().unwrap_or_default()
    }

    /// Returns true if any tracked account knows `item`.
    #[must_use]
    pub fn knows_item(&self, pool: &AccountPool, item: ItemId) -> bool {
        pool.ids()
            .into_iter()
            .any(|account| self.knowledge.has_knowledge(account, item))
    }

    /// Union of every tracked account's known items.
    #[must_use]
    pub fn known_items(&self, pool: &AccountPool) -> BTreeSet<ItemId> {
        pool.ids()
            .into_iter()
            .flat_map(|account| self.knowledge.known_items(account))
            .collect()
    }

    /// Converts items into currency spread over the pool.
    ///
    /// With `may_learn`, an item nobody knows yet is accepted and, on
    /// Modulate, unlocked for the initiating account.
    ///
    /// # Errors
    ///
    /// `InvalidAmount`, `EmptyPool`, `NotLearned`, `UnknownPrice`, or
    /// `UnknownAccount` when a learning source is not part of the pool.
    pub fn insert_item(
        &mut self,
        engine: &mut DistributionEngine,
        pool: &mut AccountPool,
        power: &mut dyn PowerSource,
        request: ItemRequest,
        may_learn: bool,
    ) -> LedgerResult<ItemConversion> {
        let ItemRequest {
            item,
            amount,
            mode,
            source,
        } = request;

        if amount == 0 {
            return Err(LedgerError::InvalidAmount);
        }
        if pool.is_empty() {
            return Err(LedgerError::EmptyPool);
        }
        if !may_learn && !self.knows_item(pool, item) {
            return Err(LedgerError::NotLearned(item));
        }
        let price = self.price(item, |prices| prices.sell_value(item))?;

        let learner = match source.account() {
            Some(account) if may_learn && !pool.contains(account) => {
                return Err(LedgerError::UnknownAccount(account));
            }
            account if may_learn => account,
            _ => None,
        };

        let unit = Amount::from(price);
        let cost = self.power_cost(price);
        let mut inserted = 0u64;

        for _ in 0..self.unit_limit(amount) {
            if mode.is_modulate() {
                if !draw_power(power, cost) {
                    break;
                }
                engine.insert_raw(pool, &unit);
            } else if !can_afford(power, cost, inserted + 1) {
                break;
            }
            inserted += 1;
        }

        let mut conversion = ItemConversion {
            units: inserted,
            learned: None,
        };
        if !mode.is_modulate() || inserted == 0 {
            return Ok(conversion);
        }

        if let Some(player) = source.player() {
            self.stats.entry(player).or_default().items_inserted += inserted;
        }
        if let Some(account) = learner {
            if !self.knowledge.has_knowledge(account, item) {
                self.knowledge.add_knowledge(account, item);
                conversion.learned = Some((account, item));
            }
        }

        Ok(conversion)
    }

    /// Converts pool currency into items.
    ///
    /// # Errors
    ///
    /// `AccessDenied` for a player away from the terminal, `InvalidAmount`,
    /// `NotLearned`, `AlreadyStored` unless `skip_stored`, `UnknownPrice`,
    /// and the scope errors of [`DistributionEngine::extract_raw`].
    #[allow(clippy::too_many_arguments)]
    pub fn extract_item(
        &mut self,
        engine: &mut DistributionEngine,
        pool: &mut AccountPool,
        power: &mut dyn PowerSource,
        stored: &dyn StoredInventory,
        request: ItemRequest,
        scope: ExtractScope,
        skip_stored: bool,
    ) -> LedgerResult<ItemConversion> {
        let ItemRequest {
            item,
            amount,
            mode,
            source,
        } = request;

        if let ActionSource::Player {
            at_terminal: false, ..
        } = source
        {
            return Err(LedgerError::AccessDenied);
        }
        if amount == 0 {
            return Err(LedgerError::InvalidAmount);
        }
        if !self.knows_item(pool, item) {
            return Err(LedgerError::NotLearned(item));
        }
        if !skip_stored && stored.stored_count(item) > 0 {
            return Err(LedgerError::AlreadyStored(item));
        }
        let price = self.price(item, |prices| prices.buy_value(item))?;

        let unit = Amount::from(price);
        let cost = self.power_cost(price);
        let mut extracted = 0u64;

        for _ in 0..self.unit_limit(amount) {
            if mode.is_modulate() {
                let available = engine.extract_raw(pool, &unit, Mode::Simulate, scope)?;
                if available < unit || !draw_power(power, cost) {
                    break;
                }
                engine.extract_raw(pool, &unit, Mode::Modulate, scope)?;
            } else {
                // Nothing is committed, so check the running total instead.
                let wanted = &unit * (extracted + 1);
                if engine.extract_raw(pool, &wanted, Mode::Simulate, scope)? < wanted
                    || !can_afford(power, cost, extracted + 1)
                {
                    break;
                }
            }
            extracted += 1;
        }

        if mode.is_modulate() && extracted > 0 {
            if let Some(player) = source.player() {
                self.stats.entry(player).or_default().items_extracted += extracted;
            }
        }

        Ok(ItemConversion {
            units: extracted,
            learned: None,
        })
    }

    /// Units this call may move.
    fn unit_limit(&self, amount: u64) -> u64 {
        amount.min(u64::from(self.max_operations))
    }

    fn power_cost(&self, price: u64) -> u64 {
        price.saturating_mul(self.power_per_currency)
    }

    /// Looks up a usable price. Missing, zero, and failed lookups all count
    /// as unknown.
    fn price<F>(&self, item: ItemId, lookup: F) -> LedgerResult<u64>
    where
        F: FnOnce(&dyn PriceOracle) -> Result<u64, PriceError>,
    {
        if !self.prices.has_price(item) {
            return Err(LedgerError::UnknownPrice(item));
        }
        match lookup(self.prices.as_ref()) {
            Ok(price) if !price.is_zero() => Ok(price),
            Ok(_) => Err(LedgerError::UnknownPrice(item)),
            Err(err) => {
                debug!(item, %err, "price lookup failed");
                Err(LedgerError::UnknownPrice(item))
            }
        }
    }
}

impl std::fmt::Debug for ConversionGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversionGateway")
            .field("max_operations", &self.max_operations)
            .field("power_per_currency", &self.power_per_currency)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

/// Dry-run check that `units` conversions at `cost` each could be paid for.
fn can_afford(power: &dyn PowerSource, cost: u64, units: u64) -> bool {
    if cost == 0 {
        return true;
    }
    match cost.checked_mul(units) {
        Some(total) => power.probe(total) >= total,
        None => false,
    }
}

/// Probes for `cost` and commits it only if the whole amount is available.
fn draw_power(power: &mut dyn PowerSource, cost: u64) -> bool {
    if cost == 0 {
        return true;
    }
    let available = power.probe(cost);
    if available < cost {
        return false;
    }
    power.commit(cost.min(available));
    true
}
