//! # Pool Service
//!
//! The facade the host talks to. It owns the account arena, routes storage
//! requests to the distribution engine or the conversion gateway, and tells
//! an observer when something it shows has changed.
//!
//! ## Tier notifications
//!
//! Every time the pool total is encoded (on [`PoolService::available_tiers`]
//! and after any committed change), the tier count is compared with the last
//! one seen. The observer hears about it only when the count actually moves.

use std::collections::BTreeSet;

use tracing::{debug, info};

use crate::account::{Account, AccountId, AccountPool};
use crate::codec::{encode, TierDigit};
use crate::config::LedgerConfig;
use crate::conversion::{
    ActionSource, ConversionGateway, ConversionStats, ItemConversion, ItemRequest, PowerSource,
    StoredInventory,
};
use crate::distribution::{DistributionEngine, ExtractScope};
use crate::error::LedgerResult;
use crate::key::{ItemId, Mode, StorageKey};
use crate::knowledge::KnowledgeBook;

/// Receives change notifications from the pool.
pub trait PoolObserver: Send {
    /// The number of tiers needed to show the pool total changed.
    fn tiers_changed(&mut self, _tiers: u32) {}

    /// Balances were committed and should be pushed to their owners.
    fn balances_changed(&mut self) {}

    /// An account unlocked an item.
    fn item_learned(&mut self, _account: AccountId, _item: ItemId) {}
}

/// Observer that ignores everything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullObserver;

impl PoolObserver for NullObserver {}

/// The host's power and storage, borrowed for one call.
pub struct HostContext<'a> {
    /// Pays for item conversions.
    pub power: &'a mut dyn PowerSource,
    /// Conventional storage, consulted before conjuring items.
    pub stored: &'a dyn StoredInventory,
}

/// Facade over the account pool.
pub struct PoolService {
    pool: AccountPool,
    engine: DistributionEngine,
    gateway: ConversionGateway,
    observer: Box<dyn PoolObserver>,
    /// Tier count at the last encode.
    highest_tier: u32,
    extract_from_own_balance_only: bool,
}

impl PoolService {
    /// Creates a service with an empty pool.
    #[must_use]
    pub fn new(
        engine: DistributionEngine,
        gateway: ConversionGateway,
        observer: Box<dyn PoolObserver>,
    ) -> Self {
        Self {
            pool: AccountPool::new(),
            engine,
            gateway,
            observer,
            highest_tier: 1,
            extract_from_own_balance_only: false,
        }
    }

    /// Creates a service wired from configuration.
    #[must_use]
    pub fn from_config(
        config: &LedgerConfig,
        knowledge: Box<dyn KnowledgeBook>,
        observer: Box<dyn PoolObserver>,
    ) -> Self {
        let engine = DistributionEngine::new(Box::new(config.shuffle()));
        let gateway = ConversionGateway::new(Box::new(config.price_table()), knowledge)
            .with_max_operations(config.max_operations)
            .with_power_per_currency(config.power_per_currency);

        let mut service = Self::new(engine, gateway, observer);
        service.extract_from_own_balance_only = config.extract_from_own_balance_only;
        service
    }

    /// Restricts player extractions to the player's own account.
    #[must_use]
    pub fn with_own_balance_only(mut self, enabled: bool) -> Self {
        self.extract_from_own_balance_only = enabled;
        self
    }

    /// Read access to the pool.
    #[must_use]
    pub fn pool(&self) -> &AccountPool {
        &self.pool
    }

    /// Write access to the pool, for loading persisted balances.
    pub fn pool_mut(&mut self) -> &mut AccountPool {
        &mut self.pool
    }

    /// Tier count seen at the last encode.
    #[must_use]
    pub fn highest_tier(&self) -> u32 {
        self.highest_tier
    }

    // ========================================================================
    // Topology
    // ========================================================================

    /// Starts tracking an owner. No-op if already tracked.
    pub fn add_account(&mut self, id: AccountId) -> bool {
        let added = self.pool.add(id);
        if added {
            info!(%id, accounts = self.pool.len(), "account joined pool");
        }
        added
    }

    /// Rebuilds membership from the full list of remaining owners.
    ///
    /// Returns the accounts that left so their balances can be persisted.
    pub fn on_topology_shrink<I>(&mut self, remaining: I) -> Vec<Account>
    where
        I: IntoIterator<Item = AccountId>,
    {
        let evicted = self.pool.rebuild_from(remaining);
        info!(
            evicted = evicted.len(),
            accounts = self.pool.len(),
            "account pool rebuilt"
        );
        self.refresh_tiers();
        evicted
    }

    /// Returns true if the owner is tracked.
    #[must_use]
    pub fn is_tracking(&self, id: AccountId) -> bool {
        self.pool.contains(id)
    }

    // ========================================================================
    // Knowledge
    // ========================================================================

    /// Returns true if any tracked account knows `item`.
    #[must_use]
    pub fn knows_item(&self, item: ItemId) -> bool {
        self.gateway.knows_item(&self.pool, item)
    }

    /// Every item known by any tracked account.
    #[must_use]
    pub fn known_items(&self) -> BTreeSet<ItemId> {
        self.gateway.known_items(&self.pool)
    }

    /// Conversion counters for an account.
    #[must_use]
    pub fn stats(&self, id: AccountId) -> ConversionStats {
        self.gateway.stats(id)
    }

    // ========================================================================
    // Storage surface
    // ========================================================================

    /// Encodes the pool total into tier digits.
    ///
    /// Fires `tiers_changed` if the tier count differs from the last encode.
    pub fn available_tiers(&mut self) -> Vec<TierDigit> {
        let digits = encode(&self.pool.total());
        self.observe_tier_count(digits.len());
        digits
    }

    /// Inserts currency. Returns the units accepted, zero if rejected.
    pub fn insert(&mut self, key: StorageKey, amount: u64, mode: Mode) -> u64 {
        self.try_insert(key, amount, mode).unwrap_or_else(|err| {
            debug!(?key, amount, %err, "insert rejected");
            0
        })
    }

    /// Inserts currency, reporting why a request was rejected.
    ///
    /// # Errors
    ///
    /// See [`DistributionEngine::insert`].
    pub fn try_insert(&mut self, key: StorageKey, amount: u64, mode: Mode) -> LedgerResult<u64> {
        let inserted = self.engine.insert(&mut self.pool, amount, key, mode)?;
        if mode.is_modulate() {
            self.committed();
        }
        Ok(inserted)
    }

    /// Extracts currency, or items for a player source. Returns the units
    /// delivered, zero if rejected.
    pub fn extract(
        &mut self,
        key: StorageKey,
        amount: u64,
        mode: Mode,
        source: ActionSource,
        host: &mut HostContext<'_>,
    ) -> u64 {
        self.try_extract(key, amount, mode, source, host)
            .unwrap_or_else(|err| {
                debug!(?key, amount, %err, "extract rejected");
                0
            })
    }

    /// Extracts currency or items, reporting why a request was rejected.
    ///
    /// Item keys are only served to players; anyone else gets a malformed
    /// key error.
    ///
    /// # Errors
    ///
    /// See [`DistributionEngine::extract`] and
    /// [`ConversionGateway::extract_item`].
    pub fn try_extract(
        &mut self,
        key: StorageKey,
        amount: u64,
        mode: Mode,
        source: ActionSource,
        host: &mut HostContext<'_>,
    ) -> LedgerResult<u64> {
        if let (StorageKey::Item(item), Some(_)) = (key, source.player()) {
            let request = ItemRequest {
                item,
                amount,
                mode,
                source,
            };
            return self
                .try_extract_item(request, false, host)
                .map(|conversion| conversion.units);
        }

        let scope = self.scope_for(source);
        let extracted = self
            .engine
            .extract(&mut self.pool, amount, key, mode, scope)?;
        if mode.is_modulate() {
            self.committed();
        }
        Ok(extracted)
    }

    // ========================================================================
    // Conversion
    // ========================================================================

    /// Converts items into currency. Returns the units converted.
    pub fn insert_item(
        &mut self,
        request: ItemRequest,
        may_learn: bool,
        power: &mut dyn PowerSource,
    ) -> u64 {
        self.try_insert_item(request, may_learn, power)
            .map_or_else(
                |err| {
                    debug!(
                        item = request.item,
                        amount = request.amount,
                        %err,
                        "item insert rejected"
                    );
                    0
                },
                |conversion| conversion.units,
            )
    }

    /// Converts items into currency, reporting why a request was rejected.
    ///
    /// # Errors
    ///
    /// See [`ConversionGateway::insert_item`].
    pub fn try_insert_item(
        &mut self,
        request: ItemRequest,
        may_learn: bool,
        power: &mut dyn PowerSource,
    ) -> LedgerResult<ItemConversion> {
        let conversion =
            self.gateway
                .insert_item(&mut self.engine, &mut self.pool, power, request, may_learn)?;
        self.after_conversion(request.mode, conversion);
        Ok(conversion)
    }

    /// Converts currency into items. Returns the units delivered.
    pub fn extract_item(
        &mut self,
        request: ItemRequest,
        skip_stored: bool,
        host: &mut HostContext<'_>,
    ) -> u64 {
        self.try_extract_item(request, skip_stored, host)
            .map_or_else(
                |err| {
                    debug!(
                        item = request.item,
                        amount = request.amount,
                        %err,
                        "item extract rejected"
                    );
                    0
                },
                |conversion| conversion.units,
            )
    }

    /// Converts currency into items, reporting why a request was rejected.
    ///
    /// # Errors
    ///
    /// See [`ConversionGateway::extract_item`].
    pub fn try_extract_item(
        &mut self,
        request: ItemRequest,
        skip_stored: bool,
        host: &mut HostContext<'_>,
    ) -> LedgerResult<ItemConversion> {
        let scope = self.scope_for(request.source);
        let conversion = self.gateway.extract_item(
            &mut self.engine,
            &mut self.pool,
            &mut *host.power,
            host.stored,
            request,
            scope,
            skip_stored,
        )?;
        self.after_conversion(request.mode, conversion);
        Ok(conversion)
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn scope_for(&self, source: ActionSource) -> ExtractScope {
        match source.player() {
            Some(player) if self.extract_from_own_balance_only => ExtractScope::Account(player),
            _ => ExtractScope::Pool,
        }
    }

    fn after_conversion(&mut self, mode: Mode, conversion: ItemConversion) {
        if !mode.is_modulate() {
            return;
        }
        if conversion.units > 0 {
            self.committed();
        }
        if let Some((account, item)) = conversion.learned {
            info!(%account, item, "item learned");
            self.observer.item_learned(account, item);
        }
    }

    /// Balances changed: ask for a sync and recheck the tier count.
    fn committed(&mut self) {
        self.observer.balances_changed();
        self.refresh_tiers();
    }

    fn refresh_tiers(&mut self) {
        let tiers = encode(&self.pool.total()).len();
        self.observe_tier_count(tiers);
    }

    fn observe_tier_count(&mut self, tiers: usize) {
        let tiers = u32::try_from(tiers).unwrap_or(u32::MAX);
        if tiers != self.highest_tier {
            debug!(from = self.highest_tier, to = tiers, "tier count changed");
            self.highest_tier = tiers;
            self.observer.tiers_changed(tiers);
        }
    }
}

impl std::fmt::Debug for PoolService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoolService")
            .field("accounts", &self.pool.len())
            .field("highest_tier", &self.highest_tier)
            .field("extract_from_own_balance_only", &self.extract_from_own_balance_only)
            .finish_non_exhaustive()
    }
}
