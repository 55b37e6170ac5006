//! # Distribution Engine
//!
//! Spreads inserts and extracts over every account in the pool using integer
//! arithmetic only.
//!
//! ## Insert
//!
//! ```text
//! raw = amount * LIMIT^(tier-1)
//! q, r = raw div n, raw mod n          n = pool size
//! account at shuffled position p  +=  q + (p < r ? 1 : 0)
//! ```
//!
//! ## Extract
//!
//! Each round divides the outstanding need over the accounts that still hold
//! balance. An account whose share meets or exceeds its balance is drained
//! and leaves the active set; the shortfall is picked up next round by the
//! survivors. A round either drains at least one account or satisfies the
//! whole need, so the loop ends after at most `n` rounds.
//!
//! Nothing taken from balances is ever more than was asked for, but the
//! reported figure is floored to whole units of the requested tier.

use std::collections::BTreeMap;

use num_traits::{ToPrimitive, Zero};
use tracing::trace;

use crate::account::{AccountId, AccountPool};
use crate::codec::{saturating_u64, tier_multiplier, tier_offset, Amount, MAX_INSERT_TIER};
use crate::error::{LedgerError, LedgerResult};
use crate::key::{Mode, StorageKey};
use crate::shuffle::{ChaChaShuffle, ShuffleSource};

/// Which accounts an extraction may draw from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExtractScope {
    /// Every account in the pool.
    Pool,
    /// Only the designated account.
    Account(AccountId),
}

/// Fair insert/extract over an [`AccountPool`].
pub struct DistributionEngine {
    shuffle: Box<dyn ShuffleSource>,
}

impl DistributionEngine {
    /// Creates an engine with the given ordering strategy.
    #[must_use]
    pub fn new(shuffle: Box<dyn ShuffleSource>) -> Self {
        Self { shuffle }
    }

    /// Creates an engine with a reproducible ChaCha shuffle.
    #[must_use]
    pub fn seeded(seed: u64) -> Self {
        Self::new(Box::new(ChaChaShuffle::seeded(seed)))
    }

    /// Inserts `amount` units of the tier named by `key`.
    ///
    /// Returns the units accepted. Capacity is unbounded, so a valid request
    /// is always accepted in full.
    ///
    /// # Errors
    ///
    /// `InvalidAmount` for zero, `MalformedKey` for non-tier keys,
    /// `EmptyPool` when there is nobody to credit.
    pub fn insert(
        &mut self,
        pool: &mut AccountPool,
        amount: u64,
        key: StorageKey,
        mode: Mode,
    ) -> LedgerResult<u64> {
        if amount == 0 {
            return Err(LedgerError::InvalidAmount);
        }
        let tier = key.tier()?;
        if tier.index() > MAX_INSERT_TIER {
            return Err(LedgerError::MalformedKey(format!("{tier} above insert ceiling")));
        }
        if pool.is_empty() {
            return Err(LedgerError::EmptyPool);
        }

        if mode.is_modulate() {
            let raw = Amount::from(amount) * tier_multiplier(tier);
            self.insert_raw(pool, &raw);
        }

        Ok(amount)
    }

    /// Credits exactly `raw` across the pool. No-op on an empty pool.
    pub fn insert_raw(&mut self, pool: &mut AccountPool, raw: &Amount) {
        let mut order = pool.ids();
        if order.is_empty() {
            return;
        }
        self.shuffle.shuffle(&mut order);

        let (quotient, remainder) = split(raw, order.len());
        for (position, id) in order.into_iter().enumerate() {
            pool.credit(id, &share_at(&quotient, remainder, position));
        }
    }

    /// Extracts up to `amount` units of the tier named by `key` from `scope`.
    ///
    /// Returns the whole units taken. A shortfall is not an error; compare
    /// the result against `amount`.
    ///
    /// # Errors
    ///
    /// `InvalidAmount` for zero, `MalformedKey` for non-tier keys,
    /// `UnknownAccount` for a scope naming an untracked account,
    /// `EmptyPool` when the scope holds no accounts.
    pub fn extract(
        &mut self,
        pool: &mut AccountPool,
        amount: u64,
        key: StorageKey,
        mode: Mode,
        scope: ExtractScope,
    ) -> LedgerResult<u64> {
        if amount == 0 {
            return Err(LedgerError::InvalidAmount);
        }
        let tier = key.tier()?;

        // One unit at this tier is worth more than the whole scope holds:
        // everything is drained and the floored result is zero.
        let held = scope_total(pool, scope)?;
        if tier_offset(tier) >= held.bits() {
            self.extract_raw(pool, &held, mode, scope)?;
            return Ok(0);
        }

        let multiplier = tier_multiplier(tier);
        let target = Amount::from(amount) * &multiplier;
        let extracted = self.extract_raw(pool, &target, mode, scope)?;

        Ok(saturating_u64(&(extracted / multiplier)))
    }

    /// Extracts up to `target` raw currency from `scope`.
    ///
    /// Simulate runs the same rounds against a scratch copy of the balances,
    /// so it reports exactly what Modulate would take.
    ///
    /// # Errors
    ///
    /// `UnknownAccount` or `EmptyPool`, as for [`Self::extract`].
    pub fn extract_raw(
        &mut self,
        pool: &mut AccountPool,
        target: &Amount,
        mode: Mode,
        scope: ExtractScope,
    ) -> LedgerResult<Amount> {
        let mut working: BTreeMap<AccountId, Amount> = match scope {
            ExtractScope::Pool => pool
                .snapshot()
                .into_iter()
                .map(|account| (account.id(), account.balance().clone()))
                .collect(),
            ExtractScope::Account(id) => {
                let account = pool.get(id).ok_or(LedgerError::UnknownAccount(id))?;
                BTreeMap::from([(id, account.balance().clone())])
            }
        };
        if working.is_empty() {
            return Err(LedgerError::EmptyPool);
        }

        let mut active: Vec<AccountId> = working.keys().copied().collect();
        let mut extracted = Amount::zero();
        let mut round = 0u32;

        while !active.is_empty() && extracted < *target {
            round += 1;
            self.shuffle.shuffle(&mut active);

            // Divide by the live active count, not the pool size, or the
            // shortfall left by drained accounts is never fully re-spread.
            let need = target - &extracted;
            let (quotient, remainder) = split(&need, active.len());
            let mut survivors = Vec::with_capacity(active.len());

            for (position, id) in active.iter().enumerate() {
                let Some(balance) = working.get_mut(id) else {
                    continue;
                };
                let share = share_at(&quotient, remainder, position);

                if *balance <= share {
                    extracted += &*balance;
                    balance.set_zero();
                } else {
                    *balance -= &share;
                    extracted += share;
                    survivors.push(*id);
                }
            }

            trace!(
                round,
                need = %need,
                drained = active.len() - survivors.len(),
                "extraction round"
            );
            active = survivors;
        }

        if mode.is_modulate() {
            for (id, balance) in working {
                pool.store(id, balance);
            }
        }

        Ok(extracted)
    }
}

/// Sum of the balances `scope` can draw from.
fn scope_total(pool: &AccountPool, scope: ExtractScope) -> LedgerResult<Amount> {
    match scope {
        ExtractScope::Pool => Ok(pool.gross_total()),
        ExtractScope::Account(id) => pool
            .balance(id)
            .cloned()
            .ok_or(LedgerError::UnknownAccount(id)),
    }
}

impl std::fmt::Debug for DistributionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DistributionEngine").finish_non_exhaustive()
    }
}

/// Splits `total` into `parts` near-equal shares: `(quotient, remainder)`.
fn split(total: &Amount, parts: usize) -> (Amount, usize) {
    let divisor = Amount::from(parts);
    let quotient = total / &divisor;
    // remainder < parts, always fits
    let remainder = (total % &divisor).to_usize().unwrap_or(0);
    (quotient, remainder)
}

/// Share for the account at `position`: the first `remainder` get one more.
fn share_at(quotient: &Amount, remainder: usize, position: usize) -> Amount {
    if position < remainder {
        quotient + 1u32
    } else {
        quotient.clone()
    }
}
