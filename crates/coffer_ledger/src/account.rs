//! # Account Pool
//!
//! Arena of owner identity -> balance.
//!
//! Membership is driven from outside: the topology adds identities as owners
//! join, and on any departure hands over the full remaining list, which
//! replaces the arena wholesale (see [`AccountPool::rebuild_from`]).

use std::collections::BTreeMap;
use std::fmt;

use num_traits::Zero;

use crate::codec::Amount;
use crate::error::{LedgerError, LedgerResult};

/// Opaque owner identity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AccountId(pub u64);

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "account#{}", self.0)
    }
}

/// One owner's balance in the pool.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Account {
    id: AccountId,
    balance: Amount,
    /// Set when this owner's balance is already counted through another
    /// member (e.g. a shared team balance).
    shares_balance: bool,
}

impl Account {
    /// Creates an empty account.
    #[must_use]
    pub fn new(id: AccountId) -> Self {
        Self {
            id,
            balance: Amount::zero(),
            shares_balance: false,
        }
    }

    /// Returns the owner identity.
    #[inline]
    #[must_use]
    pub const fn id(&self) -> AccountId {
        self.id
    }

    /// Returns the current balance.
    #[inline]
    #[must_use]
    pub const fn balance(&self) -> &Amount {
        &self.balance
    }

    /// Returns true if this balance is counted through another member.
    #[inline]
    #[must_use]
    pub const fn shares_balance(&self) -> bool {
        self.shares_balance
    }
}

/// Registry of all accounts participating in the pool.
///
/// Iteration order is stable (by identity) so that a seeded shuffle
/// reproduces the same permutation.
#[derive(Clone, Debug, Default)]
pub struct AccountPool {
    accounts: BTreeMap<AccountId, Account>,
}

impl AccountPool {
    /// Creates an empty pool.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an account. Returns false if it was already present.
    pub fn add(&mut self, id: AccountId) -> bool {
        if self.accounts.contains_key(&id) {
            return false;
        }
        self.accounts.insert(id, Account::new(id));
        true
    }

    /// Replaces the whole membership with `ids`.
    ///
    /// Identities that stay keep their balance; everything else is dropped
    /// and handed back so the caller can persist it.
    pub fn rebuild_from<I>(&mut self, ids: I) -> Vec<Account>
    where
        I: IntoIterator<Item = AccountId>,
    {
        let mut previous = std::mem::take(&mut self.accounts);

        for id in ids {
            if self.accounts.contains_key(&id) {
                continue;
            }
            let account = previous.remove(&id).unwrap_or_else(|| Account::new(id));
            self.accounts.insert(id, account);
        }

        previous.into_values().collect()
    }

    /// Returns an owned copy of every account.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Account> {
        self.accounts.values().cloned().collect()
    }

    /// Returns every tracked identity.
    #[must_use]
    pub fn ids(&self) -> Vec<AccountId> {
        self.accounts.keys().copied().collect()
    }

    /// Sums every balance not already counted through another member.
    #[must_use]
    pub fn total(&self) -> Amount {
        self.accounts
            .values()
            .filter(|account| !account.shares_balance)
            .fold(Amount::zero(), |acc, account| acc + &account.balance)
    }

    /// Sum of every balance, shared ones included.
    #[must_use]
    pub fn gross_total(&self) -> Amount {
        self.accounts
            .values()
            .fold(Amount::zero(), |acc, account| acc + &account.balance)
    }

    /// Returns true if the identity is tracked.
    #[inline]
    #[must_use]
    pub fn contains(&self, id: AccountId) -> bool {
        self.accounts.contains_key(&id)
    }

    /// Returns the number of accounts.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    /// Returns true if there are no accounts.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    /// Gets an account.
    #[must_use]
    pub fn get(&self, id: AccountId) -> Option<&Account> {
        self.accounts.get(&id)
    }

    /// Gets an account's balance.
    #[must_use]
    pub fn balance(&self, id: AccountId) -> Option<&Amount> {
        self.accounts.get(&id).map(Account::balance)
    }

    /// Overwrites an account's balance (used when loading from storage).
    ///
    /// # Errors
    ///
    /// Returns `UnknownAccount` if the identity is not tracked.
    pub fn set_balance(&mut self, id: AccountId, balance: Amount) -> LedgerResult<()> {
        let account = self
            .accounts
            .get_mut(&id)
            .ok_or(LedgerError::UnknownAccount(id))?;
        account.balance = balance;
        Ok(())
    }

    /// Marks whether an account's balance is counted through another member.
    ///
    /// # Errors
    ///
    /// Returns `UnknownAccount` if the identity is not tracked.
    pub fn set_shares_balance(&mut self, id: AccountId, shares: bool) -> LedgerResult<()> {
        let account = self
            .accounts
            .get_mut(&id)
            .ok_or(LedgerError::UnknownAccount(id))?;
        account.shares_balance = shares;
        Ok(())
    }

    /// Adds `amount` to an account. Unknown identities are ignored.
    pub(crate) fn credit(&mut self, id: AccountId, amount: &Amount) {
        if let Some(account) = self.accounts.get_mut(&id) {
            account.balance += amount;
        }
    }

    /// Stores a freshly computed balance. Unknown identities are ignored.
    pub(crate) fn store(&mut self, id: AccountId, balance: Amount) {
        if let Some(account) = self.accounts.get_mut(&id) {
            account.balance = balance;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool_of(ids: &[u64]) -> AccountPool {
        let mut pool = AccountPool::new();
        for &id in ids {
            pool.add(AccountId(id));
        }
        pool
    }

    #[test]
    fn test_add_is_idempotent() {
        let mut pool = AccountPool::new();
        assert!(pool.add(AccountId(1)));
        pool.set_balance(AccountId(1), Amount::from(40u32)).unwrap();

        assert!(!pool.add(AccountId(1)));
        assert_eq!(pool.len(), 1);
        assert_eq!(pool.balance(AccountId(1)), Some(&Amount::from(40u32)));
    }

    #[test]
    fn test_rebuild_keeps_survivors_and_returns_evicted() {
        let mut pool = pool_of(&[1, 2, 3]);
        pool.set_balance(AccountId(1), Amount::from(10u32)).unwrap();
        pool.set_balance(AccountId(2), Amount::from(20u32)).unwrap();

        let evicted = pool.rebuild_from([AccountId(1), AccountId(3), AccountId(4)]);

        assert_eq!(pool.ids(), vec![AccountId(1), AccountId(3), AccountId(4)]);
        assert_eq!(pool.balance(AccountId(1)), Some(&Amount::from(10u32)));
        assert_eq!(evicted.len(), 1);
        assert_eq!(evicted[0].id(), AccountId(2));
        assert_eq!(evicted[0].balance(), &Amount::from(20u32));
    }

    #[test]
    fn test_total_skips_shared_balances() {
        let mut pool = pool_of(&[1, 2]);
        pool.set_balance(AccountId(1), Amount::from(7u32)).unwrap();
        pool.set_balance(AccountId(2), Amount::from(5u32)).unwrap();
        assert_eq!(pool.total(), Amount::from(12u32));

        pool.set_shares_balance(AccountId(2), true).unwrap();
        assert_eq!(pool.total(), Amount::from(7u32));
        assert_eq!(pool.gross_total(), Amount::from(12u32));
    }

    #[test]
    fn test_snapshot_is_detached() {
        let mut pool = pool_of(&[1]);
        let snapshot = pool.snapshot();
        pool.set_balance(AccountId(1), Amount::from(3u32)).unwrap();
        assert!(snapshot[0].balance().is_zero());
    }

    #[test]
    fn test_unknown_account() {
        let mut pool = AccountPool::new();
        assert_eq!(
            pool.set_balance(AccountId(9), Amount::zero()),
            Err(LedgerError::UnknownAccount(AccountId(9)))
        );
    }
}
