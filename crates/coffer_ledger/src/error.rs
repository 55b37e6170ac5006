//! # Ledger Error Types
//!
//! Every reason a pool operation can be turned away.
//!
//! None of these are fatal. The public [`PoolService`](crate::PoolService)
//! calls fold them into a zero return; the `try_*` variants hand them back so
//! callers and tests can tell the cases apart.

use thiserror::Error;

use crate::account::AccountId;
use crate::key::ItemId;

/// Errors that can occur in the ledger.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// Requested a transfer of zero units.
    #[error("invalid amount: transfers must move at least one unit")]
    InvalidAmount,

    /// The storage key does not address anything this operation handles.
    #[error("malformed storage key: {0}")]
    MalformedKey(String),

    /// No accounts are available to take part in the operation.
    #[error("account pool is empty")]
    EmptyPool,

    /// The designated account is not part of the pool.
    #[error("account not tracked by this pool: {0}")]
    UnknownAccount(AccountId),

    /// The item has no conversion rate, or the price oracle failed.
    #[error("no price available for item {0}")]
    UnknownPrice(ItemId),

    /// Nobody in the pool has learned the item and learning is not allowed.
    #[error("item {0} has not been learned")]
    NotLearned(ItemId),

    /// The caller is not acting through the conversion terminal.
    #[error("conversion is only available through the transmutation terminal")]
    AccessDenied,

    /// The item is already held in conventional storage.
    #[error("item {0} is already stored")]
    AlreadyStored(ItemId),

    /// Invalid configuration file.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type for ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;
