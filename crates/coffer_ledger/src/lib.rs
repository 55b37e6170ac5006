//! # Coffer Ledger
//!
//! A pooled currency store: many owners' balances shown as one storage
//! endpoint, with fair insert/extract across all of them and a metered
//! gateway that turns items into currency and back.
//!
//! ## Design Principles
//!
//! 1. **Zero floating point** - Balances are arbitrary precision integers
//! 2. **Fair splits** - Every transfer is spread over shuffled accounts, with
//!    remainders handed out one unit at a time
//! 3. **Dry runs are free** - `Mode::Simulate` never touches a balance
//! 4. **No panics on bad input** - Rejections are zero returns
//!
//! ## Threading
//!
//! [`PoolService`] is single-caller. Wrap it in a [`SharedPool`] to share it
//! between threads.
//!
//! ## Example
//!
//! ```rust,ignore
//! use coffer_ledger::{
//!     AccountId, LedgerConfig, MemoryKnowledge, Mode, NullObserver, PoolService, StorageKey,
//! };
//!
//! let config = LedgerConfig::load("data/ledger.toml")?;
//! let knowledge = Box::new(MemoryKnowledge::new());
//! let mut pool = PoolService::from_config(&config, knowledge, Box::new(NullObserver));
//!
//! pool.add_account(AccountId(1));
//! pool.add_account(AccountId(2));
//! pool.insert(StorageKey::BASE, 1_000, Mode::Modulate);
//!
//! for digit in pool.available_tiers() {
//!     println!("{}: {}", digit.tier, digit.magnitude);
//! }
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod account;
pub mod codec;
pub mod config;
pub mod conversion;
pub mod distribution;
pub mod error;
pub mod key;
pub mod knowledge;
pub mod price;
pub mod service;
pub mod shared;
pub mod shuffle;

pub use account::{Account, AccountId, AccountPool};
pub use codec::{
    decode, encode, tier_limit, tier_multiplier, tier_offset, Amount, TierDigit, MAX_INSERT_TIER,
    TIER_LIMIT,
};
pub use config::LedgerConfig;
pub use conversion::{
    ActionSource, ConversionGateway, ConversionStats, ItemConversion, ItemRequest, PowerSource,
    StoredInventory, MAX_OPERATIONS,
};
pub use distribution::{DistributionEngine, ExtractScope};
pub use error::{LedgerError, LedgerResult};
pub use key::{ItemId, Mode, StorageKey, TierKey};
pub use knowledge::{KnowledgeBook, MemoryKnowledge};
pub use price::{ItemPrice, PriceError, PriceOracle, PriceTable};
pub use service::{HostContext, NullObserver, PoolObserver, PoolService};
pub use shared::SharedPool;
pub use shuffle::{ChaChaShuffle, FixedOrder, ShuffleSource};
