//! # Price Oracle
//!
//! Unit prices for items, in base-tier currency. Items may sell into the
//! pool and be bought back out of it at different rates.

use std::collections::HashMap;

use serde::Deserialize;
use thiserror::Error;

use crate::key::ItemId;

/// Failure reported by a price oracle.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PriceError {
    /// The oracle has no rate for this item.
    #[error("item {0} has no price")]
    Unpriced(ItemId),

    /// The oracle itself could not be consulted.
    #[error("price oracle unavailable: {0}")]
    Unavailable(String),
}

/// External source of conversion rates.
pub trait PriceOracle: Send {
    /// Returns true if the item can be converted at all.
    fn has_price(&self, item: ItemId) -> bool;

    /// Currency credited for one unit going into the pool.
    ///
    /// # Errors
    ///
    /// Any error is treated as an unknown price.
    fn sell_value(&self, item: ItemId) -> Result<u64, PriceError>;

    /// Currency charged for one unit coming out of the pool.
    ///
    /// # Errors
    ///
    /// Any error is treated as an unknown price.
    fn buy_value(&self, item: ItemId) -> Result<u64, PriceError>;
}

/// Sell and buy rate for one item.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
pub struct ItemPrice {
    /// Item the rates apply to.
    pub item: ItemId,
    /// Credited per unit inserted.
    pub sell: u64,
    /// Charged per unit extracted.
    pub buy: u64,
}

/// Fixed price list, usually loaded from the ledger config.
#[derive(Clone, Debug, Default)]
pub struct PriceTable {
    prices: HashMap<ItemId, ItemPrice>,
}

impl PriceTable {
    /// Creates an empty price table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the rates for an item, replacing any previous entry.
    pub fn set(&mut self, price: ItemPrice) {
        self.prices.insert(price.item, price);
    }

    /// Returns the number of priced items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.prices.len()
    }

    /// Returns true if no item is priced.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }

    fn lookup(&self, item: ItemId) -> Result<&ItemPrice, PriceError> {
        self.prices.get(&item).ok_or(PriceError::Unpriced(item))
    }
}

impl FromIterator<ItemPrice> for PriceTable {
    fn from_iter<T: IntoIterator<Item = ItemPrice>>(iter: T) -> Self {
        let mut table = Self::new();
        for price in iter {
            table.set(price);
        }
        table
    }
}

impl PriceOracle for PriceTable {
    fn has_price(&self, item: ItemId) -> bool {
        self.prices.contains_key(&item)
    }

    fn sell_value(&self, item: ItemId) -> Result<u64, PriceError> {
        self.lookup(item).map(|price| price.sell)
    }

    fn buy_value(&self, item: ItemId) -> Result<u64, PriceError> {
        self.lookup(item).map(|price| price.buy)
    }
}
