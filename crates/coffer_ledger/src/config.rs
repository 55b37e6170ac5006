//! # Ledger Configuration
//!
//! Tunables are loaded once at startup from a TOML file:
//!
//! ```toml
//! max_operations = 96
//! power_per_currency = 1
//! extract_from_own_balance_only = false
//! shuffle_seed = 1234            # omit for OS entropy
//!
//! [[prices]]
//! item = 265
//! sell = 256
//! buy = 256
//! ```
//!
//! Missing fields fall back to [`LedgerConfig::default`].

use std::collections::HashSet;
use std::path::Path;

use serde::Deserialize;

use crate::conversion::MAX_OPERATIONS;
use crate::error::{LedgerError, LedgerResult};
use crate::price::{ItemPrice, PriceTable};
use crate::shuffle::ChaChaShuffle;

/// Ledger tunables.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LedgerConfig {
    /// Cap on units moved by one conversion call.
    pub max_operations: u32,
    /// Power drawn per unit of currency converted. Zero disables metering.
    pub power_per_currency: u64,
    /// When set, player extractions only draw from the player's own account.
    pub extract_from_own_balance_only: bool,
    /// Fixed shuffle seed. `None` seeds from OS entropy.
    pub shuffle_seed: Option<u64>,
    /// Fixed item prices.
    pub prices: Vec<ItemPrice>,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            max_operations: MAX_OPERATIONS,
            power_per_currency: 1,
            extract_from_own_balance_only: false,
            shuffle_seed: None,
            prices: Vec::new(),
        }
    }
}

impl LedgerConfig {
    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` on syntax errors, unknown fields, a zero
    /// operation cap, or an item priced twice.
    pub fn from_toml_str(source: &str) -> LedgerResult<Self> {
        let config: Self =
            toml::from_str(source).map_err(|e| LedgerError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if the file cannot be read or is invalid.
    pub fn load(path: impl AsRef<Path>) -> LedgerResult<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)
            .map_err(|e| LedgerError::InvalidConfig(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&source)
    }

    /// Checks cross-field constraints.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` describing the first violation.
    pub fn validate(&self) -> LedgerResult<()> {
        if self.max_operations == 0 {
            return Err(LedgerError::InvalidConfig(
                "max_operations must be at least 1".to_string(),
            ));
        }

        let mut seen = HashSet::with_capacity(self.prices.len());
        for price in &self.prices {
            if !seen.insert(price.item) {
                return Err(LedgerError::InvalidConfig(format!(
                    "item {} is priced more than once",
                    price.item
                )));
            }
        }
        Ok(())
    }

    /// Builds the configured price list.
    #[must_use]
    pub fn price_table(&self) -> PriceTable {
        self.prices.iter().copied().collect()
    }

    /// Builds the configured shuffle source.
    #[must_use]
    pub fn shuffle(&self) -> ChaChaShuffle {
        self.shuffle_seed
            .map_or_else(ChaChaShuffle::from_entropy, ChaChaShuffle::seeded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::price::PriceOracle;

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = LedgerConfig::from_toml_str("").unwrap();
        assert_eq!(config, LedgerConfig::default());
        assert_eq!(config.max_operations, 96);
    }

    #[test]
    fn test_full_document() {
        let config = LedgerConfig::from_toml_str(
            r#"
            max_operations = 8
            power_per_currency = 2
            extract_from_own_balance_only = true
            shuffle_seed = 77

            [[prices]]
            item = 1
            sell = 32
            buy = 40
            "#,
        )
        .unwrap();

        assert_eq!(config.max_operations, 8);
        assert!(config.extract_from_own_balance_only);
        assert_eq!(config.shuffle_seed, Some(77));
        assert_eq!(config.price_table().buy_value(1), Ok(40));
    }

    #[test]
    fn test_rejects_zero_cap() {
        assert!(matches!(
            LedgerConfig::from_toml_str("max_operations = 0"),
            Err(LedgerError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_rejects_duplicate_price() {
        let result = LedgerConfig::from_toml_str(
            r#"
            [[prices]]
            item = 1
            sell = 1
            buy = 1

            [[prices]]
            item = 1
            sell = 2
            buy = 2
            "#,
        );
        assert!(matches!(result, Err(LedgerError::InvalidConfig(_))));
    }

    #[test]
    fn test_rejects_unknown_field() {
        assert!(LedgerConfig::from_toml_str("max_ops = 3").is_err());
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            LedgerConfig::load("/nonexistent/coffer.toml"),
            Err(LedgerError::InvalidConfig(_))
        ));
    }
}
