//! Configuration management for the pair rotator.
//!
//! Loads settings from environment variables and config files. The runtime
//! reloads the configuration at the top of every cycle so threshold or pair
//! edits take effect without a restart; each cycle works from the immutable
//! snapshot it was handed.

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Quote currency every pair trades against (e.g. USDT)
    #[serde(default = "default_stable_asset")]
    pub stable_asset: String,
    /// Compute and report rotations without submitting orders
    #[serde(default = "default_simulate")]
    pub simulate: bool,
    /// Seconds between rebalance cycles
    #[serde(default = "default_check_interval_secs")]
    pub check_interval_secs: u64,
    /// Coin whose price against the stable asset is shown each cycle
    #[serde(default = "default_reference_coin")]
    pub reference_coin: String,
    /// Path to the SQLite pair state database
    #[serde(default = "default_state_db")]
    pub state_db: String,
    /// Path the cycle snapshot JSON is written to
    #[serde(default = "default_status_file")]
    pub status_file: String,
    /// Binance API credentials
    #[serde(default)]
    pub binance: BinanceConfig,
    /// Rotation pairs, evaluated in this order every cycle
    #[serde(default)]
    pub pairs: Vec<PairConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BinanceConfig {
    /// API key for authentication
    #[serde(default)]
    pub api_key: String,
    /// Secret key for signing requests
    #[serde(default)]
    pub secret_key: String,
    /// Use testnet instead of production
    #[serde(default)]
    pub testnet: bool,
}

/// One rotation pair: two coins, a ratio band, and a capital cap.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PairConfig {
    /// Unique identifier, also the persistence key
    pub name: String,
    /// First coin of the pair; the default held asset
    pub coin_a: String,
    /// Second coin of the pair
    pub coin_b: String,
    /// Rotate a -> b when price_a / price_b exceeds this (strict)
    pub upper_ratio: Decimal,
    /// Rotate b -> a when price_a / price_b falls below this (strict)
    pub lower_ratio: Decimal,
    /// Fraction of total portfolio value this pair may deploy (0, 1]
    pub allocation_pct: Decimal,
}

fn default_stable_asset() -> String {
    "USDT".to_string()
}

fn default_simulate() -> bool {
    true
}

fn default_check_interval_secs() -> u64 {
    30
}

fn default_reference_coin() -> String {
    "BTC".to_string()
}

fn default_state_db() -> String {
    "data/rotator.db".to_string()
}

fn default_status_file() -> String {
    "data/status.json".to_string()
}

impl Config {
    /// Load configuration from environment variables and config files.
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(config::File::with_name("rotator").required(false))
            .add_source(config::Environment::default().separator("__").prefix("ROTATOR"))
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(!self.stable_asset.is_empty(), "stable_asset must be set");
        anyhow::ensure!(
            self.check_interval_secs >= 1,
            "check_interval_secs must be at least 1"
        );

        let mut seen = std::collections::HashSet::new();
        for pair in &self.pairs {
            pair.validate(&self.stable_asset)?;
            anyhow::ensure!(
                seen.insert(pair.name.as_str()),
                "duplicate pair name: {}",
                pair.name
            );
        }

        Ok(())
    }
}

impl PairConfig {
    /// Validate one pair against the configured stable asset.
    pub fn validate(&self, stable_asset: &str) -> Result<()> {
        anyhow::ensure!(!self.name.is_empty(), "pair name must not be empty");
        anyhow::ensure!(
            self.coin_a != self.coin_b,
            "[{}] coin_a and coin_b must differ",
            self.name
        );
        anyhow::ensure!(
            self.coin_a != stable_asset && self.coin_b != stable_asset,
            "[{}] pair coins must not be the stable asset",
            self.name
        );
        anyhow::ensure!(
            self.upper_ratio > self.lower_ratio,
            "[{}] upper_ratio must be greater than lower_ratio",
            self.name
        );
        anyhow::ensure!(
            self.allocation_pct > Decimal::ZERO && self.allocation_pct <= Decimal::ONE,
            "[{}] allocation_pct must be in (0, 1]",
            self.name
        );
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            stable_asset: default_stable_asset(),
            simulate: default_simulate(),
            check_interval_secs: default_check_interval_secs(),
            reference_coin: default_reference_coin(),
            state_db: default_state_db(),
            status_file: default_status_file(),
            binance: BinanceConfig::default(),
            pairs: Vec::new(),
        }
    }
}

impl Default for BinanceConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            secret_key: String::new(),
            testnet: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn sample_pair() -> PairConfig {
        PairConfig {
            name: "HBAR_DOGE".to_string(),
            coin_a: "HBAR".to_string(),
            coin_b: "DOGE".to_string(),
            upper_ratio: dec!(1.05),
            lower_ratio: dec!(0.95),
            allocation_pct: dec!(0.30),
        }
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_valid_pair_passes() {
        let mut config = Config::default();
        config.pairs.push(sample_pair());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_inverted_band_rejected() {
        let mut pair = sample_pair();
        pair.upper_ratio = dec!(0.95);
        pair.lower_ratio = dec!(1.05);
        assert!(pair.validate("USDT").is_err());
    }

    #[test]
    fn test_allocation_bounds() {
        let mut pair = sample_pair();
        pair.allocation_pct = Decimal::ZERO;
        assert!(pair.validate("USDT").is_err());

        pair.allocation_pct = dec!(1.5);
        assert!(pair.validate("USDT").is_err());

        pair.allocation_pct = Decimal::ONE;
        assert!(pair.validate("USDT").is_ok());
    }

    #[test]
    fn test_stable_asset_not_allowed_in_pair() {
        let mut pair = sample_pair();
        pair.coin_b = "USDT".to_string();
        assert!(pair.validate("USDT").is_err());
    }

    #[test]
    fn test_duplicate_pair_names_rejected() {
        let mut config = Config::default();
        config.pairs.push(sample_pair());
        config.pairs.push(sample_pair());
        assert!(config.validate().is_err());
    }
}
