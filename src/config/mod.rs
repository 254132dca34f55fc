//! Configuration management for the rebalancer.
//!
//! Loads settings from environment variables and config files.

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Alpaca API credentials and environment selection
    #[serde(default)]
    pub alpaca: AlpacaConfig,
    /// Rebalancing parameters
    #[serde(default)]
    pub rebalance: RebalanceConfig,
    /// Target allocations, in submission order
    #[serde(default)]
    pub targets: TargetAllocation,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlpacaConfig {
    /// API key for authentication
    #[serde(default)]
    pub api_key: String,
    /// API secret
    #[serde(default)]
    pub secret_key: String,
    /// Use the paper-trading environment instead of live
    #[serde(default = "default_paper")]
    pub paper: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RebalanceConfig {
    /// Minimum order notional; smaller adjustments are skipped entirely
    #[serde(default = "default_min_notional")]
    pub min_notional: Decimal,
    /// Allocation drift (as a fraction of equity) that triggers a rebalance.
    /// 0 disables the gate and rebalances on every run.
    #[serde(default = "default_drift_trigger")]
    pub drift_trigger: Decimal,
    /// Seconds between open-order polls after submission
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    /// Upper bound on the settlement wait before the run fails
    #[serde(default = "default_poll_timeout")]
    pub poll_timeout_secs: u64,
    /// Directory for per-run audit files
    #[serde(default = "default_log_dir")]
    pub log_dir: String,
}

/// Target weights keyed by symbol.
///
/// Backed by a vector so that the configuration file's ordering is
/// preserved; orders are submitted in this order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TargetAllocation(Vec<TargetWeight>);

/// One symbol's target fraction of equity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetWeight {
    pub symbol: String,
    pub weight: Decimal,
}

impl TargetAllocation {
    pub fn new(weights: Vec<TargetWeight>) -> Self {
        Self(weights)
    }

    /// Build from `(symbol, weight)` pairs, preserving order.
    pub fn from_pairs<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, Decimal)>,
        S: Into<String>,
    {
        Self(
            pairs
                .into_iter()
                .map(|(symbol, weight)| TargetWeight {
                    symbol: symbol.into(),
                    weight,
                })
                .collect(),
        )
    }

    pub fn iter(&self) -> impl Iterator<Item = &TargetWeight> {
        self.0.iter()
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.0.iter().any(|t| t.symbol == symbol)
    }

    pub fn weight_for(&self, symbol: &str) -> Option<Decimal> {
        self.0.iter().find(|t| t.symbol == symbol).map(|t| t.weight)
    }

    pub fn total_weight(&self) -> Decimal {
        self.0.iter().map(|t| t.weight).sum()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

// Default value functions
fn default_paper() -> bool {
    true
}

fn default_min_notional() -> Decimal {
    Decimal::ONE // brokerage minimum for notional orders
}

fn default_drift_trigger() -> Decimal {
    Decimal::new(5, 2) // 0.05
}

fn default_poll_interval() -> u64 {
    5
}

fn default_poll_timeout() -> u64 {
    300
}

fn default_log_dir() -> String {
    "logs".to_string()
}

impl Config {
    /// Load configuration from environment variables and config files.
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(config::File::with_name("rebalancer").required(false))
            .add_source(
                config::Environment::default()
                    .separator("__")
                    .prefix("PORTFOLIO"),
            )
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            !self.targets.is_empty(),
            "no target allocations configured"
        );

        for target in self.targets.iter() {
            anyhow::ensure!(
                target.weight > Decimal::ZERO && target.weight <= Decimal::ONE,
                "target weight for {} must be between 0 and 1",
                target.symbol
            );
        }

        anyhow::ensure!(
            self.targets.total_weight() <= Decimal::ONE,
            "target weights sum to more than 1 (remainder is implicitly cash)"
        );

        let mut seen = std::collections::HashSet::new();
        for target in self.targets.iter() {
            anyhow::ensure!(
                seen.insert(target.symbol.as_str()),
                "duplicate target symbol {}",
                target.symbol
            );
        }

        anyhow::ensure!(
            self.rebalance.min_notional >= Decimal::ONE,
            "min_notional must be at least 1.00 (brokerage minimum)"
        );

        anyhow::ensure!(
            self.rebalance.drift_trigger >= Decimal::ZERO
                && self.rebalance.drift_trigger < Decimal::ONE,
            "drift_trigger must be in [0, 1)"
        );

        anyhow::ensure!(
            self.rebalance.poll_interval_secs > 0,
            "poll_interval_secs must be positive"
        );

        Ok(())
    }
}

impl Default for AlpacaConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            secret_key: String::new(),
            paper: default_paper(),
        }
    }
}

impl Default for RebalanceConfig {
    fn default() -> Self {
        Self {
            min_notional: default_min_notional(),
            drift_trigger: default_drift_trigger(),
            poll_interval_secs: default_poll_interval(),
            poll_timeout_secs: default_poll_timeout(),
            log_dir: default_log_dir(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            alpaca: AlpacaConfig::default(),
            rebalance: RebalanceConfig::default(),
            targets: TargetAllocation::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn config_with_targets(pairs: &[(&str, Decimal)]) -> Config {
        Config {
            targets: TargetAllocation::from_pairs(
                pairs.iter().map(|(s, w)| (s.to_string(), *w)),
            ),
            ..Config::default()
        }
    }

    #[test]
    fn test_empty_targets_rejected() {
        assert!(Config::default().validate().is_err());
    }

    #[test]
    fn test_valid_targets_accepted() {
        let config = config_with_targets(&[("VOO", dec!(0.6)), ("BND", dec!(0.4))]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_overweight_targets_rejected() {
        let config = config_with_targets(&[("VOO", dec!(0.7)), ("BND", dec!(0.4))]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_duplicate_symbol_rejected() {
        let config = config_with_targets(&[("VOO", dec!(0.3)), ("VOO", dec!(0.3))]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_target_order_preserved() {
        let targets = TargetAllocation::from_pairs([
            ("EDV", dec!(0.1)),
            ("AVUV", dec!(0.25)),
            ("VOO", dec!(0.25)),
        ]);
        let symbols: Vec<_> = targets.iter().map(|t| t.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["EDV", "AVUV", "VOO"]);
    }

    #[test]
    fn test_weight_lookup() {
        let targets = TargetAllocation::from_pairs([("VOO", dec!(0.5))]);
        assert_eq!(targets.weight_for("VOO"), Some(dec!(0.5)));
        assert_eq!(targets.weight_for("XYLD"), None);
        assert!(targets.contains("VOO"));
        assert!(!targets.contains("XYLD"));
    }
}
