use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

use common::Regime;

use crate::indicators::IndicatorParams;
use crate::regime::RegimeThresholds;
use crate::selector::StrategyId;
use crate::structure::StructureParams;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("unknown strategy id '{0}'")]
    UnknownStrategy(String),

    #[error("unknown regime '{0}'")]
    UnknownRegime(String),

    #[error("weight {weight} for {strategy} in {regime} is outside [0, 1]")]
    InvalidWeight {
        regime: Regime,
        strategy: StrategyId,
        weight: f64,
    },

    #[error("weights for {regime} sum to {sum:.3}, above 1")]
    WeightSum { regime: Regime, sum: f64 },

    #[error("invalid indicator settings: {0}")]
    InvalidIndicator(String),
}

/// Strategy section of the pipeline file (TOML).
///
/// Example:
/// ```toml
/// [weights.TRENDING]
/// trend = 0.6
/// breakout = 0.4
///
/// [[strategy]]
/// id = "breakout"
///
/// [strategy.params]
/// period = 20
/// min_rvol = 1.5
///
/// [[strategy]]
/// id = "momentum"
/// enabled = false
/// ```
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct StrategyFileConfig {
    /// Per-regime weight rows; a named regime replaces its default row.
    pub weights: HashMap<String, HashMap<String, f64>>,
    #[serde(rename = "strategy")]
    pub strategies: Vec<StrategyConfig>,
    pub indicators: IndicatorParams,
    pub structure: StructureParams,
    pub regime: RegimeThresholds,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StrategyConfig {
    /// One of the strategy ids, e.g. "pinball".
    pub id: String,
    /// A disabled strategy gets weight 0 in every regime.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Runner-specific parameters.
    #[serde(default)]
    pub params: HashMap<String, toml::Value>,
}

fn default_enabled() -> bool {
    true
}

impl StrategyFileConfig {
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Params for `id`, or an empty map when the file does not mention it.
    pub fn params_for(&self, id: StrategyId) -> HashMap<String, toml::Value> {
        self.strategies
            .iter()
            .find(|s| s.id.eq_ignore_ascii_case(id.as_str()))
            .map(|s| s.params.clone())
            .unwrap_or_default()
    }
}

pub(crate) fn param_f64(params: &HashMap<String, toml::Value>, key: &str, default: f64) -> f64 {
    params
        .get(key)
        .and_then(|v| v.as_float().or_else(|| v.as_integer().map(|i| i as f64)))
        .unwrap_or(default)
}

pub(crate) fn param_usize(params: &HashMap<String, toml::Value>, key: &str, default: usize) -> usize {
    params
        .get(key)
        .and_then(|v| v.as_integer())
        .map(|v| v as usize)
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_example() {
        let cfg = StrategyFileConfig::from_toml_str(
            r#"
            [weights.TRENDING]
            trend = 0.6
            breakout = 0.4

            [indicators]
            rsi_period = 21

            [[strategy]]
            id = "breakout"
            [strategy.params]
            period = 30
            min_rvol = 2

            [[strategy]]
            id = "momentum"
            enabled = false
            "#,
        )
        .unwrap();

        assert_eq!(cfg.weights["TRENDING"]["trend"], 0.6);
        assert_eq!(cfg.indicators.rsi_period, 21);
        assert_eq!(cfg.indicators.macd_slow, 26);
        assert_eq!(cfg.strategies.len(), 2);
        assert!(!cfg.strategies[1].enabled);

        let params = cfg.params_for(StrategyId::Breakout);
        assert_eq!(param_usize(&params, "period", 20), 30);
        assert_eq!(param_f64(&params, "min_rvol", 1.5), 2.0);
        assert_eq!(param_f64(&params, "missing", 1.5), 1.5);
    }

    #[test]
    fn empty_file_is_all_defaults() {
        let cfg = StrategyFileConfig::from_toml_str("").unwrap();
        assert!(cfg.weights.is_empty());
        assert!(cfg.strategies.is_empty());
        assert!(cfg.params_for(StrategyId::Trend).is_empty());
    }

    #[test]
    fn malformed_toml_is_parse_error() {
        assert!(matches!(
            StrategyFileConfig::from_toml_str("[[strategy]\nid ="),
            Err(ConfigError::Parse(_))
        ));
    }
}
