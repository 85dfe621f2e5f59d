use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use common::Regime;

use crate::config::ConfigError;

/// Closed set of strategy adapters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyId {
    Trend,
    Breakout,
    Liquidity,
    Squeeze,
    Pinball,
    Momentum,
    Reversal,
}

impl StrategyId {
    pub const ALL: [StrategyId; 7] = [
        StrategyId::Trend,
        StrategyId::Breakout,
        StrategyId::Liquidity,
        StrategyId::Squeeze,
        StrategyId::Pinball,
        StrategyId::Momentum,
        StrategyId::Reversal,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyId::Trend => "trend",
            StrategyId::Breakout => "breakout",
            StrategyId::Liquidity => "liquidity",
            StrategyId::Squeeze => "squeeze",
            StrategyId::Pinball => "pinball",
            StrategyId::Momentum => "momentum",
            StrategyId::Reversal => "reversal",
        }
    }

    fn index(&self) -> usize {
        *self as usize
    }

    fn rationale(&self) -> &'static str {
        match self {
            StrategyId::Trend => "cloud and line-cross trend following",
            StrategyId::Breakout => "volume-confirmed range breaks",
            StrategyId::Liquidity => "sweeps and order-block retests",
            StrategyId::Squeeze => "volatility compression release",
            StrategyId::Pinball => "pullbacks into the EMA50/EMA200 value band",
            StrategyId::Momentum => "relative-volume spikes at RSI extremes",
            StrategyId::Reversal => "divergences and harmonic reversal zones",
        }
    }
}

impl std::fmt::Display for StrategyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for StrategyId {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StrategyId::ALL
            .into_iter()
            .find(|id| id.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ConfigError::UnknownStrategy(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyWeight {
    pub id: StrategyId,
    pub weight: f64,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StrategySelection {
    pub regime: Regime,
    pub active: Vec<StrategyWeight>,
    pub disabled: Vec<StrategyId>,
    pub total_weight: f64,
}

/// Regime → strategy → weight matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct RegimeWeightTable {
    rows: [[f64; 7]; 4],
}

fn regime_index(regime: Regime) -> usize {
    match regime {
        Regime::Trending => 0,
        Regime::Ranging => 1,
        Regime::Volatile => 2,
        Regime::Extreme => 3,
    }
}

impl Default for RegimeWeightTable {
    fn default() -> Self {
        //        trend breakout liquidity squeeze pinball momentum reversal
        Self {
            rows: [
                [0.55, 0.45, 0.00, 0.00, 0.00, 0.00, 0.00],
                [0.00, 0.00, 0.35, 0.15, 0.25, 0.00, 0.25],
                [0.00, 0.25, 0.20, 0.20, 0.00, 0.35, 0.00],
                [0.00, 0.00, 0.30, 0.00, 0.00, 0.20, 0.50],
            ],
        }
    }
}

impl RegimeWeightTable {
    /// Apply per-regime overrides. A regime present in `overrides` has its
    /// whole row replaced; strategies it does not name get weight 0.
    pub fn with_overrides(
        mut self,
        overrides: &HashMap<String, HashMap<String, f64>>,
    ) -> Result<Self, ConfigError> {
        for (regime_name, row) in overrides {
            let regime = parse_regime(regime_name)?;
            let mut weights = [0.0; 7];
            for (id, &w) in row {
                let id: StrategyId = id.parse()?;
                weights[id.index()] = w;
            }
            self.rows[regime_index(regime)] = weights;
        }
        self.validate()?;
        Ok(self)
    }

    /// Zero a strategy across every regime.
    pub fn disable(&mut self, id: StrategyId) {
        for row in &mut self.rows {
            row[id.index()] = 0.0;
        }
    }

    pub fn weight(&self, regime: Regime, id: StrategyId) -> f64 {
        self.rows[regime_index(regime)][id.index()]
    }

    /// Every weight in [0, 1] and every row summing to at most 1.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for regime in Regime::ALL {
            let row = &self.rows[regime_index(regime)];
            for id in StrategyId::ALL {
                let weight = row[id.index()];
                if !(0.0..=1.0).contains(&weight) {
                    return Err(ConfigError::InvalidWeight {
                        regime,
                        strategy: id,
                        weight,
                    });
                }
            }
            let sum: f64 = row.iter().sum();
            if sum > 1.0 + 1e-9 {
                return Err(ConfigError::WeightSum { regime, sum });
            }
        }
        Ok(())
    }

    /// Zero-weight strategies are excluded outright, never just down-weighted.
    pub fn select(&self, regime: Regime) -> StrategySelection {
        let (active, disabled): (Vec<StrategyId>, Vec<StrategyId>) = StrategyId::ALL
            .into_iter()
            .partition(|&id| self.weight(regime, id) > 0.0);

        let active: Vec<StrategyWeight> = active
            .into_iter()
            .map(|id| StrategyWeight {
                id,
                weight: self.weight(regime, id),
                reason: format!("{regime}: {}", id.rationale()),
            })
            .collect();
        let total_weight = active.iter().map(|w| w.weight).sum();

        StrategySelection {
            regime,
            active,
            disabled,
            total_weight,
        }
    }
}

fn parse_regime(name: &str) -> Result<Regime, ConfigError> {
    Regime::ALL
        .into_iter()
        .find(|r| r.to_string().eq_ignore_ascii_case(name.trim()))
        .ok_or_else(|| ConfigError::UnknownRegime(name.to_string()))
}
