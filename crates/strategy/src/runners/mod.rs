//! Strategy adapters. Each one reads the same snapshot and returns a
//! directional signal with a 0–100 score and a short rationale.

pub mod breakout;
pub mod liquidity;
pub mod momentum;
pub mod pinball;
pub mod reversal;
pub mod squeeze;
pub mod trend;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use common::{Candle, Signal};

use crate::indicators::IndicatorSet;
use crate::selector::StrategyId;
use crate::structure::StructureSet;

/// Read-only inputs for one (symbol, interval) evaluation.
#[derive(Debug, Clone, Copy)]
pub struct MarketSnapshot<'a> {
    pub candles: &'a [Candle],
    pub indicators: &'a IndicatorSet,
    pub structure: &'a StructureSet,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyOutcome {
    pub signal: Signal,
    /// Raw score before regime weighting, 0–100.
    pub score: f64,
    pub reason: String,
}

impl StrategyOutcome {
    pub fn neutral(reason: impl Into<String>) -> Self {
        Self {
            signal: Signal::Neutral,
            score: 0.0,
            reason: reason.into(),
        }
    }

    pub fn directional(signal: Signal, score: f64, reason: impl Into<String>) -> Self {
        Self {
            signal,
            score: score.clamp(0.0, 100.0),
            reason: reason.into(),
        }
    }
}

/// All strategy adapters must satisfy this trait.
pub trait Strategy: Send + Sync {
    fn id(&self) -> StrategyId;

    /// Must be a pure function of the snapshot.
    fn evaluate(&self, snapshot: &MarketSnapshot<'_>) -> StrategyOutcome;
}

/// Build the adapter for `id` from its TOML parameter map.
pub fn build_runner(id: StrategyId, params: &HashMap<String, toml::Value>) -> Box<dyn Strategy> {
    match id {
        StrategyId::Trend => Box::new(trend::TrendStrategy::from_params(params)),
        StrategyId::Breakout => Box::new(breakout::BreakoutStrategy::from_params(params)),
        StrategyId::Liquidity => Box::new(liquidity::LiquidityStrategy::from_params(params)),
        StrategyId::Squeeze => Box::new(squeeze::SqueezeStrategy::from_params(params)),
        StrategyId::Pinball => Box::new(pinball::PinballStrategy::from_params(params)),
        StrategyId::Momentum => Box::new(momentum::MomentumStrategy::from_params(params)),
        StrategyId::Reversal => Box::new(reversal::ReversalStrategy::from_params(params)),
    }
}

/// Highest high and lowest low of the `period` bars before the last one.
pub(crate) fn prior_extremes(candles: &[Candle], period: usize) -> Option<(f64, f64)> {
    let n = candles.len();
    if period == 0 || n < period + 1 {
        return None;
    }
    let window = &candles[n - 1 - period..n - 1];
    let high = window.iter().map(|c| c.high).fold(f64::NEG_INFINITY, f64::max);
    let low = window.iter().map(|c| c.low).fold(f64::INFINITY, f64::min);
    Some((high, low))
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use crate::indicators::IndicatorParams;

    /// Indicators and empty structure for `candles`; tests then patch fields.
    pub fn snapshot_parts(candles: &[Candle]) -> (IndicatorSet, StructureSet) {
        let ind = IndicatorSet::compute(candles, &IndicatorParams::default())
            .expect("fixture needs at least 200 candles");
        (ind, StructureSet::default())
    }
}
