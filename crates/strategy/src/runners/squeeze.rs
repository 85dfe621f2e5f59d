use std::collections::HashMap;

use common::Signal;

use super::{MarketSnapshot, Strategy, StrategyOutcome};
use crate::config::{param_f64, param_usize};
use crate::indicators::volatility::bandwidth_series;
use crate::selector::StrategyId;

/// Bollinger squeeze: bandwidth at (or within `tolerance` of) its local
/// minimum, released in the direction price, VWAP and RSI agree on.
pub struct SqueezeStrategy {
    bb_period: usize,
    bb_mult: f64,
    lookback: usize,
    tolerance: f64,
}

impl SqueezeStrategy {
    pub fn from_params(params: &HashMap<String, toml::Value>) -> Self {
        Self {
            bb_period: param_usize(params, "bb_period", 20),
            bb_mult: param_f64(params, "bb_mult", 2.0),
            lookback: param_usize(params, "lookback", 120),
            tolerance: param_f64(params, "tolerance", 1.1),
        }
    }
}

impl Strategy for SqueezeStrategy {
    fn id(&self) -> StrategyId {
        StrategyId::Squeeze
    }

    fn evaluate(&self, snap: &MarketSnapshot<'_>) -> StrategyOutcome {
        let ind = snap.indicators;
        let closes: Vec<f64> = snap.candles.iter().map(|c| c.close).collect();
        let series = bandwidth_series(&closes, self.bb_period, self.bb_mult);
        let recent = &series[series.len().saturating_sub(self.lookback)..];
        let Some(&current) = recent.last() else {
            return StrategyOutcome::neutral("not enough bars for bandwidth history");
        };

        let min = recent.iter().copied().fold(f64::INFINITY, f64::min);
        let mean = recent.iter().sum::<f64>() / recent.len() as f64;
        if current > min * self.tolerance {
            return StrategyOutcome::neutral(format!("bandwidth {current:.4} not compressed"));
        }

        let long = ind.price > ind.vwap && ind.price > ind.bollinger.middle && ind.rsi > 50.0;
        let short = ind.price < ind.vwap && ind.price < ind.bollinger.middle && ind.rsi < 50.0;
        let signal = match (long, short) {
            (true, false) => Signal::Long,
            (false, true) => Signal::Short,
            _ => return StrategyOutcome::neutral("squeeze without price/VWAP/RSI alignment"),
        };

        let tightness = if mean > 0.0 { (1.0 - current / mean).clamp(0.0, 1.0) } else { 0.0 };
        let score = 60.0 + (ind.rsi - 50.0).abs().min(20.0) + tightness * 20.0;
        StrategyOutcome::directional(
            signal,
            score,
            format!("squeeze at bandwidth {current:.4}, RSI {:.1} vs VWAP {:.4}", ind.rsi, ind.vwap),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runners::fixtures::snapshot_parts;
    use crate::testing::from_closes;
    use common::Candle;

    fn choppy(n: usize) -> Vec<f64> {
        (0..n).map(|i| if i % 2 == 0 { 105.0 } else { 95.0 }).collect()
    }

    fn run(candles: &[Candle]) -> StrategyOutcome {
        let (ind, structure) = snapshot_parts(candles);
        let snap = MarketSnapshot { candles, indicators: &ind, structure: &structure };
        SqueezeStrategy::from_params(&HashMap::new()).evaluate(&snap)
    }

    #[test]
    fn compression_after_chop_releases_upward() {
        let mut closes = choppy(220);
        closes.extend((1..=40).map(|k| 100.0 + 0.1 * k as f64));
        let out = run(&from_closes(&closes, 0.5));
        assert_eq!(out.signal, Signal::Long, "{}", out.reason);
    }

    #[test]
    fn expanding_bands_are_neutral() {
        // Quiet stretch still inside the lookback, then wide chop
        let mut closes: Vec<f64> = (0..150).map(|i| if i % 2 == 0 { 100.2 } else { 99.8 }).collect();
        closes.extend(choppy(110));
        assert_eq!(run(&from_closes(&closes, 0.5)).signal, Signal::Neutral);
    }
}
