use std::collections::HashMap;

use common::Signal;

use super::{MarketSnapshot, Strategy, StrategyOutcome};
use crate::config::param_f64;
use crate::selector::StrategyId;

/// High-volatility mode: chase relative-volume spikes at RSI extremes. Below
/// baseline volume the market is considered dead.
pub struct MomentumStrategy {
    dead_rvol: f64,
    spike_rvol: f64,
    rsi_high: f64,
    rsi_low: f64,
}

impl MomentumStrategy {
    pub fn from_params(params: &HashMap<String, toml::Value>) -> Self {
        Self {
            dead_rvol: param_f64(params, "dead_rvol", 1.0),
            spike_rvol: param_f64(params, "spike_rvol", 2.0),
            rsi_high: param_f64(params, "rsi_high", 70.0),
            rsi_low: param_f64(params, "rsi_low", 30.0),
        }
    }
}

impl Strategy for MomentumStrategy {
    fn id(&self) -> StrategyId {
        StrategyId::Momentum
    }

    fn evaluate(&self, snap: &MarketSnapshot<'_>) -> StrategyOutcome {
        let ind = snap.indicators;
        if ind.rvol < self.dead_rvol {
            return StrategyOutcome::neutral(format!("dead: RVOL {:.2} below baseline", ind.rvol));
        }
        if ind.rvol < self.spike_rvol {
            return StrategyOutcome::neutral(format!("no volume spike (RVOL {:.2})", ind.rvol));
        }

        let signal = if ind.rsi >= self.rsi_high {
            Signal::Long
        } else if ind.rsi <= self.rsi_low {
            Signal::Short
        } else {
            return StrategyOutcome::neutral(format!("RSI {:.1} not extreme", ind.rsi));
        };

        let score = 60.0
            + ((ind.rvol - self.spike_rvol) * 10.0).min(25.0)
            + ((ind.rsi - 50.0).abs() - 20.0).clamp(0.0, 15.0);
        StrategyOutcome::directional(
            signal,
            score,
            format!("RVOL spike {:.2}x with RSI {:.1}", ind.rvol, ind.rsi),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::IndicatorSet;
    use crate::runners::fixtures::snapshot_parts;
    use crate::testing::flat_candles;

    fn run(rvol: f64, rsi: f64) -> StrategyOutcome {
        let candles = flat_candles(220, 10.0);
        let (mut ind, structure): (IndicatorSet, _) = snapshot_parts(&candles);
        ind.rvol = rvol;
        ind.rsi = rsi;
        let snap = MarketSnapshot { candles: &candles, indicators: &ind, structure: &structure };
        MomentumStrategy::from_params(&HashMap::new()).evaluate(&snap)
    }

    #[test]
    fn spike_at_overbought_is_aggressive_long() {
        let out = run(3.0, 82.0);
        assert_eq!(out.signal, Signal::Long);
        assert!((out.score - (60.0 + 10.0 + 12.0)).abs() < 1e-9);
    }

    #[test]
    fn spike_at_oversold_is_short() {
        assert_eq!(run(2.5, 25.0).signal, Signal::Short);
    }

    #[test]
    fn below_baseline_volume_is_dead() {
        let out = run(0.6, 85.0);
        assert_eq!(out.signal, Signal::Neutral);
        assert!(out.reason.starts_with("dead"));
    }
}
