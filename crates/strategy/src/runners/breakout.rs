use std::collections::HashMap;

use common::Signal;

use super::{prior_extremes, MarketSnapshot, Strategy, StrategyOutcome};
use crate::config::{param_f64, param_usize};
use crate::selector::StrategyId;

/// Close beyond the prior N-bar extreme, confirmed by relative volume.
pub struct BreakoutStrategy {
    period: usize,
    min_rvol: f64,
}

impl BreakoutStrategy {
    pub fn from_params(params: &HashMap<String, toml::Value>) -> Self {
        Self {
            period: param_usize(params, "period", 20),
            min_rvol: param_f64(params, "min_rvol", 1.5),
        }
    }
}

impl Strategy for BreakoutStrategy {
    fn id(&self) -> StrategyId {
        StrategyId::Breakout
    }

    fn evaluate(&self, snap: &MarketSnapshot<'_>) -> StrategyOutcome {
        let ind = snap.indicators;
        let Some((high, low)) = prior_extremes(snap.candles, self.period) else {
            return StrategyOutcome::neutral("not enough bars for the breakout range");
        };

        let (signal, level, distance) = if ind.price > high {
            (Signal::Long, high, ind.price - high)
        } else if ind.price < low {
            (Signal::Short, low, low - ind.price)
        } else {
            return StrategyOutcome::neutral(format!("inside {}-bar range", self.period));
        };

        if ind.rvol < self.min_rvol {
            return StrategyOutcome::neutral(format!(
                "low-volume break of {level:.4} rejected (RVOL {:.2})",
                ind.rvol
            ));
        }

        let thrust = if ind.atr > 0.0 { distance / ind.atr } else { 0.0 };
        let score = 60.0 + ((ind.rvol - self.min_rvol) * 20.0).min(20.0) + (thrust * 10.0).min(20.0);
        StrategyOutcome::directional(
            signal,
            score,
            format!(
                "{}-bar {} break at {level:.4} on RVOL {:.2}",
                self.period,
                if signal == Signal::Long { "high" } else { "low" },
                ind.rvol
            ),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runners::fixtures::snapshot_parts;
    use crate::testing::{candle, flat_candles};
    use common::Candle;

    fn with_last_bar(last: Candle) -> Vec<Candle> {
        let mut candles = flat_candles(250, 100.0);
        candles.push(last);
        candles
    }

    fn run(candles: &[Candle]) -> StrategyOutcome {
        let (ind, structure) = snapshot_parts(candles);
        let snap = MarketSnapshot { candles, indicators: &ind, structure: &structure };
        BreakoutStrategy::from_params(&HashMap::new()).evaluate(&snap)
    }

    #[test]
    fn volume_confirmed_break_is_long() {
        let out = run(&with_last_bar(candle(250, 100.0, 103.2, 99.9, 103.0, 3_000.0)));
        assert_eq!(out.signal, Signal::Long);
        assert!(out.score >= 60.0);
    }

    #[test]
    fn low_volume_break_is_rejected() {
        let out = run(&with_last_bar(candle(250, 100.0, 103.2, 99.9, 103.0, 1_000.0)));
        assert_eq!(out.signal, Signal::Neutral);
        assert!(out.reason.contains("rejected"));
    }

    #[test]
    fn breakdown_is_short() {
        let out = run(&with_last_bar(candle(250, 100.0, 100.1, 96.8, 97.0, 2_500.0)));
        assert_eq!(out.signal, Signal::Short);
    }
}
