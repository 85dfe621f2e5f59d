use std::collections::HashMap;

use common::{Candle, Signal};

use super::{prior_extremes, MarketSnapshot, Strategy, StrategyOutcome};
use crate::config::param_usize;
use crate::selector::StrategyId;
use crate::structure::OrderBlock;

/// Smart-money style entries: a sweep of a recent extreme that is reclaimed on
/// the same bar, or price trading back into an order block. A plain bounce off
/// a level is not enough.
pub struct LiquidityStrategy {
    sweep_period: usize,
}

impl LiquidityStrategy {
    pub fn from_params(params: &HashMap<String, toml::Value>) -> Self {
        Self {
            sweep_period: param_usize(params, "sweep_period", 20),
        }
    }

    fn sweep(&self, candles: &[Candle], atr: f64) -> Option<(Signal, f64, String)> {
        let (high, low) = prior_extremes(candles, self.sweep_period)?;
        let last = candles.last()?;
        let depth = |d: f64| if atr > 0.0 { d / atr } else { 0.0 };

        if last.low < low && last.close > low {
            let score = 70.0 + (depth(low - last.low) * 10.0).min(20.0);
            Some((Signal::Long, score, format!("swept {low:.4} lows and reclaimed")))
        } else if last.high > high && last.close < high {
            let score = 70.0 + (depth(last.high - high) * 10.0).min(20.0);
            Some((Signal::Short, score, format!("swept {high:.4} highs and rejected")))
        } else {
            None
        }
    }
}

/// Strongest block the last bar trades into, excluding blocks that formed on
/// the last two bars.
fn retested_block<'a>(blocks: &'a [OrderBlock], last: &Candle, n: usize) -> Option<&'a OrderBlock> {
    blocks
        .iter()
        .filter(|b| b.index + 2 < n && last.low <= b.top && last.high >= b.bottom)
        .max_by(|a, b| a.strength.total_cmp(&b.strength))
}

impl Strategy for LiquidityStrategy {
    fn id(&self) -> StrategyId {
        StrategyId::Liquidity
    }

    fn evaluate(&self, snap: &MarketSnapshot<'_>) -> StrategyOutcome {
        let Some(last) = snap.candles.last() else {
            return StrategyOutcome::neutral("no candles");
        };
        let n = snap.candles.len();
        let blocks = &snap.structure.order_blocks;

        let sweep = self.sweep(snap.candles, snap.indicators.atr);
        let ob = match (
            retested_block(&blocks.bullish, last, n),
            retested_block(&blocks.bearish, last, n),
        ) {
            (Some(b), None) => Some((Signal::Long, b)),
            (None, Some(b)) => Some((Signal::Short, b)),
            (Some(bull), Some(bear)) if bull.strength >= bear.strength => Some((Signal::Long, bull)),
            (Some(_), Some(bear)) => Some((Signal::Short, bear)),
            (None, None) => None,
        };
        let ob = ob.map(|(signal, b)| {
            (
                signal,
                55.0 + b.strength * 0.3,
                format!("retest of order block {:.4}-{:.4}", b.bottom, b.top),
            )
        });

        match (sweep, ob) {
            (Some((s1, score1, why1)), Some((s2, score2, why2))) if s1 == s2 => {
                StrategyOutcome::directional(s1, score1.max(score2) + 10.0, format!("{why1}; {why2}"))
            }
            (Some((signal, score, why)), _) | (None, Some((signal, score, why))) => {
                StrategyOutcome::directional(signal, score, why)
            }
            (None, None) => StrategyOutcome::neutral("no sweep or order-block retest"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runners::fixtures::snapshot_parts;
    use crate::testing::{candle, flat_candles};

    fn run(candles: &[Candle], blocks: Option<OrderBlock>) -> StrategyOutcome {
        let (ind, mut structure) = snapshot_parts(candles);
        if let Some(b) = blocks {
            structure.order_blocks.bullish.push(b);
        }
        let snap = MarketSnapshot { candles, indicators: &ind, structure: &structure };
        LiquidityStrategy::from_params(&HashMap::new()).evaluate(&snap)
    }

    #[test]
    fn sweep_and_reclaim_of_lows_is_long() {
        let mut candles = flat_candles(250, 100.0);
        candles.push(candle(250, 100.0, 100.2, 98.5, 100.1, 2_000.0));
        let out = run(&candles, None);
        assert_eq!(out.signal, Signal::Long);
        assert!(out.reason.contains("swept"));
    }

    #[test]
    fn break_without_reclaim_is_not_a_sweep() {
        let mut candles = flat_candles(250, 100.0);
        candles.push(candle(250, 100.0, 100.2, 98.5, 98.8, 2_000.0));
        assert_eq!(run(&candles, None).signal, Signal::Neutral);
    }

    #[test]
    fn order_block_retest_is_long() {
        let candles = flat_candles(250, 100.0);
        let block = OrderBlock {
            price: 100.0,
            top: 100.3,
            bottom: 99.7,
            strength: 80.0,
            mitigated: true,
            index: 200,
        };
        let out = run(&candles, Some(block));
        assert_eq!(out.signal, Signal::Long);
        assert!((out.score - 79.0).abs() < 1e-9);
    }

    #[test]
    fn plain_range_is_neutral() {
        assert_eq!(run(&flat_candles(250, 100.0), None).signal, Signal::Neutral);
    }
}
