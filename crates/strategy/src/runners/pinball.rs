use std::collections::HashMap;

use common::Signal;

use super::{MarketSnapshot, Strategy, StrategyOutcome};
use crate::config::param_f64;
use crate::selector::StrategyId;

/// Mean reversion inside a secular trend: a pullback into the EMA50–EMA200
/// band near EMA200 is bought (or sold) in the trend's direction.
pub struct PinballStrategy {
    /// Minimum |EMA200 slope| in degrees for the trend to count.
    min_slope: f64,
    /// Maximum distance from EMA200 as a fraction of EMA200.
    max_distance: f64,
}

impl PinballStrategy {
    pub fn from_params(params: &HashMap<String, toml::Value>) -> Self {
        Self {
            min_slope: param_f64(params, "min_slope", 5.0),
            max_distance: param_f64(params, "max_distance", 0.02),
        }
    }
}

impl Strategy for PinballStrategy {
    fn id(&self) -> StrategyId {
        StrategyId::Pinball
    }

    fn evaluate(&self, snap: &MarketSnapshot<'_>) -> StrategyOutcome {
        let ind = snap.indicators;
        let (price, ema50, ema200) = (ind.price, ind.ema50, ind.ema200);
        if ema200 <= 0.0 {
            return StrategyOutcome::neutral("EMA200 unavailable");
        }

        let signal = if ema50 > ema200 && ind.ema_slope >= self.min_slope {
            Signal::Long
        } else if ema50 < ema200 && ind.ema_slope <= -self.min_slope {
            Signal::Short
        } else {
            return StrategyOutcome::neutral(format!(
                "no secular trend (EMA200 slope {:.1} deg)",
                ind.ema_slope
            ));
        };

        let (band_lo, band_hi) = (ema50.min(ema200), ema50.max(ema200));
        if price < band_lo || price > band_hi {
            return StrategyOutcome::neutral("price outside the EMA50/EMA200 value band");
        }
        let distance = (price - ema200).abs() / ema200;
        if distance > self.max_distance {
            return StrategyOutcome::neutral(format!(
                "{:.2}% from EMA200, too far for a pinball entry",
                distance * 100.0
            ));
        }

        let mut score = 65.0 + (1.0 - distance / self.max_distance) * 25.0;
        let rsi_cooled = match signal {
            Signal::Long => ind.rsi < 50.0,
            _ => ind.rsi > 50.0,
        };
        if rsi_cooled {
            score += 10.0;
        }
        StrategyOutcome::directional(
            signal,
            score,
            format!("pullback to {:.2}% from EMA200 inside trend band", distance * 100.0),
        )
    }
}
