use std::collections::HashMap;

use common::Signal;

use super::{MarketSnapshot, Strategy, StrategyOutcome};
use crate::config::param_f64;
use crate::indicators::EmaAlignment;
use crate::selector::StrategyId;

/// Ichimoku-style trend following: cloud position sets the bias, the
/// tenkan/kijun cross and EMA stack confirm it.
pub struct TrendStrategy {
    adx_floor: f64,
}

impl TrendStrategy {
    pub fn from_params(params: &HashMap<String, toml::Value>) -> Self {
        Self {
            adx_floor: param_f64(params, "adx_floor", 20.0),
        }
    }
}

impl Strategy for TrendStrategy {
    fn id(&self) -> StrategyId {
        StrategyId::Trend
    }

    fn evaluate(&self, snap: &MarketSnapshot<'_>) -> StrategyOutcome {
        let ind = snap.indicators;
        let cloud = ind.ichimoku;
        let price = ind.price;

        let signal = if price > cloud.cloud_top() {
            Signal::Long
        } else if price < cloud.cloud_bottom() {
            Signal::Short
        } else {
            return StrategyOutcome::neutral("price inside the Ichimoku cloud");
        };

        let (tk_agrees, stack_agrees) = match signal {
            Signal::Long => (
                cloud.tenkan > cloud.kijun,
                ind.trend_status.ema_alignment == EmaAlignment::Bullish,
            ),
            _ => (
                cloud.tenkan < cloud.kijun,
                ind.trend_status.ema_alignment == EmaAlignment::Bearish,
            ),
        };

        let mut score = 50.0 + (ind.adx - self.adx_floor).clamp(0.0, 20.0);
        let mut notes = vec![format!("price {} cloud", if signal == Signal::Long { "above" } else { "below" })];
        if tk_agrees {
            score += 15.0;
            notes.push("TK cross confirms".to_string());
        } else {
            score -= 20.0;
            notes.push("TK cross opposes".to_string());
        }
        if stack_agrees {
            score += 15.0;
            notes.push(format!("{} EMA stack", ind.trend_status.ema_alignment));
        }

        StrategyOutcome::directional(signal, score, notes.join(", "))
    }
}
