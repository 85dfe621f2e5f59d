use std::collections::HashMap;

use common::{Side, Signal};

use super::{MarketSnapshot, Strategy, StrategyOutcome};
use crate::config::param_f64;
use crate::selector::StrategyId;
use crate::structure::HarmonicPattern;

/// Counter-trend entries from oscillator divergence and harmonic reversal
/// zones. Agreement between the two earns a bonus.
pub struct ReversalStrategy {
    /// How close (in ATR) price must be to a pattern's PRZ.
    prz_atr: f64,
}

impl ReversalStrategy {
    pub fn from_params(params: &HashMap<String, toml::Value>) -> Self {
        Self {
            prz_atr: param_f64(params, "prz_atr", 1.0),
        }
    }

    fn active_harmonic<'a>(&self, patterns: &'a [HarmonicPattern], price: f64, atr: f64) -> Option<&'a HarmonicPattern> {
        patterns
            .iter()
            .filter(|p| (price - p.prz).abs() <= self.prz_atr * atr)
            .max_by(|a, b| a.confidence.total_cmp(&b.confidence))
    }
}

impl Strategy for ReversalStrategy {
    fn id(&self) -> StrategyId {
        StrategyId::Reversal
    }

    fn evaluate(&self, snap: &MarketSnapshot<'_>) -> StrategyOutcome {
        let ind = snap.indicators;
        let structure = snap.structure;

        // Strongest divergence regardless of direction
        let divergence = match (structure.strongest_divergence(true), structure.strongest_divergence(false)) {
            (Some(bull), Some(bear)) => Some(if bull.strength >= bear.strength { bull } else { bear }),
            (bull, bear) => bull.or(bear),
        };
        let divergence = divergence.map(|d| {
            let side = if d.kind.is_bullish() { Side::Long } else { Side::Short };
            (side, 40.0 + d.strength * 0.4, format!("{:?} {} divergence: {}", d.kind, d.source, d.description))
        });
        let harmonic = self
            .active_harmonic(&structure.harmonics, ind.price, ind.atr)
            .map(|p| (p.direction, p.confidence * 0.8, format!("{} PRZ at {:.4}", p.kind, p.prz)));

        let (side, score, reason) = match (divergence, harmonic) {
            (Some(d), Some(h)) if d.0 == h.0 => (d.0, d.1.max(h.1) + 20.0, format!("{}; {}", d.2, h.2)),
            (Some(d), Some(h)) => {
                if d.1 >= h.1 {
                    d
                } else {
                    h
                }
            }
            (Some(x), None) | (None, Some(x)) => x,
            (None, None) => return StrategyOutcome::neutral("no divergence or harmonic zone"),
        };
        StrategyOutcome::directional(Signal::from(side), score, reason)
    }
}
