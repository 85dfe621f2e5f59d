//! Three-rung DCA ladder with a single stop and three take-profits.

use serde::{Deserialize, Serialize};
use tracing::debug;

use common::{DcaEntry, DcaPlan, FundamentalTier, Regime, Side, StopSource, TakeProfitLevel};
use strategy::indicators::Fibonacci;
use strategy::structure::HarmonicPattern;

use crate::confluence::{ConfluenceMap, ConfluencePoi};
use crate::tier::TierTable;

/// Which take-profit the reward:risk ratio is measured against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RewardRiskTarget {
    #[default]
    Tp2,
    Tp3,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DcaConfig {
    /// Position share per rung, in percent.
    pub allocations: [f64; 3],
    pub spread_trending: f64,
    pub spread_ranging: f64,
    pub spread_volatile: f64,
    /// POIs deeper than this many spread-ATRs are not used as rungs.
    pub max_depth_atr: f64,
    pub tp1_min_r: f64,
    pub tp1_fallback_r: f64,
    pub tp2_fallback_r: f64,
    pub tp3_r: f64,
    pub exit_fractions: [f64; 3],
    /// Gap kept between TP1 and an opposing order-book wall, in ATR.
    pub wall_offset_atr: f64,
    pub reward_risk_target: RewardRiskTarget,
    pub min_reward_risk: f64,
}

impl Default for DcaConfig {
    fn default() -> Self {
        Self {
            allocations: [40.0, 30.0, 30.0],
            spread_trending: 0.75,
            spread_ranging: 1.0,
            spread_volatile: 1.5,
            max_depth_atr: 3.0,
            tp1_min_r: 1.0,
            tp1_fallback_r: 1.5,
            tp2_fallback_r: 2.5,
            tp3_r: 4.0,
            exit_fractions: [0.5, 0.3, 0.2],
            wall_offset_atr: 0.1,
            reward_risk_target: RewardRiskTarget::Tp2,
            min_reward_risk: 1.0,
        }
    }
}

/// Optional enrichment. Absence is a normal, testable state.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PredictiveTargets {
    /// Reversal target derived from oscillator structure.
    pub oscillator_target: Option<f64>,
    pub order_book_wall: Option<f64>,
    pub liquidation_cluster: Option<f64>,
}

pub struct DcaInputs<'a> {
    pub side: Side,
    pub price: f64,
    pub atr: f64,
    pub regime: Regime,
    pub tier: FundamentalTier,
    pub pois: &'a ConfluenceMap,
    pub fibonacci: &'a Fibonacci,
    pub harmonics: &'a [HarmonicPattern],
    pub predictive: PredictiveTargets,
}

pub struct DcaPlanner {
    config: DcaConfig,
    tiers: TierTable,
}

impl DcaPlanner {
    pub fn new(config: DcaConfig, tiers: TierTable) -> Self {
        Self { config, tiers }
    }

    fn spread(&self, regime: Regime) -> f64 {
        match regime {
            Regime::Trending => self.config.spread_trending,
            Regime::Ranging => self.config.spread_ranging,
            Regime::Volatile | Regime::Extreme => self.config.spread_volatile,
        }
    }

    /// Build the plan. `None` when price or ATR is not positive and finite.
    pub fn plan(&self, inp: &DcaInputs<'_>) -> Option<DcaPlan> {
        let cfg = &self.config;
        if !(inp.price.is_finite() && inp.price > 0.0 && inp.atr.is_finite() && inp.atr > 0.0) {
            return None;
        }
        let sign = inp.side.sign();
        let price = inp.price;
        let step = inp.atr * self.spread(inp.regime);

        let entries = self.ladder(inp, step)?;
        let alloc_total: f64 = cfg.allocations.iter().sum();
        let average_entry = entries.iter().map(|e| e.price * e.allocation_pct).sum::<f64>() / alloc_total;
        let deepest = entries[2].price;

        // Stop: tier ATR multiple beyond the deepest rung, unless an aligned
        // harmonic gives a structural level on the protective side.
        let atr_stop = deepest - sign * self.tiers.stop_multiplier(inp.tier) * inp.atr;
        let structural = inp
            .harmonics
            .iter()
            .filter(|h| h.direction == inp.side && (deepest - h.stop_loss) * sign > 0.0)
            .max_by(|a, b| a.confidence.total_cmp(&b.confidence));
        let (stop_loss, stop_source) = match structural {
            Some(h) => (h.stop_loss, StopSource::HarmonicStructure),
            None => (atr_stop, StopSource::AtrTier),
        };
        let risk = (average_entry - stop_loss).abs();
        if !(risk > 0.0) {
            return None;
        }
        let at_r = |r: f64| average_entry + sign * r * risk;
        let beyond = |level: f64, reference: f64| (level - reference) * sign > 0.0;

        // TP1: nearest opposing POI at least tp1_min_r away, else fallback R.
        let opposing: &[ConfluencePoi] = match inp.side {
            Side::Long => &inp.pois.top_resistances,
            Side::Short => &inp.pois.top_supports,
        };
        let mut tp1 = opposing
            .iter()
            .map(|p| p.price)
            .filter(|&p| (p - at_r(cfg.tp1_min_r)) * sign >= 0.0)
            .min_by(|a, b| (a - average_entry).abs().total_cmp(&(b - average_entry).abs()))
            .unwrap_or_else(|| at_r(cfg.tp1_fallback_r));
        let mut tp1_note = "close 50%, move stop to breakeven".to_string();
        if let Some(wall) = inp.predictive.order_book_wall {
            let front = wall - sign * cfg.wall_offset_atr * inp.atr;
            if beyond(wall, average_entry) && beyond(tp1, front) && beyond(front, average_entry) {
                tp1 = front;
                tp1_note.push_str(", pulled in front of order-book wall");
            }
        }

        // TP2: first Fibonacci extension past TP1, else fallback R.
        let mut tp2 = inp
            .fibonacci
            .extensions()
            .into_iter()
            .filter(|&e| beyond(e, tp1))
            .min_by(|a, b| (a - tp1).abs().total_cmp(&(b - tp1).abs()))
            .unwrap_or_else(|| at_r(cfg.tp2_fallback_r));
        if !beyond(tp2, tp1) {
            tp2 = tp1 + sign * 0.5 * risk;
        }

        // TP3: moonbag, replaced by the first aligned predictive target past TP2.
        let mut tp3 = at_r(cfg.tp3_r);
        if !beyond(tp3, tp2) {
            tp3 = tp2 + sign * risk;
        }
        let mut tp3_note = "moonbag".to_string();
        let predictive = [
            (inp.predictive.liquidation_cluster, "liquidation cluster"),
            (inp.predictive.oscillator_target, "oscillator reversal target"),
            (inp.predictive.order_book_wall, "order-book wall"),
        ];
        if let Some((target, name)) = predictive
            .into_iter()
            .find_map(|(t, name)| t.filter(|&t| beyond(t, tp2)).map(|t| (t, name)))
        {
            tp3 = target;
            tp3_note = format!("moonbag at {name}");
        }

        let rr_level = match cfg.reward_risk_target {
            RewardRiskTarget::Tp2 => tp2,
            RewardRiskTarget::Tp3 => tp3,
        };
        let reward_risk = (rr_level - average_entry).abs() / risk;

        let mut red_flags = Vec::new();
        if reward_risk < cfg.min_reward_risk {
            red_flags.push(format!("reward:risk {reward_risk:.2} below {:.1}", cfg.min_reward_risk));
        }
        if (average_entry - stop_loss).abs() / price > 0.15 {
            red_flags.push(format!("stop {:.1}% away", (average_entry - stop_loss).abs() / price * 100.0));
        }
        debug!(side = %inp.side, average_entry, stop_loss, tp1, tp2, tp3, reward_risk, "DCA plan built");

        let [f1, f2, f3] = cfg.exit_fractions;
        Some(DcaPlan {
            side: inp.side,
            entries,
            average_entry,
            stop_loss,
            stop_source,
            take_profits: [
                TakeProfitLevel { price: tp1, exit_fraction: f1, note: tp1_note },
                TakeProfitLevel { price: tp2, exit_fraction: f2, note: "trend continuation".to_string() },
                TakeProfitLevel { price: tp3, exit_fraction: f3, note: tp3_note },
            ],
            reward_risk,
            red_flags,
        })
    }

    /// Rung 0 at market; rungs 1 and 2 at the nearest same-side POIs that keep
    /// distances strictly increasing, falling back to one spread-ATR steps.
    fn ladder(&self, inp: &DcaInputs<'_>, step: f64) -> Option<[DcaEntry; 3]> {
        let sign = inp.side.sign();
        let max_depth = self.config.max_depth_atr * step;
        let mut same_side: Vec<f64> = match inp.side {
            Side::Long => &inp.pois.top_supports,
            Side::Short => &inp.pois.top_resistances,
        }
        .iter()
        .map(|p| (inp.price - p.price) * sign)
        .filter(|d| *d > 0.0 && *d <= max_depth)
        .collect();
        same_side.sort_by(f64::total_cmp);

        let [a0, a1, a2] = self.config.allocations;
        let mut rungs = vec![DcaEntry {
            price: inp.price,
            allocation_pct: a0,
            source: "market".to_string(),
        }];
        let mut depth = 0.0;
        for alloc in [a1, a2] {
            let (next, source) = match same_side.iter().find(|&&d| d > depth) {
                Some(&d) => (d, "confluence POI".to_string()),
                None => (depth + step, "ATR spacing".to_string()),
            };
            depth = next;
            rungs.push(DcaEntry {
                price: inp.price - sign * depth,
                allocation_pct: alloc,
                source,
            });
        }
        rungs.try_into().ok()
    }
}

impl Default for DcaPlanner {
    fn default() -> Self {
        Self::new(DcaConfig::default(), TierTable::default())
    }
}
