//! Confluence scoring: every structural level near the same price adds to a
//! shared point of interest, and agreement between independent factor kinds
//! multiplies the score.

use serde::{Deserialize, Serialize};

use strategy::indicators::{Fibonacci, Pivots};
use strategy::structure::{FairValueGaps, OrderBlocks, VolumeProfile};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfluenceWeights {
    pub fib_618: f64,
    pub fib_key: f64,
    pub fib_other: f64,
    pub pivot_primary: f64,
    pub pivot_secondary: f64,
    pub ema200: f64,
    pub ema50: f64,
    pub poc: f64,
    pub value_area: f64,
    pub order_block: f64,
    pub fvg: f64,
    pub order_book_wall: f64,
    pub liquidation_cluster: f64,
    /// Cluster radius in ATR.
    pub tolerance_atr: f64,
    /// Score multiplier per additional distinct factor kind.
    pub kind_bonus: f64,
    pub top_n: usize,
}

impl Default for ConfluenceWeights {
    fn default() -> Self {
        Self {
            fib_618: 3.0,
            fib_key: 2.0,
            fib_other: 1.0,
            pivot_primary: 1.5,
            pivot_secondary: 1.0,
            ema200: 3.0,
            ema50: 2.0,
            poc: 3.0,
            value_area: 2.0,
            order_block: 2.0,
            fvg: 1.5,
            order_book_wall: 2.5,
            liquidation_cluster: 2.5,
            tolerance_atr: 0.5,
            kind_bonus: 0.25,
            top_n: 5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
enum FactorKind {
    Fibonacci,
    Pivot,
    MovingAverage,
    VolumeProfile,
    OrderBlock,
    FairValueGap,
    OrderBook,
    Liquidation,
}

#[derive(Debug, Clone)]
struct Candidate {
    price: f64,
    weight: f64,
    kind: FactorKind,
    label: String,
}

/// A scored support or resistance level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfluencePoi {
    pub price: f64,
    pub score: f64,
    pub factors: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfluenceMap {
    pub top_supports: Vec<ConfluencePoi>,
    pub top_resistances: Vec<ConfluencePoi>,
}

pub struct ConfluenceInputs<'a> {
    pub price: f64,
    pub atr: f64,
    pub fibonacci: &'a Fibonacci,
    pub pivots: &'a Pivots,
    pub ema50: f64,
    pub ema200: f64,
    pub volume_profile: &'a VolumeProfile,
    pub order_blocks: &'a OrderBlocks,
    pub fair_value_gaps: &'a FairValueGaps,
    pub order_book_wall: Option<f64>,
    pub liquidation_cluster: Option<f64>,
}

pub struct ConfluenceEngine {
    weights: ConfluenceWeights,
}

impl ConfluenceEngine {
    pub fn new(weights: ConfluenceWeights) -> Self {
        Self { weights }
    }

    pub fn compute(&self, inputs: &ConfluenceInputs<'_>) -> ConfluenceMap {
        let candidates = self.candidates(inputs);
        let price = inputs.price;
        let (supports, resistances): (Vec<Candidate>, Vec<Candidate>) = candidates
            .into_iter()
            .filter(|c| c.price.is_finite() && c.price > 0.0 && c.price != price)
            .partition(|c| c.price < price);

        ConfluenceMap {
            top_supports: self.rank(supports, price, inputs.atr),
            top_resistances: self.rank(resistances, price, inputs.atr),
        }
    }

    fn candidates(&self, i: &ConfluenceInputs<'_>) -> Vec<Candidate> {
        let w = &self.weights;
        let mut out = Vec::new();
        let mut push = |price: f64, weight: f64, kind: FactorKind, label: String| {
            out.push(Candidate { price, weight, kind, label });
        };

        for (ratio, level) in i.fibonacci.retracements() {
            let weight = match ratio {
                "0.618" => w.fib_618,
                "0.5" | "0.786" => w.fib_key,
                _ => w.fib_other,
            };
            push(level, weight, FactorKind::Fibonacci, format!("fib {ratio}"));
        }

        let p = i.pivots;
        for (name, level, weight) in [
            ("P", p.p, w.pivot_primary),
            ("R1", p.r1, w.pivot_primary),
            ("S1", p.s1, w.pivot_primary),
            ("R2", p.r2, w.pivot_secondary),
            ("S2", p.s2, w.pivot_secondary),
        ] {
            push(level, weight, FactorKind::Pivot, format!("pivot {name}"));
        }

        push(i.ema200, w.ema200, FactorKind::MovingAverage, "EMA200".to_string());
        push(i.ema50, w.ema50, FactorKind::MovingAverage, "EMA50".to_string());

        if !i.volume_profile.is_empty() {
            let vp = i.volume_profile;
            push(vp.poc, w.poc, FactorKind::VolumeProfile, "POC".to_string());
            push(vp.value_area_high, w.value_area, FactorKind::VolumeProfile, "VAH".to_string());
            push(vp.value_area_low, w.value_area, FactorKind::VolumeProfile, "VAL".to_string());
        }

        for (side, blocks) in [("bullish", &i.order_blocks.bullish), ("bearish", &i.order_blocks.bearish)] {
            for ob in blocks.iter().filter(|b| !b.mitigated) {
                push(
                    ob.price,
                    w.order_block + ob.strength / 50.0,
                    FactorKind::OrderBlock,
                    format!("{side} OB"),
                );
            }
        }

        let gaps = i.fair_value_gaps;
        for gap in gaps.open_bullish() {
            push(gap.midpoint, w.fvg, FactorKind::FairValueGap, "bullish FVG".to_string());
        }
        for gap in gaps.open_bearish() {
            push(gap.midpoint, w.fvg, FactorKind::FairValueGap, "bearish FVG".to_string());
        }

        if let Some(wall) = i.order_book_wall {
            push(wall, w.order_book_wall, FactorKind::OrderBook, "order-book wall".to_string());
        }
        if let Some(cluster) = i.liquidation_cluster {
            push(cluster, w.liquidation_cluster, FactorKind::Liquidation, "liquidation cluster".to_string());
        }
        out
    }

    /// Cluster candidates within the ATR tolerance (nearest to price first),
    /// score, sort and keep the top N.
    fn rank(&self, mut side: Vec<Candidate>, price: f64, atr: f64) -> Vec<ConfluencePoi> {
        let tol = self.weights.tolerance_atr * atr.max(0.0);
        side.sort_by(|a, b| (a.price - price).abs().total_cmp(&(b.price - price).abs()));

        // (anchor price, members)
        let mut clusters: Vec<(f64, Vec<Candidate>)> = Vec::new();
        for c in side {
            match clusters.iter_mut().find(|(anchor, _)| (c.price - anchor).abs() <= tol) {
                Some((_, members)) => members.push(c),
                None => clusters.push((c.price, vec![c])),
            }
        }

        let mut pois: Vec<ConfluencePoi> = clusters
            .into_iter()
            .map(|(_, members)| {
                let total: f64 = members.iter().map(|m| m.weight).sum();
                let level = if total > 0.0 {
                    members.iter().map(|m| m.price * m.weight).sum::<f64>() / total
                } else {
                    // Zero-weighted factors: plain mean
                    members.iter().map(|m| m.price).sum::<f64>() / members.len() as f64
                };
                let mut kinds: Vec<FactorKind> = members.iter().map(|m| m.kind).collect();
                kinds.sort();
                kinds.dedup();
                let score = total * (1.0 + self.weights.kind_bonus * (kinds.len() as f64 - 1.0));
                ConfluencePoi {
                    price: level,
                    score,
                    factors: members.into_iter().map(|m| m.label).collect(),
                }
            })
            .collect();

        pois.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then(b.factors.len().cmp(&a.factors.len()))
                .then((a.price - price).abs().total_cmp(&(b.price - price).abs()))
        });
        pois.truncate(self.weights.top_n);
        pois
    }
}

impl Default for ConfluenceEngine {
    fn default() -> Self {
        Self::new(ConfluenceWeights::default())
    }
}
