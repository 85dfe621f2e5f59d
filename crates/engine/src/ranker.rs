use serde::{Deserialize, Serialize};
use tracing::debug;

use common::{
    Candle, DominanceTrend, MacroContext, MacroRegime, MarketRisk, Opportunity, RiskLevel, Side,
};
use strategy::indicators::{ema_alignment, moving, EmaAlignment};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RankerConfig {
    pub min_score: f64,
    /// Threshold used instead of `min_score` while market risk is HIGH.
    pub min_score_high_risk: f64,
    pub min_reward_risk: f64,
    /// Multiplier for trades fighting the reference regime.
    pub macro_penalty: f64,
    /// Scores at or above this ignore macro scaling.
    pub decoupled_score: f64,
    pub alt_penalty: f64,
    /// Maximum live-price drift from detection, in percent.
    pub max_drift_pct: f64,
    /// Distance past the 1h EMA200 (percent) at which an opposing 1h
    /// structure vetoes the trade.
    pub mtf_veto_pct: f64,
    pub mtf_penalty_per_pct: f64,
    pub mtf_penalty_cap: f64,
    pub top_n: usize,
}

impl Default for RankerConfig {
    fn default() -> Self {
        Self {
            min_score: 60.0,
            min_score_high_risk: 75.0,
            min_reward_risk: 1.0,
            macro_penalty: 0.85,
            decoupled_score: 90.0,
            alt_penalty: 0.9,
            max_drift_pct: 5.0,
            mtf_veto_pct: 3.0,
            mtf_penalty_per_pct: 5.0,
            mtf_penalty_cap: 20.0,
            top_n: 10,
        }
    }
}

/// 1h trend structure of a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HigherTimeframe {
    pub alignment: EmaAlignment,
    pub price: f64,
    pub ema200: f64,
}

impl HigherTimeframe {
    /// `None` below 200 bars.
    pub fn from_candles(candles: &[Candle]) -> Option<Self> {
        let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
        let ema200 = moving::ema(&closes, 200)?;
        let alignment = ema_alignment(
            moving::ema(&closes, 20)?,
            moving::ema(&closes, 50)?,
            moving::ema(&closes, 100)?,
            ema200,
        );
        Some(Self {
            alignment,
            price: *closes.last()?,
            ema200,
        })
    }

    fn opposes(&self, side: Side) -> bool {
        matches!(
            (side, self.alignment),
            (Side::Long, EmaAlignment::Bearish) | (Side::Short, EmaAlignment::Bullish)
        )
    }

    /// How far price sits on the wrong side of the 1h EMA200 for `side`, in
    /// percent. Zero or negative when price is on the trade's side.
    fn adverse_distance_pct(&self, side: Side) -> f64 {
        if self.ema200 <= 0.0 {
            return 0.0;
        }
        (self.ema200 - self.price) / self.ema200 * 100.0 * side.sign()
    }
}

/// A planned opportunity plus what the ranker needs to filter it.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub opportunity: Opportunity,
    /// False for the reference asset itself.
    pub is_alt: bool,
    pub live_price: Option<f64>,
    pub higher_timeframe: Option<HigherTimeframe>,
}

#[derive(Debug, Clone, Default)]
pub struct OpportunityRanker {
    config: RankerConfig,
}

impl OpportunityRanker {
    pub fn new(config: RankerConfig) -> Self {
        Self { config }
    }

    /// Threshold, macro scaling, staleness, 1h veto, then sort and truncate.
    pub fn rank(
        &self,
        candidates: Vec<Candidate>,
        market_risk: &MarketRisk,
        macro_context: Option<&MacroContext>,
    ) -> Vec<Opportunity> {
        let cfg = &self.config;
        let min_score = if market_risk.level == RiskLevel::High {
            cfg.min_score_high_risk
        } else {
            cfg.min_score
        };

        let mut ranked: Vec<Opportunity> = candidates
            .into_iter()
            .filter_map(|c| {
                let symbol = c.opportunity.symbol.clone();
                let side = c.opportunity.side;
                let score = c.opportunity.confidence_score;

                if score < min_score {
                    debug!(symbol = %symbol, score, min_score, "Below score threshold");
                    return None;
                }
                if c.opportunity.dca_plan.reward_risk < cfg.min_reward_risk {
                    debug!(symbol = %symbol, rr = c.opportunity.dca_plan.reward_risk, "Reward:risk too low");
                    return None;
                }

                let score = self.apply_macro(score, side, c.is_alt, macro_context);

                if let Some(live) = c.live_price {
                    let detected = c.opportunity.metrics.detection_price;
                    let drift = (live - detected).abs() / detected * 100.0;
                    if !drift.is_finite() || drift > cfg.max_drift_pct {
                        debug!(symbol = %symbol, drift, "Stale: price moved since detection");
                        return None;
                    }
                }

                let score = match c.higher_timeframe {
                    Some(htf) if htf.opposes(side) => {
                        let distance = htf.adverse_distance_pct(side);
                        if distance > cfg.mtf_veto_pct {
                            debug!(symbol = %symbol, distance, "Vetoed by opposing 1h structure");
                            return None;
                        }
                        let penalty = (cfg.mtf_penalty_per_pct * distance.abs()).min(cfg.mtf_penalty_cap);
                        (score - penalty).max(0.0)
                    }
                    _ => score,
                };

                let mut opportunity = c.opportunity;
                opportunity.confidence_score = score;
                Some(opportunity)
            })
            .collect();

        ranked.sort_by(|a, b| {
            b.confidence_score
                .total_cmp(&a.confidence_score)
                .then_with(|| a.symbol.cmp(&b.symbol))
        });
        ranked.truncate(cfg.top_n);
        ranked
    }

    fn apply_macro(&self, score: f64, side: Side, is_alt: bool, macro_context: Option<&MacroContext>) -> f64 {
        let cfg = &self.config;
        let Some(m) = macro_context else {
            return score;
        };
        if score >= cfg.decoupled_score {
            return score;
        }
        let mut score = score;
        let against_reference = matches!(
            (side, m.reference_regime),
            (Side::Long, MacroRegime::Bear) | (Side::Short, MacroRegime::Bull)
        );
        if against_reference {
            score *= cfg.macro_penalty;
        }
        if is_alt
            && side == Side::Long
            && m.dominance_trend == DominanceTrend::Rising
            && m.stablecoin_dominance_trend == DominanceTrend::Rising
        {
            score *= cfg.alt_penalty;
        }
        score
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use common::{
        DcaEntry, DcaPlan, FundamentalTier, OpportunityMetrics, Regime, RiskType, StopSource,
        TakeProfitLevel,
    };

    fn opportunity(symbol: &str, side: Side, score: f64, price: f64) -> Opportunity {
        let sign = side.sign();
        let entry = |p: f64, pct: f64| DcaEntry {
            price: p,
            allocation_pct: pct,
            source: "ATR spacing".into(),
        };
        let tp = |p: f64, f: f64| TakeProfitLevel {
            price: p,
            exit_fraction: f,
            note: String::new(),
        };
        let plan = DcaPlan {
            side,
            entries: [
                entry(price, 40.0),
                entry(price - sign, 30.0),
                entry(price - 2.0 * sign, 30.0),
            ],
            average_entry: price - 0.9 * sign,
            stop_loss: price - 4.0 * sign,
            stop_source: StopSource::AtrTier,
            take_profits: [
                tp(price + 4.0 * sign, 0.5),
                tp(price + 8.0 * sign, 0.3),
                tp(price + 12.0 * sign, 0.2),
            ],
            reward_risk: 2.8,
            red_flags: vec![],
        };
        Opportunity {
            symbol: symbol.into(),
            side,
            confidence_score: score,
            entry_zone: plan.entry_zone(),
            stop_loss: plan.stop_loss,
            take_profits: plan.targets(),
            metrics: OpportunityMetrics {
                regime: Regime::Trending,
                strategy: "trend".into(),
                tier: FundamentalTier::B,
                detection_price: price,
                rsi: 55.0,
                adx: 30.0,
                rvol: 1.2,
                atr: 1.0,
                z_score: 0.5,
                reward_risk: plan.reward_risk,
            },
            dca_plan: plan,
            technical_reasoning: String::new(),
            timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        }
    }

    fn candidate(symbol: &str, side: Side, score: f64) -> Candidate {
        Candidate {
            opportunity: opportunity(symbol, side, score, 100.0),
            is_alt: true,
            live_price: Some(100.0),
            higher_timeframe: None,
        }
    }

    fn high_risk() -> MarketRisk {
        MarketRisk {
            level: RiskLevel::High,
            note: "test".into(),
            risk_type: RiskType::Volatility,
        }
    }

    #[test]
    fn six_percent_drift_is_stale() {
        let mut c = candidate("ARBUSDT", Side::Long, 95.0);
        c.live_price = Some(106.0);
        let kept = candidate("OPUSDT", Side::Long, 70.0);
        let out = OpportunityRanker::default().rank(vec![c, kept], &MarketRisk::normal(), None);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].symbol, "OPUSDT");
    }

    #[test]
    fn missing_live_price_is_not_stale() {
        let mut c = candidate("ARBUSDT", Side::Long, 80.0);
        c.live_price = None;
        let out = OpportunityRanker::default().rank(vec![c], &MarketRisk::normal(), None);
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn high_risk_raises_the_bar() {
        let ranker = OpportunityRanker::default();
        let mid = || vec![candidate("ARBUSDT", Side::Long, 70.0)];
        assert_eq!(ranker.rank(mid(), &MarketRisk::normal(), None).len(), 1);
        assert!(ranker.rank(mid(), &high_risk(), None).is_empty());
    }

    #[test]
    fn bear_reference_scales_longs_but_not_runners() {
        let m = MacroContext {
            reference_regime: MacroRegime::Bear,
            ..MacroContext::default()
        };
        let out = OpportunityRanker::default().rank(
            vec![
                candidate("ARBUSDT", Side::Long, 80.0),
                candidate("OPUSDT", Side::Long, 92.0),
                candidate("SUIUSDT", Side::Short, 70.0),
            ],
            &MarketRisk::normal(),
            Some(&m),
        );
        let score = |s: &str| out.iter().find(|o| o.symbol == s).unwrap().confidence_score;
        assert!((score("ARBUSDT") - 68.0).abs() < 1e-9);
        assert_eq!(score("OPUSDT"), 92.0);
        assert_eq!(score("SUIUSDT"), 70.0);
    }

    #[test]
    fn rising_dominance_scales_alt_longs() {
        let m = MacroContext {
            reference_regime: MacroRegime::Neutral,
            dominance_trend: DominanceTrend::Rising,
            stablecoin_dominance_trend: DominanceTrend::Rising,
        };
        let mut reference = candidate("BTCUSDT", Side::Long, 80.0);
        reference.is_alt = false;
        let out = OpportunityRanker::default().rank(
            vec![reference, candidate("ARBUSDT", Side::Long, 80.0)],
            &MarketRisk::normal(),
            Some(&m),
        );
        assert_eq!(out[0].symbol, "BTCUSDT");
        assert_eq!(out[0].confidence_score, 80.0);
        assert!((out[1].confidence_score - 72.0).abs() < 1e-9);
    }

    #[test]
    fn opposing_hourly_structure_vetoes_or_penalises() {
        let htf = |price: f64| HigherTimeframe {
            alignment: EmaAlignment::Bearish,
            price,
            ema200: 100.0,
        };
        let mut deep = candidate("ARBUSDT", Side::Long, 85.0);
        deep.higher_timeframe = Some(htf(96.0));
        let mut shallow = candidate("OPUSDT", Side::Long, 85.0);
        shallow.higher_timeframe = Some(htf(98.0));
        let mut aligned = candidate("SUIUSDT", Side::Short, 85.0);
        aligned.higher_timeframe = Some(htf(96.0));

        let out = OpportunityRanker::default().rank(vec![deep, shallow, aligned], &MarketRisk::normal(), None);
        let symbols: Vec<&str> = out.iter().map(|o| o.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["SUIUSDT", "OPUSDT"]);
        // 2% below the 1h EMA200 costs 10 points
        assert!((out[1].confidence_score - 75.0).abs() < 1e-9);
    }

    #[test]
    fn sorted_and_truncated() {
        let candidates = (0..15)
            .map(|i| candidate(&format!("A{i:02}USDT"), Side::Long, 60.0 + i as f64))
            .collect();
        let out = OpportunityRanker::default().rank(candidates, &MarketRisk::normal(), None);
        assert_eq!(out.len(), 10);
        assert_eq!(out[0].confidence_score, 74.0);
        assert!(out.windows(2).all(|w| w[0].confidence_score >= w[1].confidence_score));
    }

    #[test]
    fn low_reward_risk_is_rejected() {
        let mut c = candidate("ARBUSDT", Side::Long, 80.0);
        c.opportunity.dca_plan.reward_risk = 0.8;
        assert!(OpportunityRanker::default()
            .rank(vec![c], &MarketRisk::normal(), None)
            .is_empty());
    }
}
