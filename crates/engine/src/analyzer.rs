//! Per-asset evaluation: candles in, at most one planned opportunity out.
//!
//! Split in two so the caller can fetch side-dependent enrichment (order-book
//! walls, liquidation clusters) between the vote and the plan. Both halves are
//! pure and never touch the network.

use chrono::{DateTime, Utc};
use tracing::debug;

use common::{Candle, Error, Opportunity, OpportunityMetrics, Result, Side};
use risk::{ConfluenceInputs, DcaInputs, PredictiveTargets};
use strategy::{
    IndicatorSet, MarketRegime, MarketSnapshot, StrategyId, StrategyVote, StructureSet,
};

use crate::pipeline::Pipeline;

/// Best-effort market-microstructure inputs. `None` is a normal state.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MarketEnrichment {
    pub order_book_wall: Option<f64>,
    pub liquidation_cluster: Option<f64>,
}

/// Everything derived from one candle window before planning.
#[derive(Debug, Clone)]
pub struct Analysis {
    pub symbol: String,
    pub indicators: IndicatorSet,
    pub structure: StructureSet,
    pub regime: MarketRegime,
    pub vote: StrategyVote,
    /// Timestamp of the last closed candle.
    pub timestamp: DateTime<Utc>,
}

impl Analysis {
    /// Direction of the vote, if any strategy produced one.
    pub fn side(&self) -> Option<Side> {
        self.vote.signal.side()
    }
}

impl Pipeline {
    /// Indicators, structure, regime and the weighted strategy vote.
    ///
    /// Fails with [`Error::InsufficientData`] when the window is too short
    /// for the indicator set; the caller skips the asset.
    pub fn analyze(&self, symbol: &str, candles: &[Candle]) -> Result<Analysis> {
        let params = &self.config.strategies.indicators;
        let need = params.min_bars.max(200);
        let indicators = IndicatorSet::compute(candles, params).ok_or_else(|| Error::InsufficientData {
            symbol: symbol.to_string(),
            have: candles.len(),
            need,
        })?;
        let last = candles.last().ok_or_else(|| Error::InsufficientData {
            symbol: symbol.to_string(),
            have: 0,
            need,
        })?;

        let structure = StructureSet::analyze(candles, &indicators, params, &self.config.strategies.structure);
        let regime = self.regime.detect(&indicators);
        let snapshot = MarketSnapshot {
            candles,
            indicators: &indicators,
            structure: &structure,
        };
        let vote = self.registry.evaluate(regime.regime, &snapshot);
        debug!(
            symbol,
            regime = %regime.regime,
            signal = ?vote.signal,
            score = vote.composite_score,
            "Asset analyzed"
        );

        Ok(Analysis {
            symbol: symbol.to_string(),
            timestamp: last.timestamp,
            indicators,
            structure,
            regime,
            vote,
        })
    }

    /// Confluence, tier and DCA plan for a directional vote. `None` for a
    /// neutral vote or when no plan can be built.
    pub fn plan(&self, analysis: &Analysis, enrichment: MarketEnrichment) -> Option<Opportunity> {
        let side = analysis.side()?;
        let ind = &analysis.indicators;
        let st = &analysis.structure;

        let speculative = analysis.vote.primary == Some(StrategyId::Momentum);
        let tier = self.config.risk.tiers.classify(&analysis.symbol, speculative);

        let pois = self.confluence.compute(&ConfluenceInputs {
            price: ind.price,
            atr: ind.atr,
            fibonacci: &ind.fibonacci,
            pivots: &ind.pivots,
            ema50: ind.ema50,
            ema200: ind.ema200,
            volume_profile: &st.volume_profile,
            order_blocks: &st.order_blocks,
            fair_value_gaps: &st.fair_value_gaps,
            order_book_wall: enrichment.order_book_wall,
            liquidation_cluster: enrichment.liquidation_cluster,
        });

        let plan = self.planner.plan(&DcaInputs {
            side,
            price: ind.price,
            atr: ind.atr,
            regime: analysis.regime.regime,
            tier,
            pois: &pois,
            fibonacci: &ind.fibonacci,
            harmonics: &st.harmonics,
            predictive: PredictiveTargets {
                oscillator_target: oscillator_target(analysis, side),
                order_book_wall: enrichment.order_book_wall,
                liquidation_cluster: enrichment.liquidation_cluster,
            },
        })?;

        let strategy = analysis
            .vote
            .primary
            .map(|id| id.as_str().to_string())
            .unwrap_or_default();

        let mut reasoning = vec![analysis.regime.reasoning.clone()];
        reasoning.extend(analysis.vote.notes.iter().cloned());
        reasoning.extend(plan.red_flags.iter().map(|f| format!("red flag: {f}")));

        Some(Opportunity {
            symbol: analysis.symbol.clone(),
            side,
            confidence_score: analysis.vote.composite_score,
            entry_zone: plan.entry_zone(),
            stop_loss: plan.stop_loss,
            take_profits: plan.targets(),
            metrics: OpportunityMetrics {
                regime: analysis.regime.regime,
                strategy,
                tier,
                detection_price: ind.price,
                rsi: ind.rsi,
                adx: ind.adx,
                rvol: ind.rvol,
                atr: ind.atr,
                z_score: ind.z_score,
                reward_risk: plan.reward_risk,
            },
            dca_plan: plan,
            technical_reasoning: reasoning.join("; "),
            timestamp: analysis.timestamp,
        })
    }
}

/// Swing extreme an aligned oscillator divergence points back to.
fn oscillator_target(analysis: &Analysis, side: Side) -> Option<f64> {
    analysis.structure.strongest_divergence(side == Side::Long)?;
    let fib = &analysis.indicators.fibonacci;
    let (hi, lo) = (fib.level0.max(fib.level1), fib.level0.min(fib.level1));
    Some(match side {
        Side::Long => hi,
        Side::Short => lo,
    })
}
