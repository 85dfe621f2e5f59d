use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use common::{
    Candle, CandleSource, Config, Error, Interval, MacroContext, MacroRegime, MarketRisk, Opportunity,
    Result,
};
use risk::assess_market_risk;
use strategy::indicators::moving;

use crate::analyzer::MarketEnrichment;
use crate::pipeline::Pipeline;
use crate::ranker::{Candidate, HigherTimeframe};

/// Which symbols to scan and on what interval.
#[derive(Debug, Clone)]
pub struct ScanSettings {
    pub symbols: Vec<String>,
    pub reference_symbol: String,
    pub interval: Interval,
}

impl ScanSettings {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            symbols: cfg.symbols.clone(),
            reference_symbol: cfg.reference_symbol.clone(),
            interval: cfg.interval,
        }
    }
}

/// Read-only inputs shared by every asset task of one cycle.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CycleContext {
    pub cycle_id: u64,
    pub market_risk: MarketRisk,
    pub macro_context: MacroContext,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanReport {
    /// Unique across restarts; `cycle_id` restarts at 1 with the process.
    pub scan_id: Uuid,
    pub cycle_id: u64,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub market_risk: MarketRisk,
    pub macro_context: MacroContext,
    pub opportunities: Vec<Opportunity>,
    /// Assets that produced a full analysis, with or without a signal.
    pub evaluated: usize,
    /// Assets with too little history.
    pub skipped: usize,
    /// Assets whose task errored or panicked.
    pub failed: usize,
}

enum AssetOutcome {
    Skipped,
    NoSignal,
    Candidate(Box<Candidate>),
}

/// One scan cycle: market context first, then one task per symbol, then rank.
pub struct Scanner {
    source: Arc<dyn CandleSource>,
    pipeline: Arc<Pipeline>,
    settings: ScanSettings,
    macro_override: Option<MacroContext>,
}

impl Scanner {
    pub fn new(source: Arc<dyn CandleSource>, pipeline: Arc<Pipeline>, settings: ScanSettings) -> Self {
        Self {
            source,
            pipeline,
            settings,
            macro_override: None,
        }
    }

    /// Use an externally supplied macro snapshot instead of deriving one
    /// from the reference asset.
    pub fn with_macro_context(mut self, macro_context: MacroContext) -> Self {
        self.macro_override = Some(macro_context);
        self
    }

    pub fn settings(&self) -> &ScanSettings {
        &self.settings
    }

    /// Run one full cycle.
    ///
    /// Only a failure to establish the cycle context (reference asset
    /// unreachable or too short) is an error; per-asset failures are logged
    /// and counted in the report.
    pub async fn run_cycle(&self, cycle_id: u64) -> Result<ScanReport> {
        let started_at = Utc::now();
        let reference = &self.settings.reference_symbol;

        let reference_candles = self
            .source
            .fetch_candles(reference, Interval::H1)
            .await
            .map_err(|e| Error::DataSourceUnavailable(format!("reference {reference}: {e}")))?;
        let market_risk = assess_market_risk(&reference_candles, &self.pipeline.config.risk.market)
            .map_err(|e| Error::DataSourceUnavailable(format!("reference {reference}: {e}")))?;
        let macro_context = self
            .macro_override
            .unwrap_or_else(|| derive_macro_context(&reference_candles));
        info!(
            cycle_id,
            risk = ?market_risk.level,
            risk_type = %market_risk.risk_type,
            reference_regime = ?macro_context.reference_regime,
            symbols = self.settings.symbols.len(),
            "Scan cycle starting"
        );

        let ctx = Arc::new(CycleContext {
            cycle_id,
            market_risk,
            macro_context,
        });

        let mut tasks = JoinSet::new();
        for symbol in &self.settings.symbols {
            let source = self.source.clone();
            let pipeline = self.pipeline.clone();
            let ctx = ctx.clone();
            let symbol = symbol.clone();
            let interval = self.settings.interval;
            let is_alt = !symbol.eq_ignore_ascii_case(reference);
            tasks.spawn(async move {
                let outcome = evaluate_symbol(source.as_ref(), &pipeline, &ctx, &symbol, interval, is_alt).await;
                (symbol, outcome)
            });
        }

        let (mut candidates, mut evaluated, mut skipped, mut failed) = (Vec::new(), 0, 0, 0);
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((_, Ok(AssetOutcome::Candidate(c)))) => {
                    evaluated += 1;
                    candidates.push(*c);
                }
                Ok((_, Ok(AssetOutcome::NoSignal))) => evaluated += 1,
                Ok((_, Ok(AssetOutcome::Skipped))) => skipped += 1,
                Ok((symbol, Err(e))) => {
                    warn!(symbol = %symbol, error = %e, "Asset evaluation failed, excluded from cycle");
                    failed += 1;
                }
                Err(e) => {
                    error!(error = %e, "Asset task aborted, excluded from cycle");
                    failed += 1;
                }
            }
        }

        let candidate_count = candidates.len();
        let opportunities = self
            .pipeline
            .ranker
            .rank(candidates, &ctx.market_risk, Some(&ctx.macro_context));
        info!(
            cycle_id,
            evaluated,
            skipped,
            failed,
            candidates = candidate_count,
            ranked = opportunities.len(),
            "Scan cycle complete"
        );

        Ok(ScanReport {
            scan_id: Uuid::new_v4(),
            cycle_id,
            started_at,
            finished_at: Utc::now(),
            market_risk: ctx.market_risk.clone(),
            macro_context: ctx.macro_context,
            opportunities,
            evaluated,
            skipped,
            failed,
        })
    }
}

async fn evaluate_symbol(
    source: &dyn CandleSource,
    pipeline: &Pipeline,
    ctx: &CycleContext,
    symbol: &str,
    interval: Interval,
    is_alt: bool,
) -> Result<AssetOutcome> {
    let cycle_id = ctx.cycle_id;
    let candles = source.fetch_candles(symbol, interval).await?;
    let analysis = match pipeline.analyze(symbol, &candles) {
        Ok(a) => a,
        Err(Error::InsufficientData { have, need, .. }) => {
            debug!(cycle_id, symbol, have, need, "Not enough history, skipping");
            return Ok(AssetOutcome::Skipped);
        }
        Err(e) => return Err(e),
    };
    let Some(side) = analysis.side() else {
        debug!(cycle_id, symbol, "No directional vote");
        return Ok(AssetOutcome::NoSignal);
    };

    let enrichment = MarketEnrichment {
        order_book_wall: best_effort(symbol, "order_book_wall", source.order_book_wall(symbol, side).await),
        liquidation_cluster: best_effort(
            symbol,
            "liquidation_cluster",
            source.liquidation_cluster(symbol, side).await,
        ),
    };
    let Some(opportunity) = pipeline.plan(&analysis, enrichment) else {
        debug!(cycle_id, symbol, side = %side, "No executable plan");
        return Ok(AssetOutcome::NoSignal);
    };
    debug!(
        cycle_id,
        symbol,
        side = %side,
        score = opportunity.confidence_score,
        market_risk = ?ctx.market_risk.level,
        "Candidate planned"
    );

    let higher_timeframe = if interval == Interval::H1 {
        HigherTimeframe::from_candles(&candles)
    } else {
        match source.fetch_candles(symbol, Interval::H1).await {
            Ok(hourly) => HigherTimeframe::from_candles(&hourly),
            Err(e) => {
                debug!(symbol, error = %e, "No 1h candles, skipping multi-timeframe check");
                None
            }
        }
    };
    let live_price = match source.current_price(symbol).await {
        Ok(p) => Some(p),
        Err(e) => {
            debug!(symbol, error = %e, "No live price, skipping staleness check");
            None
        }
    };

    Ok(AssetOutcome::Candidate(Box::new(Candidate {
        opportunity,
        is_alt,
        live_price,
        higher_timeframe,
    })))
}

fn best_effort(symbol: &str, what: &'static str, result: Result<Option<f64>>) -> Option<f64> {
    result.unwrap_or_else(|e| {
        debug!(symbol, enrichment = what, error = %e, "Enrichment unavailable");
        None
    })
}

/// Reference regime from the 1h EMA50/EMA200 relationship.
pub fn derive_macro_context(reference_candles: &[Candle]) -> MacroContext {
    let closes: Vec<f64> = reference_candles.iter().map(|c| c.close).collect();
    let reference_regime = match (moving::ema(&closes, 50), moving::ema(&closes, 200)) {
        (Some(fast), Some(slow)) if fast > slow => MacroRegime::Bull,
        (Some(fast), Some(slow)) if fast < slow => MacroRegime::Bear,
        _ => MacroRegime::Neutral,
    };
    MacroContext {
        reference_regime,
        ..MacroContext::default()
    }
}
