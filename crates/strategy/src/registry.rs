use std::collections::HashMap;

use serde::Serialize;
use tracing::{debug, info};

use common::{Regime, Signal};

use crate::config::{ConfigError, StrategyFileConfig};
use crate::runners::{build_runner, MarketSnapshot, Strategy, StrategyOutcome};
use crate::selector::{RegimeWeightTable, StrategyId, StrategySelection};

/// Weighted score above which a strategy contributes to the vote.
pub const MATERIALITY: f64 = 10.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeightedOutcome {
    pub id: StrategyId,
    pub weight: f64,
    pub weighted_score: f64,
    pub outcome: StrategyOutcome,
}

/// Result of running the active strategies for one asset.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StrategyVote {
    pub selection: StrategySelection,
    pub primary: Option<StrategyId>,
    pub signal: Signal,
    pub composite_score: f64,
    pub outcomes: Vec<WeightedOutcome>,
    pub notes: Vec<String>,
}

/// One runner per strategy id plus the regime weight table, built once at
/// startup.
pub struct StrategyRegistry {
    runners: HashMap<StrategyId, Box<dyn Strategy>>,
    weights: RegimeWeightTable,
}

impl StrategyRegistry {
    pub fn from_config(file_cfg: &StrategyFileConfig) -> Result<Self, ConfigError> {
        for cfg in &file_cfg.strategies {
            // Reject typos early.
            cfg.id.parse::<StrategyId>()?;
        }
        let mut weights = RegimeWeightTable::default().with_overrides(&file_cfg.weights)?;

        let mut runners: HashMap<StrategyId, Box<dyn Strategy>> = HashMap::new();
        for id in StrategyId::ALL {
            let enabled = file_cfg
                .strategies
                .iter()
                .filter(|s| s.id.eq_ignore_ascii_case(id.as_str()))
                .all(|s| s.enabled);
            if !enabled {
                weights.disable(id);
                info!(strategy = %id, "Strategy disabled by config");
                continue;
            }
            let runner = build_runner(id, &file_cfg.params_for(id));
            debug!(strategy = %runner.id(), "Registered strategy");
            runners.insert(runner.id(), runner);
        }

        Ok(Self { runners, weights })
    }

    pub fn weights(&self) -> &RegimeWeightTable {
        &self.weights
    }

    /// Run every strategy with non-zero weight for `regime` and tally the vote.
    pub fn evaluate(&self, regime: Regime, snapshot: &MarketSnapshot<'_>) -> StrategyVote {
        let selection = self.weights.select(regime);
        let outcomes: Vec<WeightedOutcome> = selection
            .active
            .iter()
            .filter_map(|w| {
                let runner = self.runners.get(&w.id)?;
                let outcome = runner.evaluate(snapshot);
                Some(WeightedOutcome {
                    id: runner.id(),
                    weight: w.weight,
                    weighted_score: outcome.score * w.weight,
                    outcome,
                })
            })
            .collect();

        tally(selection, outcomes)
    }
}

impl Default for StrategyRegistry {
    fn default() -> Self {
        let runners = StrategyId::ALL
            .into_iter()
            .map(|id| build_runner(id, &HashMap::new()))
            .map(|runner| (runner.id(), runner))
            .collect();
        Self {
            runners,
            weights: RegimeWeightTable::default(),
        }
    }
}

/// Primary = highest weighted non-neutral outcome. Composite = primary raw
/// score, plus the weighted scores of other material strategies that agree,
/// minus half of those that oppose, clamped to 0–100.
pub fn tally(selection: StrategySelection, outcomes: Vec<WeightedOutcome>) -> StrategyVote {
    let primary = outcomes
        .iter()
        .filter(|o| o.outcome.signal != Signal::Neutral && o.outcome.score > 0.0)
        .max_by(|a, b| a.weighted_score.total_cmp(&b.weighted_score));

    let Some(primary) = primary else {
        return StrategyVote {
            selection,
            primary: None,
            signal: Signal::Neutral,
            composite_score: 0.0,
            notes: Vec::new(),
            outcomes,
        };
    };

    let primary_id = primary.id;
    let signal = primary.outcome.signal;
    let mut composite = primary.outcome.score;
    let mut notes = Vec::new();
    for o in outcomes.iter().filter(|o| o.weighted_score > MATERIALITY) {
        notes.push(format!("{} ({:.0}): {}", o.id, o.weighted_score, o.outcome.reason));
        if o.id == primary_id {
            continue;
        }
        if o.outcome.signal == signal {
            composite += o.weighted_score;
        } else if o.outcome.signal != Signal::Neutral {
            composite -= o.weighted_score / 2.0;
        }
    }

    StrategyVote {
        selection,
        primary: Some(primary_id),
        signal,
        composite_score: composite.clamp(0.0, 100.0),
        notes,
        outcomes,
    }
}
