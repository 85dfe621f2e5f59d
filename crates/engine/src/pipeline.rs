use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use risk::{ConfluenceEngine, DcaPlanner, RiskConfig};
use strategy::{ConfigError, RegimeDetector, StrategyFileConfig, StrategyRegistry};

use crate::ranker::{OpportunityRanker, RankerConfig};

/// Everything tunable about the scan pipeline, loaded from one TOML file.
///
/// Strategy keys (`[weights.*]`, `[[strategy]]`, `[indicators]`,
/// `[structure]`, `[regime]`) sit at the top level; `[risk]` and `[ranker]`
/// hold the rest.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct PipelineConfig {
    #[serde(flatten)]
    pub strategies: StrategyFileConfig,
    #[serde(default)]
    pub risk: RiskConfig,
    #[serde(default)]
    pub ranker: RankerConfig,
}

impl PipelineConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Like [`PipelineConfig::load`], but a missing file means defaults.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            info!(path = %path.display(), "Pipeline config not found, using defaults");
            return Ok(Self::default());
        }
        Self::load(path)
    }
}

/// Immutable, fully built pipeline. Constructed once and shared by every
/// per-asset task of every cycle.
pub struct Pipeline {
    pub config: PipelineConfig,
    pub registry: StrategyRegistry,
    pub regime: RegimeDetector,
    pub confluence: ConfluenceEngine,
    pub planner: DcaPlanner,
    pub ranker: OpportunityRanker,
}

impl Pipeline {
    pub fn from_config(config: PipelineConfig) -> Result<Self, ConfigError> {
        config.strategies.indicators.validate()?;
        let registry = StrategyRegistry::from_config(&config.strategies)?;
        Ok(Self {
            regime: RegimeDetector::new(config.strategies.regime.clone()),
            confluence: ConfluenceEngine::new(config.risk.confluence.clone()),
            planner: DcaPlanner::new(config.risk.dca.clone(), config.risk.tiers.clone()),
            ranker: OpportunityRanker::new(config.ranker.clone()),
            registry,
            config,
        })
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline").field("config", &self.config).finish_non_exhaustive()
    }
}
