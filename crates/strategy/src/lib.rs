pub mod config;
pub mod indicators;
pub mod regime;
pub mod registry;
pub mod runners;
pub mod selector;
pub mod structure;

#[cfg(test)]
mod testing;

pub use config::{ConfigError, StrategyConfig, StrategyFileConfig};
pub use indicators::{IndicatorParams, IndicatorSet};
pub use regime::{MarketRegime, RegimeDetector, RegimeThresholds};
pub use registry::{StrategyRegistry, StrategyVote};
pub use runners::{MarketSnapshot, Strategy, StrategyOutcome};
pub use selector::{RegimeWeightTable, StrategyId, StrategySelection, StrategyWeight};
pub use structure::{StructureParams, StructureSet};
