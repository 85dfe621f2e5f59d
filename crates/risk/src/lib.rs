pub mod config;
pub mod confluence;
pub mod dca;
pub mod market;
pub mod tier;

pub use config::RiskConfig;
pub use confluence::{ConfluenceEngine, ConfluenceInputs, ConfluenceMap, ConfluencePoi, ConfluenceWeights};
pub use dca::{DcaConfig, DcaInputs, DcaPlanner, PredictiveTargets, RewardRiskTarget};
pub use market::{assess_market_risk, MarketRiskThresholds};
pub use tier::{TierTable, TierValues};
