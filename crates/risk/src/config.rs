use serde::{Deserialize, Serialize};

use crate::confluence::ConfluenceWeights;
use crate::dca::DcaConfig;
use crate::market::MarketRiskThresholds;
use crate::tier::TierTable;

/// User-configurable risk and execution-planning parameters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    pub market: MarketRiskThresholds,
    pub tiers: TierTable,
    pub confluence: ConfluenceWeights,
    pub dca: DcaConfig,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dca::RewardRiskTarget;

    #[test]
    fn partial_tables_keep_defaults() {
        let cfg: RiskConfig = toml::from_str(
            r#"
            [dca]
            reward_risk_target = "tp3"
            spread_volatile = 2.0

            [tiers]
            s_tier = ["BTC"]
            "#,
        )
        .unwrap();
        assert_eq!(cfg.dca.reward_risk_target, RewardRiskTarget::Tp3);
        assert_eq!(cfg.dca.spread_volatile, 2.0);
        assert_eq!(cfg.dca.allocations, [40.0, 30.0, 30.0]);
        assert_eq!(cfg.tiers.s_tier, vec!["BTC".to_string()]);
        assert!(!cfg.tiers.a_tier.is_empty());
        assert_eq!(cfg.market.window, 24);
    }
}
