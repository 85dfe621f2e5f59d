use serde::{Deserialize, Serialize};
use tracing::debug;

use common::{Candle, Error, MarketRisk, Result, RiskLevel, RiskType};

/// Thresholds for the reference-asset risk flag. Ratios compare the current
/// bar against the trailing window mean; percentages are bar range over close.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketRiskThresholds {
    pub window: usize,
    pub manipulation_volume: f64,
    pub volatility_range: f64,
    pub volatility_range_pct: f64,
    pub medium_volume: f64,
    pub medium_range: f64,
    pub medium_range_pct: f64,
}

impl Default for MarketRiskThresholds {
    fn default() -> Self {
        Self {
            window: 24,
            manipulation_volume: 3.5,
            volatility_range: 3.0,
            volatility_range_pct: 2.5,
            medium_volume: 2.0,
            medium_range: 1.8,
            medium_range_pct: 1.5,
        }
    }
}

/// Classify global market risk from the reference asset's 1h candles.
///
/// Computed once per scan cycle and shared read-only by every asset.
pub fn assess_market_risk(candles: &[Candle], t: &MarketRiskThresholds) -> Result<MarketRisk> {
    let need = t.window + 1;
    if t.window == 0 || candles.len() < need {
        return Err(Error::InsufficientData {
            symbol: "reference".to_string(),
            have: candles.len(),
            need,
        });
    }

    let n = candles.len();
    let current = &candles[n - 1];
    let trailing = &candles[n - 1 - t.window..n - 1];
    let mean_range = trailing.iter().map(|c| c.range()).sum::<f64>() / t.window as f64;
    let mean_volume = trailing.iter().map(|c| c.volume).sum::<f64>() / t.window as f64;

    let ratio = |v: f64, mean: f64| if mean > 0.0 { v / mean } else { 0.0 };
    let volume_ratio = ratio(current.volume, mean_volume);
    let range_ratio = ratio(current.range(), mean_range);
    let range_pct = if current.close > 0.0 {
        current.range() / current.close * 100.0
    } else {
        0.0
    };
    debug!(volume_ratio, range_ratio, range_pct, "Reference bar vs trailing window");

    let (level, risk_type, note) = if volume_ratio > t.manipulation_volume {
        (
            RiskLevel::High,
            RiskType::Manipulation,
            format!("volume {volume_ratio:.1}x the {}-bar mean", t.window),
        )
    } else if range_ratio > t.volatility_range || range_pct > t.volatility_range_pct {
        (
            RiskLevel::High,
            RiskType::Volatility,
            format!("range {range_ratio:.1}x mean ({range_pct:.2}% of price)"),
        )
    } else if volume_ratio > t.medium_volume || range_ratio > t.medium_range || range_pct > t.medium_range_pct {
        (
            RiskLevel::Medium,
            RiskType::Normal,
            format!("elevated activity: volume {volume_ratio:.1}x, range {range_ratio:.1}x"),
        )
    } else {
        return Ok(MarketRisk::normal());
    };

    Ok(MarketRisk { level, note, risk_type })
}
