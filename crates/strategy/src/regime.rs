use serde::{Deserialize, Serialize};

use common::Regime;

use crate::indicators::{EmaAlignment, IndicatorSet};

/// Classifier thresholds. Defaults are the production values.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegimeThresholds {
    /// Minimum ADX for TRENDING.
    pub trend_adx: f64,
    /// Bollinger bandwidth below this counts as compressed.
    pub compression_bandwidth: f64,
    /// ADX must be below this for a compressed market to be RANGING.
    pub range_adx: f64,
    /// Last-bar range / ATR above this is VOLATILE.
    pub expansion_range_atr: f64,
    pub extreme_z: f64,
    pub extreme_rsi_low: f64,
    pub extreme_rsi_high: f64,
}

impl Default for RegimeThresholds {
    fn default() -> Self {
        Self {
            trend_adx: 25.0,
            compression_bandwidth: 0.05,
            range_adx: 20.0,
            expansion_range_atr: 2.0,
            extreme_z: 2.5,
            extreme_rsi_low: 20.0,
            extreme_rsi_high: 80.0,
        }
    }
}

/// The indicator readings the classifier looks at.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegimeMetrics {
    pub ema_alignment: EmaAlignment,
    pub adx: f64,
    pub bandwidth: f64,
    pub range_atr_ratio: f64,
    pub rsi: f64,
    pub z_score: f64,
}

impl From<&IndicatorSet> for RegimeMetrics {
    fn from(ind: &IndicatorSet) -> Self {
        Self {
            ema_alignment: ind.trend_status.ema_alignment,
            adx: ind.adx,
            bandwidth: ind.bollinger.bandwidth,
            range_atr_ratio: ind.range_atr_ratio,
            rsi: ind.rsi,
            z_score: ind.z_score,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketRegime {
    pub regime: Regime,
    pub metrics: RegimeMetrics,
    pub reasoning: String,
}

#[derive(Debug, Clone, Default)]
pub struct RegimeDetector {
    thresholds: RegimeThresholds,
}

impl RegimeDetector {
    pub fn new(thresholds: RegimeThresholds) -> Self {
        Self { thresholds }
    }

    pub fn detect(&self, indicators: &IndicatorSet) -> MarketRegime {
        self.classify(RegimeMetrics::from(indicators))
    }

    /// Rules are checked in priority order and the first match wins:
    /// trend, compression, expansion, extremity, then the RANGING fallback.
    pub fn classify(&self, m: RegimeMetrics) -> MarketRegime {
        let t = &self.thresholds;

        let (regime, reasoning) = if m.adx >= t.trend_adx && m.ema_alignment != EmaAlignment::Mixed {
            (
                Regime::Trending,
                format!("ADX {:.1} >= {:.0} with {} EMA stack", m.adx, t.trend_adx, m.ema_alignment),
            )
        } else if m.bandwidth < t.compression_bandwidth && m.adx < t.range_adx {
            (
                Regime::Ranging,
                format!("Bollinger bandwidth {:.4} compressed, ADX {:.1} weak", m.bandwidth, m.adx),
            )
        } else if m.range_atr_ratio > t.expansion_range_atr {
            (
                Regime::Volatile,
                format!("bar range {:.2}x ATR signals expansion", m.range_atr_ratio),
            )
        } else if m.z_score.abs() > t.extreme_z
            || m.rsi < t.extreme_rsi_low
            || m.rsi > t.extreme_rsi_high
        {
            (
                Regime::Extreme,
                format!("stretched: Z {:.2}, RSI {:.1}", m.z_score, m.rsi),
            )
        } else {
            (
                Regime::Ranging,
                format!("no directional edge (ADX {:.1}, {} stack)", m.adx, m.ema_alignment),
            )
        };

        MarketRegime {
            regime,
            metrics: m,
            reasoning,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::IndicatorParams;
    use crate::testing::linear_uptrend;

    fn metrics() -> RegimeMetrics {
        RegimeMetrics {
            ema_alignment: EmaAlignment::Mixed,
            adx: 15.0,
            bandwidth: 0.10,
            range_atr_ratio: 1.0,
            rsi: 50.0,
            z_score: 0.0,
        }
    }

    #[test]
    fn adx_at_threshold_with_ordered_stack_is_trending() {
        let m = RegimeMetrics {
            adx: 25.0,
            ema_alignment: EmaAlignment::Bullish,
            ..metrics()
        };
        assert_eq!(RegimeDetector::default().classify(m).regime, Regime::Trending);
    }

    #[test]
    fn same_adx_with_flat_stack_and_compression_is_ranging() {
        let m = RegimeMetrics {
            adx: 25.0,
            bandwidth: 0.02,
            ..metrics()
        };
        assert_eq!(RegimeDetector::default().classify(m).regime, Regime::Ranging);
    }

    #[test]
    fn priority_order_resolves_overlaps() {
        let d = RegimeDetector::default();
        // Expansion and extremity together: VOLATILE is checked first
        let m = RegimeMetrics {
            range_atr_ratio: 3.0,
            rsi: 85.0,
            ..metrics()
        };
        assert_eq!(d.classify(m).regime, Regime::Volatile);

        let m = RegimeMetrics { z_score: -2.6, ..metrics() };
        assert_eq!(d.classify(m).regime, Regime::Extreme);

        assert_eq!(d.classify(metrics()).regime, Regime::Ranging);
    }

    #[test]
    fn linear_uptrend_is_trending() {
        let candles = linear_uptrend(300, 100.0, 1.0);
        let ind = IndicatorSet::compute(&candles, &IndicatorParams::default()).unwrap();
        let regime = RegimeDetector::default().detect(&ind);
        assert_eq!(regime.regime, Regime::Trending);
        assert!(regime.reasoning.contains("BULLISH"));
    }
}
