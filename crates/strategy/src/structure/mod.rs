//! Market-structure detectors: order blocks, fair value gaps, volume profile,
//! harmonic and chart patterns, and oscillator divergences.
//!
//! Each detector validates its own input and fails independently; a failing
//! detector contributes an empty result to [`StructureSet`] instead of
//! aborting the whole analysis.

pub mod chart_patterns;
pub mod divergence;
pub mod fvg;
pub mod harmonics;
pub mod order_blocks;
pub mod pivots;
pub mod volume_profile;

pub use chart_patterns::{ChartPattern, ChartPatternKind};
pub use divergence::{Divergence, DivergenceKind, OscillatorSource};
pub use fvg::{FairValueGap, FairValueGaps};
pub use harmonics::{HarmonicKind, HarmonicPattern};
pub use order_blocks::{OrderBlock, OrderBlocks};
pub use volume_profile::VolumeProfile;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use common::Candle;

use crate::indicators::{volume, IndicatorParams, IndicatorSet, MacdIndicator, RsiIndicator};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum DetectorError {
    #[error("malformed candle at index {index}")]
    Malformed { index: usize },

    #[error("invalid ATR {0}")]
    InvalidAtr(f64),

    #[error("degenerate input: {0}")]
    Degenerate(&'static str),
}

/// Reject malformed candles and non-positive or non-finite ATR.
pub(crate) fn validate(candles: &[Candle], atr: f64) -> Result<(), DetectorError> {
    if !atr.is_finite() || atr <= 0.0 {
        return Err(DetectorError::InvalidAtr(atr));
    }
    match candles.iter().position(|c| !c.is_well_formed()) {
        Some(index) => Err(DetectorError::Malformed { index }),
        None => Ok(()),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StructureParams {
    pub ob_lookback: usize,
    pub ob_volume_period: usize,
    pub ob_impulse_atr: f64,
    pub ob_impulse_rvol: f64,
    pub max_blocks: usize,
    pub fvg_min_atr: f64,
    pub profile_window: usize,
    pub profile_buckets: usize,
    pub fractal_span: usize,
    pub harmonic_tolerance: f64,
    pub harmonic_max_age: usize,
    pub chart_fractal_span: usize,
    pub chart_tolerance_atr: f64,
    pub divergence_span: usize,
    pub divergence_window: usize,
}

impl Default for StructureParams {
    fn default() -> Self {
        Self {
            ob_lookback: 50,
            ob_volume_period: 20,
            ob_impulse_atr: 1.5,
            ob_impulse_rvol: 1.5,
            max_blocks: 5,
            fvg_min_atr: 0.3,
            profile_window: 120,
            profile_buckets: 24,
            fractal_span: 2,
            harmonic_tolerance: 0.05,
            harmonic_max_age: 20,
            chart_fractal_span: 3,
            chart_tolerance_atr: 0.5,
            divergence_span: 5,
            divergence_window: 60,
        }
    }
}

/// Everything the structure detectors found for one evaluation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructureSet {
    pub order_blocks: OrderBlocks,
    pub fair_value_gaps: FairValueGaps,
    pub volume_profile: VolumeProfile,
    pub harmonics: Vec<HarmonicPattern>,
    pub chart_patterns: Vec<ChartPattern>,
    pub rsi_divergence: Option<Divergence>,
    pub macd_divergence: Option<Divergence>,
    pub orderflow_divergence: Option<Divergence>,
}

impl StructureSet {
    pub fn analyze(
        candles: &[Candle],
        indicators: &IndicatorSet,
        indicator_params: &IndicatorParams,
        params: &StructureParams,
    ) -> StructureSet {
        let atr = indicators.atr;
        let profile_window = &candles[candles.len().saturating_sub(params.profile_window)..];
        let [rsi_divergence, macd_divergence, orderflow_divergence] =
            divergences(candles, indicator_params, params);

        StructureSet {
            order_blocks: or_empty("order_blocks", order_blocks::detect_order_blocks(candles, atr, params)),
            fair_value_gaps: or_empty(
                "fair_value_gaps",
                fvg::detect_fair_value_gaps(candles, atr, params.fvg_min_atr),
            ),
            volume_profile: or_empty(
                "volume_profile",
                volume_profile::volume_profile(profile_window, params.profile_buckets),
            ),
            harmonics: or_empty("harmonics", harmonics::detect_harmonics(candles, params)),
            chart_patterns: or_empty(
                "chart_patterns",
                chart_patterns::detect_chart_patterns(candles, atr, params),
            ),
            rsi_divergence,
            macd_divergence,
            orderflow_divergence,
        }
    }

    pub fn divergences(&self) -> impl Iterator<Item = &Divergence> {
        [&self.rsi_divergence, &self.macd_divergence, &self.orderflow_divergence]
            .into_iter()
            .flatten()
    }

    /// Highest-strength divergence in the given direction.
    pub fn strongest_divergence(&self, bullish: bool) -> Option<&Divergence> {
        self.divergences()
            .filter(|d| d.kind.is_bullish() == bullish)
            .max_by(|a, b| a.strength.total_cmp(&b.strength))
    }
}

fn or_empty<T: Default>(detector: &'static str, result: Result<T, DetectorError>) -> T {
    result.unwrap_or_else(|e| {
        warn!(detector, error = %e, "Structure detector failed, using empty result");
        T::default()
    })
}

/// RSI, MACD histogram and order-flow divergences over the trailing window.
fn divergences(
    candles: &[Candle],
    ip: &IndicatorParams,
    params: &StructureParams,
) -> [Option<Divergence>; 3] {
    let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
    let window = params.divergence_window.min(candles.len());
    let start = candles.len() - window;
    let highs: Vec<f64> = candles[start..].iter().map(|c| c.high).collect();
    let lows: Vec<f64> = candles[start..].iter().map(|c| c.low).collect();

    let rsi = RsiIndicator::new(ip.rsi_period).series(&closes);
    let hist = MacdIndicator::new(ip.macd_fast, ip.macd_slow, ip.macd_signal).histogram_series(&closes);
    let cvd = volume::cvd_series(candles);

    let detect = |series: &[f64], source| {
        divergence::detect_divergence(&highs, &lows, series, source, params.divergence_span)
    };
    [
        detect(&rsi, OscillatorSource::Rsi),
        detect(&hist, OscillatorSource::MacdHistogram),
        detect(&cvd, OscillatorSource::OrderFlow),
    ]
}
