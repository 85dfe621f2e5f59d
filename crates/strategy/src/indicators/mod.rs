//! Deterministic technical indicators over a closed-candle window.
//!
//! Everything here is a pure function of the input slice: identical candles
//! always produce bit-identical results.

pub mod levels;
pub mod macd;
pub mod moving;
pub mod rsi;
pub mod trend;
pub mod volatility;
pub mod volume;

pub use levels::{FibTrend, Fibonacci, Pivots};
pub use macd::{MacdIndicator, MacdValue};
pub use rsi::{RsiIndicator, StochRsi};
pub use trend::Ichimoku;
pub use volatility::Bollinger;

use serde::{Deserialize, Serialize};

use common::Candle;

use crate::config::ConfigError;

/// Indicator periods. Defaults follow the usual exchange-chart settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndicatorParams {
    pub min_bars: usize,
    pub rsi_period: usize,
    pub stoch_period: usize,
    pub stoch_k: usize,
    pub stoch_d: usize,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
    pub bollinger_period: usize,
    pub bollinger_mult: f64,
    pub atr_period: usize,
    pub adx_period: usize,
    pub rvol_period: usize,
    pub z_window: usize,
    pub slope_window: usize,
    pub pivot_window: usize,
    pub fib_lookback: usize,
    pub cross_lookback: usize,
}

impl Default for IndicatorParams {
    fn default() -> Self {
        Self {
            min_bars: 200,
            rsi_period: 14,
            stoch_period: 14,
            stoch_k: 3,
            stoch_d: 3,
            macd_fast: 12,
            macd_slow: 26,
            macd_signal: 9,
            bollinger_period: 20,
            bollinger_mult: 2.0,
            atr_period: 14,
            adx_period: 14,
            rvol_period: 20,
            z_window: 200,
            slope_window: 10,
            pivot_window: 24,
            fib_lookback: 100,
            cross_lookback: 20,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EmaAlignment {
    Bullish,
    Bearish,
    Mixed,
}

impl std::fmt::Display for EmaAlignment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EmaAlignment::Bullish => write!(f, "BULLISH"),
            EmaAlignment::Bearish => write!(f, "BEARISH"),
            EmaAlignment::Mixed => write!(f, "MIXED"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendStatus {
    pub ema_alignment: EmaAlignment,
    /// EMA50 crossed above EMA200 within the cross lookback.
    pub golden_cross: bool,
    /// EMA50 crossed below EMA200 within the cross lookback.
    pub death_cross: bool,
}

/// Snapshot of every indicator for one (symbol, interval) evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndicatorSet {
    pub price: f64,
    pub rsi: f64,
    pub stoch_rsi: StochRsi,
    pub adx: f64,
    pub atr: f64,
    pub rvol: f64,
    pub vwap: f64,
    pub ema20: f64,
    pub ema50: f64,
    pub ema100: f64,
    pub ema200: f64,
    pub z_score: f64,
    /// Signed slope of EMA200 in degrees; near zero means non-trending.
    pub ema_slope: f64,
    pub macd: MacdValue,
    pub bollinger: Bollinger,
    pub pivots: Pivots,
    pub fibonacci: Fibonacci,
    pub trend_status: TrendStatus,
    pub ichimoku: Ichimoku,
    /// Last bar range divided by ATR.
    pub range_atr_ratio: f64,
    /// Latest cumulative volume delta.
    pub cvd: f64,
}

impl IndicatorParams {
    /// Reject periods the indicator constructors cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::InvalidIndicator(msg));
        if self.rsi_period < 2 {
            return invalid(format!("rsi_period must be >= 2, got {}", self.rsi_period));
        }
        if self.macd_fast == 0 || self.macd_signal == 0 {
            return invalid("macd_fast and macd_signal must be >= 1".to_string());
        }
        if self.macd_fast >= self.macd_slow {
            return invalid(format!(
                "macd_fast ({}) must be below macd_slow ({})",
                self.macd_fast, self.macd_slow
            ));
        }
        if !self.bollinger_mult.is_finite() || self.bollinger_mult <= 0.0 {
            return invalid(format!("bollinger_mult must be positive, got {}", self.bollinger_mult));
        }
        Ok(())
    }
}

impl IndicatorSet {
    /// Compute the full indicator set.
    ///
    /// Returns `None` when fewer than `params.min_bars` candles are supplied or
    /// any indicator lacks warmup; callers skip the asset in that case.
    pub fn compute(candles: &[Candle], params: &IndicatorParams) -> Option<IndicatorSet> {
        if candles.len() < params.min_bars.max(200) {
            return None;
        }
        let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
        let last = candles.last()?;
        let price = last.close;

        let rsi_ind = RsiIndicator::new(params.rsi_period);
        let rsi = rsi_ind.compute(&closes)?;
        let stoch_rsi = rsi_ind.stoch(&closes, params.stoch_period, params.stoch_k, params.stoch_d)?;

        let macd = MacdIndicator::new(params.macd_fast, params.macd_slow, params.macd_signal)
            .compute(&closes)?;

        let ema50_series = moving::ema_series(&closes, 50);
        let ema200_series = moving::ema_series(&closes, 200);
        let ema20 = moving::ema(&closes, 20)?;
        let ema50 = *ema50_series.last()?;
        let ema100 = moving::ema(&closes, 100)?;
        let ema200 = *ema200_series.last()?;

        let atr = volatility::atr(candles, params.atr_period)?;
        let z_window = &closes[closes.len().saturating_sub(params.z_window)..];
        let z_score = volatility::z_score(price, ema200, z_window);

        let trend_status = TrendStatus {
            ema_alignment: ema_alignment(ema20, ema50, ema100, ema200),
            golden_cross: crossed(&ema50_series, &ema200_series, params.cross_lookback, true),
            death_cross: crossed(&ema50_series, &ema200_series, params.cross_lookback, false),
        };

        Some(IndicatorSet {
            price,
            rsi,
            stoch_rsi,
            adx: trend::adx(candles, params.adx_period)?,
            atr,
            rvol: volume::rvol(candles, params.rvol_period)?,
            vwap: levels::session_vwap(candles)?,
            ema20,
            ema50,
            ema100,
            ema200,
            z_score,
            ema_slope: moving::slope_degrees(&ema200_series, params.slope_window),
            macd,
            bollinger: volatility::bollinger(&closes, params.bollinger_period, params.bollinger_mult)?,
            pivots: levels::pivots(candles, params.pivot_window)?,
            fibonacci: levels::fibonacci(candles, params.fib_lookback)?,
            trend_status,
            ichimoku: trend::ichimoku(candles, 9, 26, 52)?,
            range_atr_ratio: if atr > 0.0 { last.range() / atr } else { 0.0 },
            cvd: volume::cvd_series(candles).last().copied().unwrap_or(0.0),
        })
    }
}

/// Strict ordering of the EMA stack.
pub fn ema_alignment(ema20: f64, ema50: f64, ema100: f64, ema200: f64) -> EmaAlignment {
    if ema20 > ema50 && ema50 > ema100 && ema100 > ema200 {
        EmaAlignment::Bullish
    } else if ema20 < ema50 && ema50 < ema100 && ema100 < ema200 {
        EmaAlignment::Bearish
    } else {
        EmaAlignment::Mixed
    }
}

/// Whether `fast` crossed `slow` (upward when `upward`) within the last
/// `lookback` bars. Series are aligned on their tails.
fn crossed(fast: &[f64], slow: &[f64], lookback: usize, upward: bool) -> bool {
    let len = fast.len().min(slow.len());
    if len < 2 {
        return false;
    }
    let fast = &fast[fast.len() - len..];
    let slow = &slow[slow.len() - len..];
    let start = len.saturating_sub(lookback + 1);

    (start + 1..len).any(|i| {
        let before = fast[i - 1] - slow[i - 1];
        let after = fast[i] - slow[i];
        if upward {
            before <= 0.0 && after > 0.0
        } else {
            before >= 0.0 && after < 0.0
        }
    })
}
