use serde::{Deserialize, Serialize};

use super::moving::ema_series;

/// MACD (Moving Average Convergence/Divergence) indicator.
///
/// Computes: MACD line = EMA(fast) − EMA(slow), Signal = EMA(macd_line, signal_period).
#[derive(Debug, Clone)]
pub struct MacdIndicator {
    pub fast: usize,
    pub slow: usize,
    pub signal: usize,
}

/// Latest MACD values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MacdValue {
    pub line: f64,
    pub signal: f64,
    pub histogram: f64,
}

impl MacdIndicator {
    pub fn new(fast: usize, slow: usize, signal: usize) -> Self {
        assert!(
            fast < slow,
            "MACD fast period must be less than slow period"
        );
        Self { fast, slow, signal }
    }

    /// MACD line series. Output index `j` corresponds to input index `j + slow - 1`.
    fn line_series(&self, closes: &[f64]) -> Vec<f64> {
        let fast = ema_series(closes, self.fast);
        let slow = ema_series(closes, self.slow);
        if slow.is_empty() {
            return Vec::new();
        }
        let offset = self.slow - self.fast;
        slow.iter()
            .enumerate()
            .map(|(i, s)| fast[i + offset] - s)
            .collect()
    }

    /// Histogram series (line − signal).
    /// Output index `j` corresponds to input index `j + slow + signal - 2`.
    pub fn histogram_series(&self, closes: &[f64]) -> Vec<f64> {
        let line = self.line_series(closes);
        let signal = ema_series(&line, self.signal);
        if signal.is_empty() {
            return Vec::new();
        }
        let offset = self.signal - 1;
        signal
            .iter()
            .enumerate()
            .map(|(i, s)| line[i + offset] - s)
            .collect()
    }

    /// Latest MACD line, signal and histogram.
    /// Returns `None` if there are fewer than `slow + signal` prices.
    pub fn compute(&self, closes: &[f64]) -> Option<MacdValue> {
        if closes.len() < self.slow + self.signal {
            return None;
        }
        let line = self.line_series(closes);
        let signal = ema_series(&line, self.signal);
        let line = *line.last()?;
        let signal = *signal.last()?;
        Some(MacdValue {
            line,
            signal,
            histogram: line - signal,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trending_up(n: usize) -> Vec<f64> {
        (0..n).map(|i| 100.0 + i as f64 * 0.5).collect()
    }

    #[test]
    fn macd_returns_none_with_insufficient_data() {
        let macd = MacdIndicator::new(12, 26, 9);
        let prices = vec![100.0; 30]; // need >= 35
        assert!(macd.compute(&prices).is_none());
    }

    #[test]
    fn macd_positive_on_uptrend() {
        let macd = MacdIndicator::new(12, 26, 9);
        let value = macd.compute(&trending_up(120)).unwrap();
        assert!(value.line > 0.0);
        assert!((value.histogram - (value.line - value.signal)).abs() < 1e-12);
    }

    #[test]
    fn histogram_series_length_matches_alignment() {
        let macd = MacdIndicator::new(12, 26, 9);
        let prices = trending_up(100);
        let hist = macd.histogram_series(&prices);
        assert_eq!(hist.len(), prices.len() - (26 + 9 - 2));
    }
}
