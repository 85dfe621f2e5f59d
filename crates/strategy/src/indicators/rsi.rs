use serde::{Deserialize, Serialize};

/// RSI (Relative Strength Index) indicator.
///
/// Uses Wilder's smoothed moving average (same as TradingView / standard RSI).
/// Returns `None` until at least `period + 1` closed price values are available.
#[derive(Debug, Clone)]
pub struct RsiIndicator {
    pub period: usize,
}

/// Stochastic RSI, both lines on a 0–100 scale.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StochRsi {
    pub k: f64,
    pub d: f64,
}

impl RsiIndicator {
    pub fn new(period: usize) -> Self {
        assert!(period >= 2, "RSI period must be >= 2");
        Self { period }
    }

    /// Compute the latest RSI from a slice of close prices (oldest first).
    /// Returns `None` if there are fewer than `period + 1` values.
    pub fn compute(&self, closes: &[f64]) -> Option<f64> {
        self.series(closes).last().copied()
    }

    /// Full RSI series. Output index `j` corresponds to input index `j + period`.
    pub fn series(&self, closes: &[f64]) -> Vec<f64> {
        if closes.len() < self.period + 1 {
            return Vec::new();
        }

        // First average gain/loss over the initial `period` changes
        let changes: Vec<f64> = closes.windows(2).map(|w| w[1] - w[0]).collect();
        let initial = &changes[..self.period];

        let mut avg_gain = initial.iter().filter(|&&c| c > 0.0).sum::<f64>() / self.period as f64;
        let mut avg_loss = initial.iter().filter(|&&c| c < 0.0).map(|c| c.abs()).sum::<f64>()
            / self.period as f64;

        let mut out = Vec::with_capacity(changes.len() - self.period + 1);
        out.push(rsi_from_averages(avg_gain, avg_loss));

        // Wilder smoothing over remaining changes
        for &change in &changes[self.period..] {
            let gain = if change > 0.0 { change } else { 0.0 };
            let loss = if change < 0.0 { change.abs() } else { 0.0 };
            avg_gain = (avg_gain * (self.period - 1) as f64 + gain) / self.period as f64;
            avg_loss = (avg_loss * (self.period - 1) as f64 + loss) / self.period as f64;
            out.push(rsi_from_averages(avg_gain, avg_loss));
        }
        out
    }

    /// Stochastic oscillator applied to the RSI series, smoothed by `k_smooth`
    /// and `d_smooth` SMAs.
    pub fn stoch(
        &self,
        closes: &[f64],
        stoch_period: usize,
        k_smooth: usize,
        d_smooth: usize,
    ) -> Option<StochRsi> {
        let rsi = self.series(closes);
        if stoch_period == 0 || rsi.len() < stoch_period + k_smooth + d_smooth {
            return None;
        }

        let raw: Vec<f64> = rsi
            .windows(stoch_period)
            .map(|w| {
                let lo = w.iter().copied().fold(f64::INFINITY, f64::min);
                let hi = w.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                let last = w[w.len() - 1];
                if hi - lo == 0.0 {
                    50.0
                } else {
                    (last - lo) / (hi - lo) * 100.0
                }
            })
            .collect();

        let k_line: Vec<f64> = raw
            .windows(k_smooth.max(1))
            .map(|w| w.iter().sum::<f64>() / w.len() as f64)
            .collect();
        let d_line: Vec<f64> = k_line
            .windows(d_smooth.max(1))
            .map(|w| w.iter().sum::<f64>() / w.len() as f64)
            .collect();

        Some(StochRsi {
            k: *k_line.last()?,
            d: *d_line.last()?,
        })
    }
}

fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        return if avg_gain == 0.0 { 50.0 } else { 100.0 };
    }
    let rs = avg_gain / avg_loss;
    100.0 - 100.0 / (1.0 + rs)
}
