use serde::{Deserialize, Serialize};

use common::Candle;

/// Bollinger Bands (SMA-based with population standard deviation).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bollinger {
    pub upper: f64,
    pub middle: f64,
    pub lower: f64,
    /// `(upper - lower) / middle`.
    pub bandwidth: f64,
}

/// True range per bar, starting from the second candle.
/// `TR = max(H-L, |H-prevC|, |L-prevC|)`.
pub fn true_ranges(candles: &[Candle]) -> Vec<f64> {
    candles
        .windows(2)
        .map(|w| {
            let (prev, cur) = (&w[0], &w[1]);
            let hl = cur.high - cur.low;
            let hc = (cur.high - prev.close).abs();
            let lc = (cur.low - prev.close).abs();
            hl.max(hc).max(lc)
        })
        .collect()
}

/// Average True Range series using Wilder's smoothing.
///
/// Output index `j` corresponds to candle index `j + period`.
pub fn atr_series(candles: &[Candle], period: usize) -> Vec<f64> {
    let trs = true_ranges(candles);
    if period == 0 || trs.len() < period {
        return Vec::new();
    }
    let mut atr = trs[..period].iter().sum::<f64>() / period as f64;
    let mut out = Vec::with_capacity(trs.len() - period + 1);
    out.push(atr);
    for &tr in &trs[period..] {
        atr = (atr * (period - 1) as f64 + tr) / period as f64;
        out.push(atr);
    }
    out
}

pub fn atr(candles: &[Candle], period: usize) -> Option<f64> {
    atr_series(candles, period).last().copied()
}

/// Population standard deviation.
pub fn std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    var.sqrt()
}

fn bands(window: &[f64], mult: f64) -> Bollinger {
    let middle = window.iter().sum::<f64>() / window.len() as f64;
    let sd = std_dev(window);
    let upper = middle + mult * sd;
    let lower = middle - mult * sd;
    let bandwidth = if middle != 0.0 { (upper - lower) / middle } else { 0.0 };
    Bollinger { upper, middle, lower, bandwidth }
}

pub fn bollinger(closes: &[f64], period: usize, mult: f64) -> Option<Bollinger> {
    if period == 0 || closes.len() < period {
        return None;
    }
    Some(bands(&closes[closes.len() - period..], mult))
}

/// Bandwidth for every complete window, oldest first.
pub fn bandwidth_series(closes: &[f64], period: usize, mult: f64) -> Vec<f64> {
    if period == 0 || closes.len() < period {
        return Vec::new();
    }
    closes.windows(period).map(|w| bands(w, mult).bandwidth).collect()
}

/// `(price − anchor) / stddev(window)`, 0 when the window is flat.
pub fn z_score(price: f64, anchor: f64, window: &[f64]) -> f64 {
    let sd = std_dev(window);
    if sd < f64::EPSILON {
        0.0
    } else {
        (price - anchor) / sd
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::candle;

    #[test]
    fn atr_of_constant_range_bars() {
        let candles: Vec<Candle> = (0..30).map(|i| candle(i, 100.0, 101.0, 99.0, 100.0, 1.0)).collect();
        let value = atr(&candles, 14).unwrap();
        assert!((value - 2.0).abs() < 1e-9);
    }

    #[test]
    fn atr_needs_period_plus_one_candles() {
        let candles: Vec<Candle> = (0..14).map(|i| candle(i, 1.0, 2.0, 0.5, 1.0, 1.0)).collect();
        assert!(atr(&candles, 14).is_none());
    }

    #[test]
    fn bollinger_collapses_on_flat_prices() {
        let b = bollinger(&[10.0; 25], 20, 2.0).unwrap();
        assert_eq!(b.upper, b.lower);
        assert_eq!(b.bandwidth, 0.0);
    }

    #[test]
    fn z_score_is_zero_on_flat_window() {
        assert_eq!(z_score(10.0, 9.0, &[5.0; 10]), 0.0);
    }
}
