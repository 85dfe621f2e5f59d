//! Candle builders shared by unit tests.

use chrono::{DateTime, Duration, TimeZone, Utc};

use common::Candle;

pub fn ts(i: usize) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::hours(i as i64)
}

pub fn candle(i: usize, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Candle {
    Candle {
        open,
        high,
        low,
        close,
        volume,
        timestamp: ts(i),
    }
}

/// Noise-free ascending series: every bar closes `step` above the previous one.
pub fn linear_uptrend(n: usize, start: f64, step: f64) -> Vec<Candle> {
    (0..n)
        .map(|i| {
            let close = start + i as f64 * step;
            let open = close - 0.5 * step;
            candle(i, open, close + 0.25 * step, open - 0.25 * step, close, 1_000.0)
        })
        .collect()
}

pub fn linear_downtrend(n: usize, start: f64, step: f64) -> Vec<Candle> {
    (0..n)
        .map(|i| {
            let close = start - i as f64 * step;
            let open = close + 0.5 * step;
            candle(i, open, open + 0.25 * step, close - 0.25 * step, close, 1_000.0)
        })
        .collect()
}

pub fn flat_candles(n: usize, price: f64) -> Vec<Candle> {
    (0..n)
        .map(|i| candle(i, price, price + 0.5, price - 0.5, price, 1_000.0))
        .collect()
}

/// Candles whose closes follow `closes`, with a fixed half-range of `spread`.
pub fn from_closes(closes: &[f64], spread: f64) -> Vec<Candle> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &c)| {
            let open = if i == 0 { c } else { closes[i - 1] };
            candle(i, open, open.max(c) + spread, open.min(c) - spread, c, 1_000.0)
        })
        .collect()
}
