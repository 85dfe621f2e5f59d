/// Scale applied to the per-bar percentage change before mapping it to an angle.
/// At this scale a 0.0087%/bar drift reads as ~5°.
const SLOPE_SCALE: f64 = 10.0;

/// Simple moving average of the last `period` values.
pub fn sma(values: &[f64], period: usize) -> Option<f64> {
    if period == 0 || values.len() < period {
        return None;
    }
    let window = &values[values.len() - period..];
    Some(window.iter().sum::<f64>() / period as f64)
}

/// Full EMA series, seeded with the SMA of the first `period` values.
///
/// Output index `j` corresponds to input index `j + period - 1`.
/// Returns an empty `Vec` when there is not enough data.
pub fn ema_series(values: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || values.len() < period {
        return Vec::new();
    }
    let k = 2.0 / (period as f64 + 1.0);
    let seed = values[..period].iter().sum::<f64>() / period as f64;

    let mut out = Vec::with_capacity(values.len() - period + 1);
    out.push(seed);
    let mut prev = seed;
    for &v in &values[period..] {
        prev = v * k + prev * (1.0 - k);
        out.push(prev);
    }
    out
}

/// Latest EMA value.
pub fn ema(values: &[f64], period: usize) -> Option<f64> {
    ema_series(values, period).last().copied()
}

/// Normalized rate of change of `series` over the trailing `window`,
/// expressed as a signed angle in degrees.
///
/// Returns `0.0` when the window is not available or the base value is zero.
pub fn slope_degrees(series: &[f64], window: usize) -> f64 {
    if window == 0 || series.len() <= window {
        return 0.0;
    }
    let now = series[series.len() - 1];
    let then = series[series.len() - 1 - window];
    if then == 0.0 {
        return 0.0;
    }
    let pct_per_bar = (now - then) / then * 100.0 / window as f64;
    (pct_per_bar * SLOPE_SCALE).atan().to_degrees()
}
