use serde::{Deserialize, Serialize};

use common::Candle;

use super::volatility::true_ranges;

/// Ichimoku lines for the current bar. The cloud (`span_a`, `span_b`) is the
/// one projected onto the current bar, i.e. computed `displacement` bars ago.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Ichimoku {
    pub tenkan: f64,
    pub kijun: f64,
    pub span_a: f64,
    pub span_b: f64,
}

impl Ichimoku {
    pub fn cloud_top(&self) -> f64 {
        self.span_a.max(self.span_b)
    }

    pub fn cloud_bottom(&self) -> f64 {
        self.span_a.min(self.span_b)
    }
}

/// Average Directional Index with Wilder's smoothing.
///
/// Needs at least `2 * period + 1` candles. Returns 0 on a perfectly flat series.
pub fn adx(candles: &[Candle], period: usize) -> Option<f64> {
    if period == 0 || candles.len() < 2 * period + 1 {
        return None;
    }

    let trs = true_ranges(candles);
    let (plus_dm, minus_dm): (Vec<f64>, Vec<f64>) = candles
        .windows(2)
        .map(|w| {
            let up = w[1].high - w[0].high;
            let down = w[0].low - w[1].low;
            let plus = if up > down && up > 0.0 { up } else { 0.0 };
            let minus = if down > up && down > 0.0 { down } else { 0.0 };
            (plus, minus)
        })
        .unzip();

    let p = period as f64;
    let mut tr_s: f64 = trs[..period].iter().sum();
    let mut plus_s: f64 = plus_dm[..period].iter().sum();
    let mut minus_s: f64 = minus_dm[..period].iter().sum();

    let dx = |tr: f64, plus: f64, minus: f64| -> f64 {
        if tr == 0.0 {
            return 0.0;
        }
        let plus_di = 100.0 * plus / tr;
        let minus_di = 100.0 * minus / tr;
        let sum = plus_di + minus_di;
        if sum == 0.0 {
            0.0
        } else {
            100.0 * (plus_di - minus_di).abs() / sum
        }
    };

    let mut dxs = vec![dx(tr_s, plus_s, minus_s)];
    for i in period..trs.len() {
        tr_s = tr_s - tr_s / p + trs[i];
        plus_s = plus_s - plus_s / p + plus_dm[i];
        minus_s = minus_s - minus_s / p + minus_dm[i];
        dxs.push(dx(tr_s, plus_s, minus_s));
    }

    if dxs.len() < period {
        return None;
    }
    let mut adx = dxs[..period].iter().sum::<f64>() / p;
    for &d in &dxs[period..] {
        adx = (adx * (p - 1.0) + d) / p;
    }
    Some(adx)
}

fn midpoint(candles: &[Candle]) -> f64 {
    let hi = candles.iter().map(|c| c.high).fold(f64::NEG_INFINITY, f64::max);
    let lo = candles.iter().map(|c| c.low).fold(f64::INFINITY, f64::min);
    (hi + lo) / 2.0
}

/// Ichimoku with the classic 9/26/52 periods (displacement = `kijun`).
pub fn ichimoku(candles: &[Candle], tenkan: usize, kijun: usize, senkou_b: usize) -> Option<Ichimoku> {
    let n = candles.len();
    let displacement = kijun;
    if tenkan == 0 || kijun == 0 || senkou_b == 0 || n < senkou_b + displacement {
        return None;
    }

    let tenkan_now = midpoint(&candles[n - tenkan..]);
    let kijun_now = midpoint(&candles[n - kijun..]);

    // The cloud under the current bar was plotted `displacement` bars ago.
    let past = &candles[..n - displacement];
    let m = past.len();
    let span_a = (midpoint(&past[m - tenkan..]) + midpoint(&past[m - kijun..])) / 2.0;
    let span_b = midpoint(&past[m - senkou_b..]);

    Some(Ichimoku {
        tenkan: tenkan_now,
        kijun: kijun_now,
        span_a,
        span_b,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{flat_candles, linear_uptrend};

    #[test]
    fn adx_is_maximal_on_clean_uptrend() {
        let candles = linear_uptrend(100, 100.0, 1.0);
        let value = adx(&candles, 14).unwrap();
        assert!(value > 90.0, "expected strong trend, got {value}");
    }

    #[test]
    fn adx_is_zero_on_flat_market() {
        let candles = flat_candles(60, 100.0);
        assert_eq!(adx(&candles, 14), Some(0.0));
    }

    #[test]
    fn uptrend_prices_sit_above_cloud() {
        let candles = linear_uptrend(120, 100.0, 1.0);
        let ichi = ichimoku(&candles, 9, 26, 52).unwrap();
        assert!(ichi.tenkan > ichi.kijun);
        assert!(candles.last().unwrap().close > ichi.cloud_top());
    }

    #[test]
    fn ichimoku_needs_full_history() {
        let candles = linear_uptrend(70, 100.0, 1.0);
        assert!(ichimoku(&candles, 9, 26, 52).is_none());
    }
}
