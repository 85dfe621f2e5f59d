use serde::{Deserialize, Serialize};

use common::Candle;

/// Classic floor pivots.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pivots {
    pub p: f64,
    pub r1: f64,
    pub s1: f64,
    pub r2: f64,
    pub s2: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FibTrend {
    /// Swing low printed before the swing high.
    Up,
    Down,
}

/// Retracement and extension levels of the dominant swing.
///
/// `level0` is the swing end (the extreme price reached last), `level1` the
/// swing origin. Extensions `tp1..tp5` (1.272/1.414/1.618/2.0/2.618) project
/// beyond `level0` in the swing direction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Fibonacci {
    pub trend: FibTrend,
    pub level0: f64,
    pub level236: f64,
    pub level382: f64,
    pub level5: f64,
    pub level618: f64,
    pub level786: f64,
    pub level1: f64,
    pub tp1: f64,
    pub tp2: f64,
    pub tp3: f64,
    pub tp4: f64,
    pub tp5: f64,
}

impl Fibonacci {
    pub fn extensions(&self) -> [f64; 5] {
        [self.tp1, self.tp2, self.tp3, self.tp4, self.tp5]
    }

    /// Retracements with their ratio label.
    pub fn retracements(&self) -> [(&'static str, f64); 7] {
        [
            ("0", self.level0),
            ("0.236", self.level236),
            ("0.382", self.level382),
            ("0.5", self.level5),
            ("0.618", self.level618),
            ("0.786", self.level786),
            ("1", self.level1),
        ]
    }
}

/// Floor pivots from the `window` closed bars preceding the current bar.
pub fn pivots(candles: &[Candle], window: usize) -> Option<Pivots> {
    if window == 0 || candles.len() < window + 1 {
        return None;
    }
    let prior = &candles[candles.len() - 1 - window..candles.len() - 1];
    let high = prior.iter().map(|c| c.high).fold(f64::NEG_INFINITY, f64::max);
    let low = prior.iter().map(|c| c.low).fold(f64::INFINITY, f64::min);
    let close = prior[prior.len() - 1].close;

    let p = (high + low + close) / 3.0;
    Some(Pivots {
        p,
        r1: 2.0 * p - low,
        s1: 2.0 * p - high,
        r2: p + (high - low),
        s2: p - (high - low),
    })
}

/// Fibonacci grid over the swing high/low of the last `lookback` bars.
pub fn fibonacci(candles: &[Candle], lookback: usize) -> Option<Fibonacci> {
    if lookback < 2 || candles.len() < lookback {
        return None;
    }
    let window = &candles[candles.len() - lookback..];

    let (hi_idx, hi) = window
        .iter()
        .enumerate()
        .map(|(i, c)| (i, c.high))
        .fold((0, f64::NEG_INFINITY), |acc, x| if x.1 > acc.1 { x } else { acc });
    let (lo_idx, lo) = window
        .iter()
        .enumerate()
        .map(|(i, c)| (i, c.low))
        .fold((0, f64::INFINITY), |acc, x| if x.1 < acc.1 { x } else { acc });

    let range = hi - lo;
    if !(range > 0.0) {
        return None;
    }

    let trend = if lo_idx <= hi_idx { FibTrend::Up } else { FibTrend::Down };
    // Retracements step back from the swing end toward its origin; extensions
    // are projected from the origin through the end.
    let (end, origin, dir) = match trend {
        FibTrend::Up => (hi, lo, 1.0),
        FibTrend::Down => (lo, hi, -1.0),
    };
    let retrace = |r: f64| end - dir * r * range;
    let extend = |r: f64| origin + dir * r * range;

    Some(Fibonacci {
        trend,
        level0: end,
        level236: retrace(0.236),
        level382: retrace(0.382),
        level5: retrace(0.5),
        level618: retrace(0.618),
        level786: retrace(0.786),
        level1: origin,
        tp1: extend(1.272),
        tp2: extend(1.414),
        tp3: extend(1.618),
        tp4: extend(2.0),
        tp5: extend(2.618),
    })
}

/// Volume-weighted average price anchored at the UTC day of the last candle.
///
/// Falls back to the last close when the session has no volume.
pub fn session_vwap(candles: &[Candle]) -> Option<f64> {
    let last = candles.last()?;
    let day = last.timestamp.date_naive();

    let (pv, vol) = candles
        .iter()
        .rev()
        .take_while(|c| c.timestamp.date_naive() == day)
        .fold((0.0, 0.0), |(pv, vol), c| {
            (pv + c.typical_price() * c.volume, vol + c.volume)
        });

    if vol > 0.0 {
        Some(pv / vol)
    } else {
        Some(last.close)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{candle, linear_uptrend};

    #[test]
    fn pivots_use_prior_window_only() {
        let mut candles: Vec<Candle> = (0..5).map(|i| candle(i, 10.0, 12.0, 8.0, 10.0, 1.0)).collect();
        // Current bar must not influence the pivots
        candles.push(candle(5, 10.0, 100.0, 1.0, 50.0, 1.0));
        let p = pivots(&candles, 5).unwrap();
        assert!((p.p - 10.0).abs() < 1e-12);
        assert!((p.r1 - 12.0).abs() < 1e-12);
        assert!((p.s1 - 8.0).abs() < 1e-12);
    }

    #[test]
    fn uptrend_fib_levels_ordered() {
        let candles = linear_uptrend(150, 100.0, 1.0);
        let fib = fibonacci(&candles, 100).unwrap();
        assert_eq!(fib.trend, FibTrend::Up);
        assert!(fib.level0 > fib.level382 && fib.level382 > fib.level618 && fib.level618 > fib.level1);
        assert!(fib.tp1 > fib.level0 && fib.tp5 > fib.tp1);
    }

    #[test]
    fn vwap_of_single_session() {
        let candles: Vec<Candle> = (0..4).map(|i| candle(i, 10.0, 11.0, 9.0, 10.0, 2.0)).collect();
        assert!((session_vwap(&candles).unwrap() - 10.0).abs() < 1e-12);
    }
}
