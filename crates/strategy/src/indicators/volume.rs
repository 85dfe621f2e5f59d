use common::Candle;

/// Current bar volume divided by the mean volume of the preceding `period` bars.
/// Returns 1.0 when there is no baseline volume.
pub fn rvol(candles: &[Candle], period: usize) -> Option<f64> {
    if period == 0 || candles.len() < period + 1 {
        return None;
    }
    let n = candles.len();
    let baseline = candles[n - 1 - period..n - 1]
        .iter()
        .map(|c| c.volume)
        .sum::<f64>()
        / period as f64;
    if baseline <= 0.0 {
        return Some(1.0);
    }
    Some(candles[n - 1].volume / baseline)
}

/// Order-flow proxy: per-bar signed volume from the close location within the
/// bar, `volume × ((close − low) − (high − close)) / (high − low)`.
pub fn volume_delta(candle: &Candle) -> f64 {
    let range = candle.range();
    if range <= 0.0 {
        return 0.0;
    }
    candle.volume * ((candle.close - candle.low) - (candle.high - candle.close)) / range
}

/// Cumulative volume delta series, one value per candle.
pub fn cvd_series(candles: &[Candle]) -> Vec<f64> {
    candles
        .iter()
        .scan(0.0, |acc, c| {
            *acc += volume_delta(c);
            Some(*acc)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::candle;

    #[test]
    fn rvol_compares_against_previous_bars() {
        let mut candles: Vec<Candle> = (0..20).map(|i| candle(i, 1.0, 1.1, 0.9, 1.0, 10.0)).collect();
        candles.push(candle(20, 1.0, 1.1, 0.9, 1.0, 30.0));
        assert!((rvol(&candles, 20).unwrap() - 3.0).abs() < 1e-12);
    }

    #[test]
    fn close_at_high_is_full_buy_delta() {
        let c = candle(0, 1.0, 2.0, 1.0, 2.0, 5.0);
        assert_eq!(volume_delta(&c), 5.0);
        let cvd = cvd_series(&[c, c]);
        assert_eq!(cvd, vec![5.0, 10.0]);
    }
}
