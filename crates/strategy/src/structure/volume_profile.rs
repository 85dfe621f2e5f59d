use serde::{Deserialize, Serialize};

use common::Candle;

use super::DetectorError;

/// Share of total volume the value area must contain.
const VALUE_AREA_SHARE: f64 = 0.70;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeProfile {
    /// Point of control: centre of the highest-volume bucket.
    pub poc: f64,
    pub value_area_high: f64,
    pub value_area_low: f64,
}

impl VolumeProfile {
    /// A zeroed profile carries no levels.
    pub fn is_empty(&self) -> bool {
        self.poc == 0.0
    }
}

/// Bucket the window's volume by typical price and derive POC / value area.
pub fn volume_profile(candles: &[Candle], buckets: usize) -> Result<VolumeProfile, DetectorError> {
    if candles.is_empty() || buckets == 0 {
        return Err(DetectorError::Degenerate("empty volume profile window"));
    }
    if let Some(index) = candles.iter().position(|c| !c.is_well_formed()) {
        return Err(DetectorError::Malformed { index });
    }

    let lo = candles.iter().map(|c| c.low).fold(f64::INFINITY, f64::min);
    let hi = candles.iter().map(|c| c.high).fold(f64::NEG_INFINITY, f64::max);
    let range = hi - lo;
    if range <= 0.0 {
        return Err(DetectorError::Degenerate("zero price range"));
    }
    let size = range / buckets as f64;

    let mut volume = vec![0.0_f64; buckets];
    for c in candles {
        let idx = (((c.typical_price() - lo) / size).floor() as usize).min(buckets - 1);
        volume[idx] += c.volume;
    }
    let total: f64 = volume.iter().sum();
    if total <= 0.0 {
        return Err(DetectorError::Degenerate("no traded volume"));
    }

    // First maximum wins so the result is stable.
    let poc_idx = volume
        .iter()
        .enumerate()
        .fold(0, |best, (i, &v)| if v > volume[best] { i } else { best });

    let (mut low_idx, mut high_idx) = (poc_idx, poc_idx);
    let mut covered = volume[poc_idx];
    while covered < VALUE_AREA_SHARE * total {
        let below = if low_idx > 0 { Some(volume[low_idx - 1]) } else { None };
        let above = if high_idx + 1 < buckets { Some(volume[high_idx + 1]) } else { None };
        match (below, above) {
            (Some(b), Some(a)) if a >= b => {
                high_idx += 1;
                covered += a;
            }
            (Some(b), _) => {
                low_idx -= 1;
                covered += b;
            }
            (None, Some(a)) => {
                high_idx += 1;
                covered += a;
            }
            (None, None) => break,
        }
    }

    Ok(VolumeProfile {
        poc: lo + (poc_idx as f64 + 0.5) * size,
        value_area_high: lo + (high_idx + 1) as f64 * size,
        value_area_low: lo + low_idx as f64 * size,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::candle;

    #[test]
    fn poc_sits_at_heaviest_price() {
        let mut candles: Vec<Candle> = (0..10)
            .map(|i| candle(i, 100.0 + i as f64, 101.0 + i as f64, 99.0 + i as f64, 100.0 + i as f64, 10.0))
            .collect();
        // Heavy trade around 104
        candles.push(candle(10, 104.0, 104.5, 103.5, 104.0, 500.0));

        let profile = volume_profile(&candles, 12).unwrap();
        assert!((profile.poc - 104.0).abs() < 1.0, "poc {}", profile.poc);
        assert!(profile.value_area_low <= profile.poc && profile.poc <= profile.value_area_high);
    }

    #[test]
    fn flat_window_is_degenerate() {
        let candles: Vec<Candle> = (0..5).map(|i| candle(i, 1.0, 1.0, 1.0, 1.0, 1.0)).collect();
        assert!(volume_profile(&candles, 10).is_err());
    }
}
