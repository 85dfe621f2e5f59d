use serde::{Deserialize, Serialize};

use common::Candle;

use super::{validate, DetectorError};

/// Three-candle price inefficiency.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FairValueGap {
    pub top: f64,
    pub bottom: f64,
    pub midpoint: f64,
    pub size: f64,
    /// Price traded back into `[bottom, top]` after the gap formed.
    pub filled: bool,
    /// Index of the middle (displacement) candle.
    pub index: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FairValueGaps {
    pub bullish: Vec<FairValueGap>,
    pub bearish: Vec<FairValueGap>,
}

impl FairValueGaps {
    pub fn open_bullish(&self) -> impl Iterator<Item = &FairValueGap> {
        self.bullish.iter().filter(|g| !g.filled)
    }

    pub fn open_bearish(&self) -> impl Iterator<Item = &FairValueGap> {
        self.bearish.iter().filter(|g| !g.filled)
    }
}

/// Scan for gaps of at least `min_atr_mult × atr` between candle 1 and candle 3.
pub fn detect_fair_value_gaps(
    candles: &[Candle],
    atr: f64,
    min_atr_mult: f64,
) -> Result<FairValueGaps, DetectorError> {
    validate(candles, atr)?;
    let min_size = min_atr_mult * atr;
    let mut gaps = FairValueGaps::default();

    for i in 2..candles.len() {
        let (first, middle, third) = (&candles[i - 2], &candles[i - 1], &candles[i]);
        let later = &candles[i + 1..];

        if middle.is_bullish() && third.low > first.high {
            let (top, bottom) = (third.low, first.high);
            if top - bottom >= min_size {
                gaps.bullish.push(FairValueGap {
                    top,
                    bottom,
                    midpoint: (top + bottom) / 2.0,
                    size: top - bottom,
                    filled: later.iter().any(|c| c.low <= top),
                    index: i - 1,
                });
            }
        } else if middle.is_bearish() && third.high < first.low {
            let (top, bottom) = (first.low, third.high);
            if top - bottom >= min_size {
                gaps.bearish.push(FairValueGap {
                    top,
                    bottom,
                    midpoint: (top + bottom) / 2.0,
                    size: top - bottom,
                    filled: later.iter().any(|c| c.high >= bottom),
                    index: i - 1,
                });
            }
        }
    }
    Ok(gaps)
}
