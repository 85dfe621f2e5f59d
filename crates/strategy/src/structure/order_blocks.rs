use serde::{Deserialize, Serialize};

use common::Candle;

use super::{validate, DetectorError, StructureParams};

/// The last opposing candle before an impulsive move.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OrderBlock {
    /// Midpoint of the block.
    pub price: f64,
    pub top: f64,
    pub bottom: f64,
    /// 0–100, from impulse size (in ATR) and impulse relative volume.
    pub strength: f64,
    /// Price has traded back into the block after the impulse.
    pub mitigated: bool,
    pub index: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrderBlocks {
    pub bullish: Vec<OrderBlock>,
    pub bearish: Vec<OrderBlock>,
}

/// How far back from the impulse to look for the opposing candle.
const MAX_BASE_DISTANCE: usize = 5;

pub fn detect_order_blocks(
    candles: &[Candle],
    atr: f64,
    params: &StructureParams,
) -> Result<OrderBlocks, DetectorError> {
    validate(candles, atr)?;
    let n = candles.len();
    let vol_period = params.ob_volume_period;
    if n < vol_period + 2 {
        return Ok(OrderBlocks::default());
    }

    let mut blocks = OrderBlocks::default();
    let start = n.saturating_sub(params.ob_lookback).max(vol_period + 1);

    for j in start..n {
        let impulse = &candles[j];
        let avg_vol = candles[j - vol_period..j].iter().map(|c| c.volume).sum::<f64>()
            / vol_period as f64;
        let vol_ratio = if avg_vol > 0.0 { impulse.volume / avg_vol } else { 0.0 };
        let body_atr = impulse.body() / atr;

        if body_atr < params.ob_impulse_atr || vol_ratio < params.ob_impulse_rvol {
            continue;
        }

        let bullish_impulse = impulse.is_bullish();
        let base = (j.saturating_sub(MAX_BASE_DISTANCE)..j).rev().find(|&k| {
            if bullish_impulse {
                candles[k].is_bearish()
            } else {
                candles[k].is_bullish()
            }
        });
        let Some(k) = base else { continue };

        let side = if bullish_impulse { &mut blocks.bullish } else { &mut blocks.bearish };
        if side.iter().any(|b| b.index == k) {
            continue;
        }

        let ob = &candles[k];
        let (top, bottom) = (ob.high, ob.low);
        let after = &candles[(j + 1).min(n)..];
        let mitigated = if bullish_impulse {
            after.iter().any(|c| c.low <= top)
        } else {
            after.iter().any(|c| c.high >= bottom)
        };
        let strength = (body_atr / params.ob_impulse_atr * 40.0
            + vol_ratio / params.ob_impulse_rvol * 30.0)
            .min(100.0);

        side.push(OrderBlock {
            price: (top + bottom) / 2.0,
            top,
            bottom,
            strength,
            mitigated,
            index: k,
        });
    }

    for side in [&mut blocks.bullish, &mut blocks.bearish] {
        let excess = side.len().saturating_sub(params.max_blocks);
        side.drain(..excess);
    }
    Ok(blocks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::candle;

    fn base_series() -> Vec<Candle> {
        (0..30)
            .map(|i| candle(i, 100.0, 100.6, 99.4, 100.2, 100.0))
            .collect()
    }

    #[test]
    fn bullish_impulse_marks_preceding_bearish_candle() {
        let mut candles = base_series();
        candles.push(candle(30, 100.2, 100.3, 99.0, 99.2, 120.0)); // bearish base
        candles.push(candle(31, 99.3, 104.5, 99.2, 104.2, 400.0)); // impulse
        candles.push(candle(32, 104.2, 105.0, 103.8, 104.8, 100.0));

        let blocks = detect_order_blocks(&candles, 1.0, &StructureParams::default()).unwrap();
        assert_eq!(blocks.bullish.len(), 1);
        let ob = blocks.bullish[0];
        assert_eq!(ob.index, 30);
        assert!(!ob.mitigated);
        assert!(ob.strength > 0.0 && ob.strength <= 100.0);
    }

    #[test]
    fn return_into_block_marks_mitigation() {
        let mut candles = base_series();
        candles.push(candle(30, 100.2, 100.3, 99.0, 99.2, 120.0));
        candles.push(candle(31, 99.3, 104.5, 99.2, 104.2, 400.0));
        candles.push(candle(32, 104.2, 104.3, 100.1, 100.5, 100.0)); // back into the block

        let blocks = detect_order_blocks(&candles, 1.0, &StructureParams::default()).unwrap();
        assert!(blocks.bullish[0].mitigated);
    }

    #[test]
    fn low_volume_impulse_is_ignored() {
        let mut candles = base_series();
        candles.push(candle(30, 100.2, 100.3, 99.0, 99.2, 100.0));
        candles.push(candle(31, 99.3, 104.5, 99.2, 104.2, 100.0));
        let blocks = detect_order_blocks(&candles, 1.0, &StructureParams::default()).unwrap();
        assert!(blocks.bullish.is_empty());
    }

    #[test]
    fn zero_atr_is_an_error() {
        assert!(detect_order_blocks(&base_series(), 0.0, &StructureParams::default()).is_err());
    }
}
