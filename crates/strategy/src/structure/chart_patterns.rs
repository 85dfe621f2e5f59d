use serde::{Deserialize, Serialize};

use common::{Candle, Side};

use super::pivots::{alternating_swings, Pivot, PivotKind};
use super::{validate, DetectorError, StructureParams};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChartPatternKind {
    DoubleTop,
    DoubleBottom,
    AscendingTriangle,
    DescendingTriangle,
}

impl std::fmt::Display for ChartPatternKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChartPatternKind::DoubleTop => write!(f, "double top"),
            ChartPatternKind::DoubleBottom => write!(f, "double bottom"),
            ChartPatternKind::AscendingTriangle => write!(f, "ascending triangle"),
            ChartPatternKind::DescendingTriangle => write!(f, "descending triangle"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChartPattern {
    pub kind: ChartPatternKind,
    pub direction: Side,
    /// Neckline for doubles, flat side for triangles.
    pub level: f64,
    pub confidence: f64,
}

pub fn detect_chart_patterns(
    candles: &[Candle],
    atr: f64,
    params: &StructureParams,
) -> Result<Vec<ChartPattern>, DetectorError> {
    validate(candles, atr)?;
    let highs: Vec<f64> = candles.iter().map(|c| c.high).collect();
    let lows: Vec<f64> = candles.iter().map(|c| c.low).collect();
    let swings = alternating_swings(&highs, &lows, params.chart_fractal_span);
    let tol = params.chart_tolerance_atr * atr;

    let tops: Vec<Pivot> = swings.iter().copied().filter(|p| p.kind == PivotKind::High).collect();
    let bottoms: Vec<Pivot> = swings.iter().copied().filter(|p| p.kind == PivotKind::Low).collect();

    let mut found = Vec::new();
    if let Some(p) = double_extreme(&swings, PivotKind::High, tol, atr) {
        found.push(p);
    }
    if let Some(p) = double_extreme(&swings, PivotKind::Low, tol, atr) {
        found.push(p);
    }
    if let Some(p) = triangle(&tops, &bottoms, tol, atr, Side::Long) {
        found.push(p);
    }
    if let Some(p) = triangle(&bottoms, &tops, tol, atr, Side::Short) {
        found.push(p);
    }
    Ok(found)
}

/// Two same-kind extremes within `tol` separated by an opposite swing at least
/// one ATR away.
fn double_extreme(swings: &[Pivot], kind: PivotKind, tol: f64, atr: f64) -> Option<ChartPattern> {
    let n = swings.len();
    if n < 3 {
        return None;
    }
    // Most recent triple ending on `kind`.
    let end = (2..n).rev().find(|&i| swings[i].kind == kind)?;
    let (first, middle, second) = (swings[end - 2], swings[end - 1], swings[end]);
    if first.kind != kind {
        return None;
    }

    let diff = (first.price - second.price).abs();
    let depth = ((first.price + second.price) / 2.0 - middle.price).abs();
    if diff > tol || depth < atr {
        return None;
    }
    let confidence = (50.0 + 30.0 * (1.0 - diff / tol.max(f64::EPSILON)) + (depth / atr).min(4.0) * 5.0)
        .clamp(0.0, 100.0);
    let (kind, direction) = match kind {
        PivotKind::High => (ChartPatternKind::DoubleTop, Side::Short),
        PivotKind::Low => (ChartPatternKind::DoubleBottom, Side::Long),
    };
    Some(ChartPattern {
        kind,
        direction,
        level: middle.price,
        confidence,
    })
}

/// Flat side from the last three `flat` pivots, sloping side from the last
/// three `sloped` pivots converging toward it.
fn triangle(flat: &[Pivot], sloped: &[Pivot], tol: f64, atr: f64, direction: Side) -> Option<ChartPattern> {
    if flat.len() < 3 || sloped.len() < 3 {
        return None;
    }
    let f = &flat[flat.len() - 3..];
    let s = &sloped[sloped.len() - 3..];

    let f_hi = f.iter().map(|p| p.price).fold(f64::NEG_INFINITY, f64::max);
    let f_lo = f.iter().map(|p| p.price).fold(f64::INFINITY, f64::min);
    if f_hi - f_lo > tol {
        return None;
    }
    let min_step = 0.25 * atr;
    let converging = s.windows(2).all(|w| match direction {
        Side::Long => w[1].price - w[0].price > min_step,
        Side::Short => w[0].price - w[1].price > min_step,
    });
    if !converging {
        return None;
    }

    let (kind, level) = match direction {
        Side::Long => (ChartPatternKind::AscendingTriangle, f_hi),
        Side::Short => (ChartPatternKind::DescendingTriangle, f_lo),
    };
    Some(ChartPattern {
        kind,
        direction,
        level,
        confidence: (55.0 + 35.0 * (1.0 - (f_hi - f_lo) / tol.max(f64::EPSILON))).clamp(0.0, 100.0),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(index: usize, price: f64, kind: PivotKind) -> Pivot {
        Pivot { index, price, kind }
    }

    #[test]
    fn double_top_with_deep_neckline() {
        let swings = [
            p(0, 90.0, PivotKind::Low),
            p(5, 110.0, PivotKind::High),
            p(10, 100.0, PivotKind::Low),
            p(15, 110.2, PivotKind::High),
        ];
        let pattern = double_extreme(&swings, PivotKind::High, 0.5, 1.0).unwrap();
        assert_eq!(pattern.kind, ChartPatternKind::DoubleTop);
        assert_eq!(pattern.direction, Side::Short);
        assert_eq!(pattern.level, 100.0);
    }

    #[test]
    fn uneven_tops_are_not_a_double() {
        let swings = [
            p(5, 110.0, PivotKind::High),
            p(10, 100.0, PivotKind::Low),
            p(15, 115.0, PivotKind::High),
        ];
        assert!(double_extreme(&swings, PivotKind::High, 0.5, 1.0).is_none());
    }

    #[test]
    fn ascending_triangle() {
        let tops = [
            p(2, 120.0, PivotKind::High),
            p(8, 120.2, PivotKind::High),
            p(14, 119.9, PivotKind::High),
        ];
        let bottoms = [
            p(5, 100.0, PivotKind::Low),
            p(11, 105.0, PivotKind::Low),
            p(17, 110.0, PivotKind::Low),
        ];
        let pattern = triangle(&tops, &bottoms, 0.5, 1.0, Side::Long).unwrap();
        assert_eq!(pattern.kind, ChartPatternKind::AscendingTriangle);
        assert!((pattern.level - 120.2).abs() < 1e-12);
    }
}
