use serde::{Deserialize, Serialize};

use common::{Candle, Side};

use super::pivots::{alternating_swings, Pivot, PivotKind};
use super::{DetectorError, StructureParams};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HarmonicKind {
    Gartley,
    Bat,
    Butterfly,
    Crab,
}

impl std::fmt::Display for HarmonicKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HarmonicKind::Gartley => write!(f, "Gartley"),
            HarmonicKind::Bat => write!(f, "Bat"),
            HarmonicKind::Butterfly => write!(f, "Butterfly"),
            HarmonicKind::Crab => write!(f, "Crab"),
        }
    }
}

/// A completed XABCD pattern.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HarmonicPattern {
    pub kind: HarmonicKind,
    pub direction: Side,
    /// Potential reversal zone (the D point).
    pub prz: f64,
    pub confidence: f64,
    /// Structural invalidation level.
    pub stop_loss: f64,
    pub d_index: usize,
}

/// Ratio constraint: either a band `[lo, hi]` or an exact target (lo == hi).
#[derive(Clone, Copy)]
struct Ratio {
    lo: f64,
    hi: f64,
}

impl Ratio {
    const fn exact(v: f64) -> Self {
        Self { lo: v, hi: v }
    }

    const fn band(lo: f64, hi: f64) -> Self {
        Self { lo, hi }
    }

    /// Distance outside the band, normalised by the tolerance; `None` when the
    /// value misses the band by more than the tolerance.
    fn error(&self, value: f64, tol: f64) -> Option<f64> {
        let miss = if value < self.lo {
            self.lo - value
        } else if value > self.hi {
            value - self.hi
        } else {
            0.0
        };
        (miss <= tol).then(|| if tol > 0.0 { miss / tol } else { 0.0 })
    }
}

struct Template {
    kind: HarmonicKind,
    ab: Ratio,
    ad: Ratio,
    extension: bool,
}

const BC: Ratio = Ratio::band(0.382, 0.886);

const TEMPLATES: [Template; 4] = [
    Template { kind: HarmonicKind::Gartley, ab: Ratio::exact(0.618), ad: Ratio::exact(0.786), extension: false },
    Template { kind: HarmonicKind::Bat, ab: Ratio::band(0.382, 0.5), ad: Ratio::exact(0.886), extension: false },
    Template { kind: HarmonicKind::Butterfly, ab: Ratio::exact(0.786), ad: Ratio::band(1.27, 1.618), extension: true },
    Template { kind: HarmonicKind::Crab, ab: Ratio::band(0.382, 0.618), ad: Ratio::exact(1.618), extension: true },
];

/// Match the last five alternating swings against the harmonic templates.
pub fn detect_harmonics(
    candles: &[Candle],
    params: &StructureParams,
) -> Result<Vec<HarmonicPattern>, DetectorError> {
    if let Some(index) = candles.iter().position(|c| !c.is_well_formed()) {
        return Err(DetectorError::Malformed { index });
    }
    let highs: Vec<f64> = candles.iter().map(|c| c.high).collect();
    let lows: Vec<f64> = candles.iter().map(|c| c.low).collect();
    let swings = alternating_swings(&highs, &lows, params.fractal_span);
    if swings.len() < 5 {
        return Ok(Vec::new());
    }

    let points: [Pivot; 5] = [
        swings[swings.len() - 5],
        swings[swings.len() - 4],
        swings[swings.len() - 3],
        swings[swings.len() - 2],
        swings[swings.len() - 1],
    ];
    let d = points[4];
    if candles.len() - 1 - d.index > params.harmonic_max_age {
        return Ok(Vec::new());
    }

    Ok(match_xabcd(&points, params.harmonic_tolerance).into_iter().collect())
}

fn match_xabcd(points: &[Pivot; 5], tol: f64) -> Option<HarmonicPattern> {
    let [x, a, b, c, d] = points;
    let direction = match d.kind {
        PivotKind::Low => Side::Long,
        PivotKind::High => Side::Short,
    };

    let xa = (a.price - x.price).abs();
    let ab = (b.price - a.price).abs();
    let bc = (c.price - b.price).abs();
    if xa == 0.0 || ab == 0.0 || bc == 0.0 {
        return None;
    }
    let ab_r = ab / xa;
    let bc_r = bc / ab;
    let ad_r = (a.price - d.price).abs() / xa;

    // D must sit on the far side of C relative to A.
    let d_beyond_c = match direction {
        Side::Long => d.price < c.price,
        Side::Short => d.price > c.price,
    };
    if !d_beyond_c {
        return None;
    }

    let bc_err = BC.error(bc_r, tol)?;
    TEMPLATES
        .iter()
        .filter_map(|t| {
            let ab_err = t.ab.error(ab_r, tol)?;
            let ad_err = t.ad.error(ad_r, tol)?;
            let err = (ab_err + ad_err + bc_err) / 3.0;
            let stop_loss = if t.extension {
                d.price - direction.sign() * 0.1 * xa
            } else {
                x.price - direction.sign() * 0.02 * xa
            };
            Some(HarmonicPattern {
                kind: t.kind,
                direction,
                prz: d.price,
                confidence: (60.0 + 40.0 * (1.0 - err)).clamp(0.0, 100.0),
                stop_loss,
                d_index: d.index,
            })
        })
        .max_by(|p, q| p.confidence.total_cmp(&q.confidence))
}
