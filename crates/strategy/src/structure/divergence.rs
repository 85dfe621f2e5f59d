use serde::{Deserialize, Serialize};

use super::pivots::{fractal_highs, fractal_lows, Pivot};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OscillatorSource {
    Rsi,
    MacdHistogram,
    /// Cumulative volume delta.
    OrderFlow,
}

impl std::fmt::Display for OscillatorSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OscillatorSource::Rsi => write!(f, "RSI"),
            OscillatorSource::MacdHistogram => write!(f, "MACD histogram"),
            OscillatorSource::OrderFlow => write!(f, "order flow"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DivergenceKind {
    Bullish,
    Bearish,
    HiddenBullish,
    HiddenBearish,
    /// Sellers absorbed: price pushes lower while order flow does not.
    BullishAbsorption,
    BearishAbsorption,
}

impl DivergenceKind {
    pub fn is_bullish(&self) -> bool {
        matches!(
            self,
            DivergenceKind::Bullish | DivergenceKind::HiddenBullish | DivergenceKind::BullishAbsorption
        )
    }

    pub fn is_hidden(&self) -> bool {
        matches!(self, DivergenceKind::HiddenBullish | DivergenceKind::HiddenBearish)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Divergence {
    pub kind: DivergenceKind,
    pub source: OscillatorSource,
    /// 0–100.
    pub strength: f64,
    pub description: String,
}

/// Compare the two most recent price pivots against the oscillator at the same
/// bars. `osc` is aligned to the price slices on its tail.
///
/// Low pivots yield regular/hidden bullish, high pivots regular/hidden
/// bearish. When both sides fire, the pair whose latest pivot is more recent
/// wins.
pub fn detect_divergence(
    highs: &[f64],
    lows: &[f64],
    osc: &[f64],
    source: OscillatorSource,
    span: usize,
) -> Option<Divergence> {
    let n = highs.len().min(lows.len());
    if osc.is_empty() || n == 0 {
        return None;
    }
    let osc = &osc[osc.len().saturating_sub(n)..];
    let offset = n - osc.len();
    let osc_at = |p: &Pivot| p.index.checked_sub(offset).map(|i| osc[i]);

    let from_lows = last_pair(&fractal_lows(&lows[..n], span), &osc_at).and_then(|(p1, o1, p2, o2)| {
        let kind = if p2.price < p1.price && o2 > o1 {
            DivergenceKind::Bullish
        } else if p2.price > p1.price && o2 < o1 {
            DivergenceKind::HiddenBullish
        } else {
            return None;
        };
        Some((p2.index, kind, p1.price, p2.price, o1, o2))
    });
    let from_highs = last_pair(&fractal_highs(&highs[..n], span), &osc_at).and_then(|(p1, o1, p2, o2)| {
        let kind = if p2.price > p1.price && o2 < o1 {
            DivergenceKind::Bearish
        } else if p2.price < p1.price && o2 > o1 {
            DivergenceKind::HiddenBearish
        } else {
            return None;
        };
        Some((p2.index, kind, p1.price, p2.price, o1, o2))
    });

    let (_, kind, price1, price2, osc1, osc2) = match (from_lows, from_highs) {
        (Some(l), Some(h)) => {
            if h.0 > l.0 {
                h
            } else {
                l
            }
        }
        (Some(l), None) => l,
        (None, Some(h)) => h,
        (None, None) => return None,
    };

    let kind = match (source, kind.is_bullish()) {
        (OscillatorSource::OrderFlow, true) => DivergenceKind::BullishAbsorption,
        (OscillatorSource::OrderFlow, false) => DivergenceKind::BearishAbsorption,
        _ => kind,
    };

    let osc_pct = (osc2 - osc1).abs() / osc1.abs().max(f64::EPSILON) * 100.0;
    let price_pct = if price1 != 0.0 {
        (price2 - price1).abs() / price1.abs() * 100.0
    } else {
        0.0
    };
    let strength = (osc_pct * 0.7 + (price_pct * 10.0).min(30.0)).clamp(0.0, 100.0);

    let description = match kind {
        DivergenceKind::Bullish => format!("price lower low, {source} higher low"),
        DivergenceKind::Bearish => format!("price higher high, {source} lower high"),
        DivergenceKind::HiddenBullish => format!("price higher low, {source} lower low"),
        DivergenceKind::HiddenBearish => format!("price lower high, {source} higher high"),
        DivergenceKind::BullishAbsorption => "selling absorbed: order flow refuses the new low".to_string(),
        DivergenceKind::BearishAbsorption => "buying absorbed: order flow refuses the new high".to_string(),
    };

    Some(Divergence {
        kind,
        source,
        strength,
        description,
    })
}

/// Last two pivots that have an oscillator reading.
fn last_pair(
    pivots: &[Pivot],
    osc_at: &impl Fn(&Pivot) -> Option<f64>,
) -> Option<(Pivot, f64, Pivot, f64)> {
    let mut with_osc = pivots.iter().rev().filter_map(|p| osc_at(p).map(|o| (*p, o)));
    let (p2, o2) = with_osc.next()?;
    let (p1, o1) = with_osc.next()?;
    Some((p1, o1, p2, o2))
}
