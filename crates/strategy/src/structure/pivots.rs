#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PivotKind {
    High,
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pivot {
    pub index: usize,
    pub price: f64,
    pub kind: PivotKind,
}

/// Fractal pivots: a bar whose value exceeds every bar within `span` on both
/// sides. Plateaus resolve to their first bar.
pub fn fractal_highs(values: &[f64], span: usize) -> Vec<Pivot> {
    fractals(values, span, PivotKind::High)
}

pub fn fractal_lows(values: &[f64], span: usize) -> Vec<Pivot> {
    fractals(values, span, PivotKind::Low)
}

fn fractals(values: &[f64], span: usize, kind: PivotKind) -> Vec<Pivot> {
    if span == 0 || values.len() < 2 * span + 1 {
        return Vec::new();
    }
    let beats = |a: f64, b: f64, strict: bool| match (kind, strict) {
        (PivotKind::High, true) => a > b,
        (PivotKind::High, false) => a >= b,
        (PivotKind::Low, true) => a < b,
        (PivotKind::Low, false) => a <= b,
    };

    (span..values.len() - span)
        .filter(|&i| {
            let v = values[i];
            values[i - span..i].iter().all(|&l| beats(v, l, true))
                && values[i + 1..=i + span].iter().all(|&r| beats(v, r, false))
        })
        .map(|i| Pivot {
            index: i,
            price: values[i],
            kind,
        })
        .collect()
}

/// Merge high and low fractals into a strictly alternating swing sequence,
/// keeping the more extreme pivot when two of the same kind are adjacent.
pub fn alternating_swings(highs: &[f64], lows: &[f64], span: usize) -> Vec<Pivot> {
    let mut all = fractal_highs(highs, span);
    all.extend(fractal_lows(lows, span));
    all.sort_by_key(|p| p.index);

    let mut out: Vec<Pivot> = Vec::with_capacity(all.len());
    for p in all {
        match out.last_mut() {
            Some(last) if last.kind == p.kind => {
                let more_extreme = match p.kind {
                    PivotKind::High => p.price > last.price,
                    PivotKind::Low => p.price < last.price,
                };
                if more_extreme {
                    *last = p;
                }
            }
            Some(last) if last.index == p.index => {
                // Outside bar printing both a fractal high and low: keep the first seen.
            }
            _ => out.push(p),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_single_peak() {
        let v = [1.0, 2.0, 5.0, 2.0, 1.0];
        let highs = fractal_highs(&v, 2);
        assert_eq!(highs.len(), 1);
        assert_eq!(highs[0].index, 2);
        assert!(fractal_lows(&v, 2).is_empty());
    }

    #[test]
    fn swings_alternate() {
        let highs = [1.0, 3.0, 1.0, 2.0, 1.0, 4.0, 1.0, 0.5, 1.0];
        let lows = [0.9, 2.9, 0.9, 1.9, 0.9, 3.9, 0.9, 0.4, 0.9];
        let swings = alternating_swings(&highs, &lows, 1);
        for pair in swings.windows(2) {
            assert_ne!(pair[0].kind, pair[1].kind);
        }
    }
}
