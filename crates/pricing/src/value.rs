//! Typed value parsers for raw cells.
//!
//! Malformed tokens never raise: every parser resolves to `None` so that the
//! extractor's skip and backfill logic can deal with the gap.

use crate::cell::Cell;

/// Parse a currency amount (`"$1,250,000.00"` → `1250000.0`).
pub fn parse_currency(cell: &Cell) -> Option<f64> {
    match cell {
        Cell::Empty => None,
        Cell::Number(n) => finite(*n),
        Cell::Text(s) => {
            let cleaned: String = s
                .chars()
                .filter(|c| *c != '$' && *c != ',' && !c.is_whitespace())
                .collect();
            if cleaned.is_empty() {
                return None;
            }
            cleaned.parse::<f64>().ok().and_then(finite)
        }
    }
}

/// Parse a fraction from percent text or a bare number.
///
/// `"9.5%"` → `0.095`. Bare numbers `<= 1.0` are already fractional; bare
/// numbers above `1.0` are percent points (`9.5` → `0.095`). Percent-formatted
/// spreadsheet cells arrive as fractions while literal text cells carry the
/// points, so both shapes have to be accepted.
pub fn parse_fraction(cell: &Cell) -> Option<f64> {
    match cell {
        Cell::Empty => None,
        Cell::Number(n) => finite(*n).map(points_or_fraction),
        Cell::Text(s) => {
            let s = s.trim();
            if let Some(points) = s.strip_suffix('%') {
                return points.trim().parse::<f64>().ok().and_then(finite).map(|v| v / 100.0);
            }
            s.parse::<f64>().ok().and_then(finite).map(points_or_fraction)
        }
    }
}

/// Parse a whole number (`"720"`, `720.0`). Fractional values are rejected.
pub fn parse_int(cell: &Cell) -> Option<i64> {
    match cell {
        Cell::Empty => None,
        Cell::Number(n) => {
            if n.is_finite() && n.fract() == 0.0 {
                Some(*n as i64)
            } else {
                None
            }
        }
        Cell::Text(s) => {
            let s = s.trim().replace(',', "");
            if let Ok(v) = s.parse::<i64>() {
                return Some(v);
            }
            let v = s.parse::<f64>().ok()?;
            (v.is_finite() && v.fract() == 0.0).then_some(v as i64)
        }
    }
}

/// Null-safe approximate equality. `None` never equals anything.
pub fn approx_eq(a: Option<f64>, b: Option<f64>, tolerance: f64) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => (a - b).abs() <= tolerance,
        _ => false,
    }
}

/// Percentage tokens of a row in order of appearance.
///
/// Text cells count when they end in `%`; numeric cells count when they lie
/// in (0, 1], which is how percent-formatted cells come out of a workbook (a
/// 100% cap reads as `1.0`). Larger numerics (FICO, loan amounts) never
/// qualify.
pub fn percentage_sequence(row: &[Cell]) -> Vec<f64> {
    row.iter()
        .filter_map(|cell| match cell {
            Cell::Text(s) if s.trim().ends_with('%') => parse_fraction(cell),
            Cell::Number(n) if *n > 0.0 && *n <= 1.0 => Some(*n),
            _ => None,
        })
        .collect()
}

fn points_or_fraction(v: f64) -> f64 {
    if v <= 1.0 {
        v
    } else {
        v / 100.0
    }
}

fn finite(v: f64) -> Option<f64> {
    v.is_finite().then_some(v)
}
