//! Locate a cap triplet inside a row's percentage sequence by shape.
//!
//! When the labels for a cap group are missing or renamed, the only reliable
//! locator left is the shape of three adjacent values, learned from an anchor
//! row that is already trusted in the dataset.

use crate::model::Caps;
use crate::value::approx_eq;

/// Start index of the first window of three consecutive values matching
/// `reference` element-wise within `tolerance`.
pub fn find_triplet(values: &[f64], reference: [Option<f64>; 3], tolerance: f64) -> Option<usize> {
    values.windows(3).position(|window| {
        window
            .iter()
            .zip(reference)
            .all(|(v, r)| approx_eq(Some(*v), r, tolerance))
    })
}

/// Re-derive a cap block from `values` using the anchor's block as the shape.
pub fn align_caps(values: &[f64], anchor: &Caps, tolerance: f64) -> Option<Caps> {
    let start = find_triplet(values, anchor.triplet(), tolerance)?;
    Some(Caps::from_triplet(&values[start..start + 3]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_window_after_lookalike_prefix() {
        let values = [0.5, 0.091, 0.091, 0.65, 0.70, 0.80, 0.09];
        let reference = [Some(0.65), Some(0.70), Some(0.80)];
        assert_eq!(find_triplet(&values, reference, 5e-4), Some(3));
    }

    #[test]
    fn tolerates_re_rounding() {
        let values = [0.6502, 0.6998, 0.8004];
        let reference = [Some(0.65), Some(0.70), Some(0.80)];
        assert_eq!(find_triplet(&values, reference, 5e-4), Some(0));
        assert_eq!(find_triplet(&values, reference, 1e-6), None);
    }

    #[test]
    fn first_match_wins() {
        let values = [0.9, 0.75, 0.9, 0.75, 0.9, 0.9, 0.75];
        let reference = [Some(0.9), Some(0.75), Some(0.9)];
        assert_eq!(find_triplet(&values, reference, 5e-4), Some(0));
    }

    #[test]
    fn short_or_null_reference_never_matches() {
        assert_eq!(find_triplet(&[0.65, 0.70], [Some(0.65), Some(0.70), Some(0.80)], 5e-4), None);
        assert_eq!(find_triplet(&[0.65, 0.70, 0.80], [Some(0.65), None, Some(0.80)], 1.0), None);
    }

    #[test]
    fn align_caps_takes_the_row_values() {
        let anchor = Caps { ltv: Some(0.9), ltarv: Some(0.75), ltc: Some(0.9) };
        let values = [0.95, 0.9002, 0.7499, 0.9001, 0.0929];
        let caps = align_caps(&values, &anchor, 5e-4).unwrap();
        assert_eq!(caps.ltv, Some(0.9002));
        assert_eq!(caps.ltarv, Some(0.7499));
        assert_eq!(caps.ltc, Some(0.9001));
    }
}
