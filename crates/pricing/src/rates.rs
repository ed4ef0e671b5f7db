//! Note-rate recovery from mirrored rate columns.

use crate::config::{RateConfig, RatePick};
use crate::model::NoteRates;

/// Collapse adjacent near-duplicates: `[r, r, s, s, t, t]` → `[r, s, t]`.
///
/// Only the value directly after a kept value is compared, so a run of three
/// equal values keeps two of them.
pub fn compress_rates(values: &[f64], tolerance: f64) -> Vec<f64> {
    let mut out = Vec::with_capacity(values.len());
    let mut i = 0;
    while i < values.len() {
        let current = values[i];
        out.push(current);
        match values.get(i + 1) {
            Some(next) if (next - current).abs() <= tolerance => i += 2,
            _ => i += 1,
        }
    }
    out
}

/// Pick three note rates out of a row's percentage sequence.
///
/// Values outside the rate band are dropped, mirrored pairs collapsed, and
/// three values taken from the configured end. Fewer than three → `None`.
pub fn select_note_rates(values: &[f64], rates: &RateConfig, tolerance: f64) -> Option<NoteRates> {
    let in_band: Vec<f64> = values.iter().copied().filter(|v| rates.in_band(*v)).collect();
    let compressed = compress_rates(&in_band, tolerance);
    if compressed.len() < 3 {
        return None;
    }
    let picked = match rates.pick {
        RatePick::Tail => &compressed[compressed.len() - 3..],
        RatePick::Head => &compressed[..3],
    };
    NoteRates::from_slice(picked)
}
