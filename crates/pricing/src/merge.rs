//! Merge candidates into a stored product book.
//!
//! Field-level precedence: a present incoming cap always wins, an absent one
//! never erases a stored value, and a gap on both sides is filled from the
//! caps-only cache. Merging the same candidates twice is a no-op.

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::caps::{CachedCaps, CapsCache};
use crate::config::ExtractConfig;
use crate::model::{BorrowerLevel, PricingRow, ProductBook, RowKey};

pub const LOAN_AMOUNT_TIERS: &str = "loan_amount_tiers";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MergeReport {
    pub inserted: usize,
    pub updated: usize,
    pub unchanged: usize,
    /// Individual caps filled from the caps-only cache.
    pub caps_backfilled: usize,
    /// Stored rows folded into an earlier row with the same key.
    pub collapsed_duplicates: usize,
    /// Levels that received a default experience requirement.
    pub experience_defaults: Vec<BorrowerLevel>,
    /// Number of tiers written when `loan_amount_tiers` was rebuilt.
    pub loan_amount_tiers: Option<usize>,
}

pub fn merge(
    book: &mut ProductBook,
    candidates: &[PricingRow],
    caps: &CapsCache,
    config: &ExtractConfig,
) -> MergeReport {
    let mut report = MergeReport::default();

    let mut rows: BTreeMap<RowKey, PricingRow> = BTreeMap::new();
    for stored in book.pricing_rows.drain(..) {
        match rows.entry(stored.key()) {
            Entry::Vacant(slot) => {
                slot.insert(stored);
            }
            Entry::Occupied(mut slot) => {
                log::warn!("stored row {} appears more than once, collapsing", stored.key());
                overlay(slot.get_mut(), &stored, None);
                report.collapsed_duplicates += 1;
            }
        }
    }

    for candidate in candidates {
        let key = candidate.key();
        match rows.entry(key) {
            Entry::Vacant(slot) => {
                let mut row = candidate.clone();
                report.caps_backfilled +=
                    caps.backfill(&key.caps_key(), &mut row.purchase, &mut row.refi);
                log::debug!("insert {key}");
                slot.insert(row);
                report.inserted += 1;
            }
            Entry::Occupied(mut slot) => {
                let before = slot.get().clone();
                report.caps_backfilled +=
                    overlay(slot.get_mut(), candidate, caps.get(&key.caps_key()));
                if *slot.get() == before {
                    report.unchanged += 1;
                } else {
                    log::debug!("update {key}");
                    report.updated += 1;
                }
            }
        }
    }

    book.pricing_rows = rows.into_values().collect();
    report.experience_defaults = fill_experience_defaults(book, &config.experience_fallback);
    if config.derive_loan_amount_tiers {
        report.loan_amount_tiers = Some(rebuild_loan_amount_tiers(book));
    }
    report
}

/// Apply `incoming` over `base`. Returns the number of caps taken from `cached`.
fn overlay(base: &mut PricingRow, incoming: &PricingRow, cached: Option<&CachedCaps>) -> usize {
    let mut backfilled = 0;
    let blocks = [
        (&mut base.purchase, &incoming.purchase, cached.map(|c| c.purchase)),
        (&mut base.refi, &incoming.refi, cached.map(|c| c.refi)),
    ];
    for (stored, new, fallback) in blocks {
        let fallback = fallback.map(|c| c.triplet()).unwrap_or([None; 3]);
        for ((slot, value), cache) in stored.fields_mut().into_iter().zip(new.triplet()).zip(fallback) {
            match (value, *slot, cache) {
                (Some(v), _, _) => *slot = Some(v),
                (None, None, Some(c)) => {
                    *slot = Some(c);
                    backfilled += 1;
                }
                _ => {}
            }
        }
    }

    if incoming.note_rates.is_some() {
        base.note_rates = incoming.note_rates;
    }
    if let Some(v) = incoming.min_loan.filter(|v| *v != 0.0) {
        base.min_loan = Some(v);
    }
    if let Some(v) = incoming.max_loan.filter(|v| *v != 0.0) {
        base.max_loan = Some(v);
    }
    if incoming.min_experience_months != 0 {
        base.min_experience_months = incoming.min_experience_months;
    }
    for (k, v) in &incoming.extra {
        base.extra.insert(k.clone(), v.clone());
    }
    backfilled
}

/// Give every level that has rows (or a fallback) an experience requirement,
/// without touching existing entries.
fn fill_experience_defaults(
    book: &mut ProductBook,
    fallback: &BTreeMap<BorrowerLevel, u32>,
) -> Vec<BorrowerLevel> {
    let mut levels: BTreeSet<BorrowerLevel> =
        book.pricing_rows.iter().map(|r| r.borrower_level).collect();
    levels.extend(fallback.keys().copied());

    let mut filled = Vec::new();
    for level in levels {
        if book.experience_requirements_months.contains_key(&level) {
            continue;
        }
        let observed = book
            .pricing_rows
            .iter()
            .filter(|r| r.borrower_level == level)
            .map(|r| r.min_experience_months)
            .filter(|m| *m > 0)
            .min();
        if let Some(months) = observed.or_else(|| fallback.get(&level).copied()) {
            book.experience_requirements_months.insert(level, months);
            filled.push(level);
        }
    }
    filled
}

/// Rewrite `loan_amount_tiers` as `{ "<tier>": { minLoan, maxLoan } }` using
/// the widest bounds seen per tier. Returns the number of tiers.
fn rebuild_loan_amount_tiers(book: &mut ProductBook) -> usize {
    let mut bounds: BTreeMap<u32, (Option<f64>, Option<f64>)> = BTreeMap::new();
    for row in &book.pricing_rows {
        let (lo, hi) = bounds.entry(row.loan_amount_tier).or_default();
        *lo = pick(*lo, row.min_loan, f64::min);
        *hi = pick(*hi, row.max_loan, f64::max);
    }

    let mut tiers = Map::new();
    for (tier, (lo, hi)) in bounds {
        tiers.insert(tier.to_string(), json!({ "minLoan": lo, "maxLoan": hi }));
    }
    let count = tiers.len();
    book.extra.insert(LOAN_AMOUNT_TIERS.into(), Value::Object(tiers));
    count
}

fn pick(a: Option<f64>, b: Option<f64>, f: fn(f64, f64) -> f64) -> Option<f64> {
    match (a, b) {
        (Some(a), Some(b)) => Some(f(a, b)),
        (a, b) => a.or(b),
    }
}
