//! Invariant checks over a stored dataset.

use std::collections::{BTreeSet, HashSet};
use std::fmt;

use serde::Serialize;

use crate::config::ExtractConfig;
use crate::engine::find_anchor;
use crate::model::{Caps, Dataset, ProductBook, RowKey};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => f.write_str("error"),
            Severity::Warning => f.write_str("warning"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Finding {
    pub severity: Severity,
    pub product: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<RowKey>,
    pub message: String,
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.key {
            Some(key) => write!(f, "{} [{} {}] {}", self.severity, self.product, key, self.message),
            None => write!(f, "{} [{}] {}", self.severity, self.product, self.message),
        }
    }
}

pub fn has_errors(findings: &[Finding]) -> bool {
    findings.iter().any(|f| f.severity == Severity::Error)
}

/// Check every product book in `dataset`.
pub fn check(dataset: &Dataset, config: &ExtractConfig) -> Vec<Finding> {
    let mut findings = Vec::new();
    for (name, book) in &dataset.products {
        check_book(name, book, config, &mut findings);
    }
    if let Some(book) = dataset.products.get(&config.product) {
        if let Err(e) = find_anchor(book, config) {
            findings.push(Finding {
                severity: Severity::Warning,
                product: config.product.clone(),
                key: None,
                message: e.to_string(),
            });
        }
    }
    findings
}

fn check_book(name: &str, book: &ProductBook, config: &ExtractConfig, out: &mut Vec<Finding>) {
    let mut push = |severity, key, message: String| {
        out.push(Finding {
            severity,
            product: name.to_string(),
            key,
            message,
        })
    };

    let mut seen = HashSet::new();
    let mut unsorted_reported = false;
    for (i, row) in book.pricing_rows.iter().enumerate() {
        let key = row.key();
        if !seen.insert(key) {
            push(Severity::Error, Some(key), "duplicate row key".into());
        }
        if !unsorted_reported && i > 0 && book.pricing_rows[i - 1].key() > key {
            push(
                Severity::Error,
                Some(key),
                format!("rows not sorted by key (position {i})"),
            );
            unsorted_reported = true;
        }

        if let (Some(lo), Some(hi)) = (row.min_loan, row.max_loan) {
            if lo > hi {
                push(
                    Severity::Error,
                    Some(key),
                    format!("minLoan {lo} is above maxLoan {hi}"),
                );
            }
        }

        for (block, caps) in [("purchase", &row.purchase), ("refi", &row.refi)] {
            for (field, value) in cap_fields(caps) {
                if let Some(v) = value {
                    if !(v > 0.0 && v <= 1.0) {
                        push(
                            Severity::Error,
                            Some(key),
                            format!("{block}.{field} {v} is outside (0, 1]"),
                        );
                    }
                }
            }
        }

        if let Some(rates) = &row.note_rates {
            for (i, rate) in rates.as_array().into_iter().enumerate() {
                if !config.rates.in_band(rate) {
                    push(
                        Severity::Warning,
                        Some(key),
                        format!(
                            "noteRates.Tier{} {rate} is outside {}..={}",
                            i + 1,
                            config.rates.band_min,
                            config.rates.band_max
                        ),
                    );
                }
            }
        }
    }

    let levels: BTreeSet<_> =
        book.pricing_rows.iter().map(|r| r.borrower_level).collect();
    for level in levels {
        if !book.experience_requirements_months.contains_key(&level) {
            push(
                Severity::Warning,
                None,
                format!("no experience requirement for level {level}"),
            );
        }
    }
}

fn cap_fields(caps: &Caps) -> [(&'static str, Option<f64>); 3] {
    [("LTV", caps.ltv), ("LTARV", caps.ltarv), ("LTC", caps.ltc)]
}
