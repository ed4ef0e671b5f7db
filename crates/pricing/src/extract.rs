//! Row extraction: raw sheet rows → candidate pricing rows + caps-only cache.

use serde::Serialize;
use serde_json::Map;

use crate::align::align_caps;
use crate::caps::CapsCache;
use crate::cell::{cell_at, Cell};
use crate::columns::{find_header_band, ColumnMap};
use crate::config::ExtractConfig;
use crate::error::EngineError;
use crate::model::{BorrowerLevel, Caps, CapsKey, NoteRates, PricingRow};
use crate::rates::select_note_rates;
use crate::value::{parse_currency, parse_fraction, parse_int, percentage_sequence};

// ---------------------------------------------------------------------------
// Layout
// ---------------------------------------------------------------------------

/// How fields are located in a source. Chosen once per source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceLayout {
    /// A header row was found; fields come from labeled columns.
    Labeled,
    /// Legacy exports without a header row; fields follow the product tag.
    TokenScan,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Layout {
    Labeled { header_row: usize, columns: ColumnMap },
    TokenScan,
}

impl Layout {
    pub fn kind(&self) -> SourceLayout {
        match self {
            Layout::Labeled { .. } => SourceLayout::Labeled,
            Layout::TokenScan => SourceLayout::TokenScan,
        }
    }

    /// First row that may hold data.
    fn data_start(&self) -> usize {
        match self {
            Layout::Labeled { header_row, .. } => header_row + 1,
            Layout::TokenScan => 0,
        }
    }
}

/// Pick the layout for `rows`: labeled when a header row exists, token scan
/// when it doesn't and the config allows it.
pub fn detect_layout(rows: &[Vec<Cell>], config: &ExtractConfig) -> Result<Layout, EngineError> {
    let labels = &config.labels;
    if let Some(band) = find_header_band(rows, &labels.product, &labels.level, config.header_depth) {
        let columns = ColumnMap::resolve(&band, labels);
        let missing = columns.missing();
        if !missing.is_empty() {
            log::debug!("header row {}: unresolved columns {:?}", band.start + 1, missing);
        }
        return Ok(Layout::Labeled {
            header_row: band.start,
            columns,
        });
    }

    if config.token_scan {
        log::warn!(
            "no header row with '{}' and '{}', reading rows positionally after the '{}' tag",
            labels.product,
            labels.level,
            config.product
        );
        return Ok(Layout::TokenScan);
    }

    Err(EngineError::HeaderNotFound {
        product_label: labels.product.clone(),
        level_label: labels.level.clone(),
    })
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// Per-source counters. Every scanned row lands in exactly one bucket.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExtractReport {
    pub rows_scanned: usize,
    pub skipped_product: usize,
    pub skipped_level: usize,
    pub skipped_fico: usize,
    pub caps_only: usize,
    pub incomplete: usize,
    pub invalid_bounds: usize,
    pub candidates: usize,
    /// Cap blocks re-derived by shape (not a row bucket).
    pub aligned_caps: usize,
    /// Note-rate triples recovered from the percentage sequence (not a row bucket).
    pub derived_rates: usize,
}

#[derive(Debug, Clone)]
pub struct Extraction {
    pub layout: Layout,
    pub candidates: Vec<PricingRow>,
    pub caps: CapsCache,
    pub report: ExtractReport,
}

// ---------------------------------------------------------------------------
// Extraction
// ---------------------------------------------------------------------------

/// Cells located for one row, before any parsing.
struct RawRow<'a> {
    level: Option<&'a Cell>,
    min_experience: Option<&'a Cell>,
    min_fico: Option<&'a Cell>,
    tier: Option<&'a Cell>,
    min_loan: Option<&'a Cell>,
    max_loan: Option<&'a Cell>,
    purchase: [Option<&'a Cell>; 3],
    refi: [Option<&'a Cell>; 3],
    tiers: [Option<&'a Cell>; 3],
}

fn locate_labeled<'a>(row: &'a [Cell], columns: &ColumnMap, product: &str) -> Option<RawRow<'a>> {
    if !cell_at(row, columns.product)?.is_token(product) {
        return None;
    }
    let at = move |col: Option<usize>| cell_at(row, col);
    Some(RawRow {
        level: at(columns.level),
        min_experience: at(columns.min_experience),
        min_fico: at(columns.min_fico),
        tier: at(columns.loan_amount_tier),
        min_loan: at(columns.min_loan),
        max_loan: at(columns.max_loan),
        purchase: columns.purchase.map(at),
        refi: columns.refi.map(at),
        tiers: columns.tiers.map(at),
    })
}

fn locate_positional<'a>(row: &'a [Cell], product: &str) -> Option<RawRow<'a>> {
    let tag = row.iter().position(|c| c.is_token(product))?;
    let at = move |offset: usize| row.get(tag + offset).filter(|c| !c.is_empty());
    Some(RawRow {
        level: at(1),
        min_experience: at(2),
        min_fico: at(3),
        tier: at(4),
        min_loan: at(5),
        max_loan: at(6),
        purchase: [None; 3],
        refi: [None; 3],
        tiers: [None; 3],
    })
}

fn parse_u32(cell: Option<&Cell>) -> Option<u32> {
    cell.and_then(parse_int).and_then(|v| u32::try_from(v).ok())
}

/// Caps outside (0, 1] read as absent so backfill and precedence can fill them.
fn caps_from_cells(cells: [Option<&Cell>; 3]) -> Caps {
    let [ltv, ltarv, ltc] =
        cells.map(|c| c.and_then(parse_fraction).filter(|v| *v > 0.0 && *v <= 1.0));
    Caps { ltv, ltarv, ltc }
}

fn rates_from_cells(cells: [Option<&Cell>; 3]) -> Option<NoteRates> {
    match cells.map(|c| c.and_then(parse_fraction).filter(|v| *v != 0.0)) {
        [Some(tier1), Some(tier2), Some(tier3)] => Some(NoteRates { tier1, tier2, tier3 }),
        _ => None,
    }
}

/// Turn raw rows into candidate pricing rows.
///
/// `anchor` supplies the purchase/refi cap shapes used when a row's cap
/// columns are missing or incomplete.
pub fn extract(
    rows: &[Vec<Cell>],
    config: &ExtractConfig,
    anchor: &PricingRow,
) -> Result<Extraction, EngineError> {
    let layout = detect_layout(rows, config)?;
    let start = layout.data_start();

    let mut candidates = Vec::new();
    let mut caps = CapsCache::new();
    let mut report = ExtractReport::default();

    for (index, row) in rows.iter().enumerate().skip(start) {
        let line = index + 1;
        report.rows_scanned += 1;

        let raw = match &layout {
            Layout::Labeled { columns, .. } => locate_labeled(row, columns, &config.product),
            Layout::TokenScan => locate_positional(row, &config.product),
        };
        let Some(raw) = raw else {
            report.skipped_product += 1;
            continue;
        };

        let level = raw
            .level
            .and_then(|c| c.text().parse::<BorrowerLevel>().ok())
            .filter(|l| config.levels.contains(l));
        let Some(level) = level else {
            log::debug!("row {line}: no accepted borrower level, skipped");
            report.skipped_level += 1;
            continue;
        };

        let Some(min_fico) = parse_u32(raw.min_fico).filter(|f| *f > 0) else {
            log::debug!("row {line}: missing or zero min FICO, skipped");
            report.skipped_fico += 1;
            continue;
        };

        let min_experience_months = parse_u32(raw.min_experience).unwrap_or(0);
        let tier = parse_u32(raw.tier);
        let min_loan = raw.min_loan.and_then(parse_currency);
        let max_loan = raw.max_loan.and_then(parse_currency);

        let percentages = percentage_sequence(row);

        let mut purchase = caps_from_cells(raw.purchase);
        let mut refi = caps_from_cells(raw.refi);
        if !(purchase.is_complete() && refi.is_complete()) {
            let tolerance = config.tolerance.triplet;
            if let Some(aligned) = align_caps(&percentages, &anchor.purchase, tolerance) {
                purchase = aligned;
                report.aligned_caps += 1;
            }
            if let Some(aligned) = align_caps(&percentages, &anchor.refi, tolerance) {
                refi = aligned;
                report.aligned_caps += 1;
            }
        }

        let note_rates = match rates_from_cells(raw.tiers) {
            Some(rates) => Some(rates),
            None => {
                let derived =
                    select_note_rates(&percentages, &config.rates, config.tolerance.rate_pair);
                if derived.is_some() {
                    report.derived_rates += 1;
                }
                derived
            }
        };

        let bounds_missing = tier.is_none() || min_loan.is_none() || max_loan.is_none();
        if bounds_missing && purchase.is_complete() && refi.is_complete() {
            caps.insert(
                CapsKey {
                    borrower_level: level,
                    min_fico,
                },
                purchase,
                refi,
            );
            report.caps_only += 1;
            continue;
        }

        let nonzero = |v: &f64| *v != 0.0;
        let (Some(tier), Some(min_loan), Some(max_loan)) = (
            tier.filter(|t| *t != 0),
            min_loan.filter(nonzero),
            max_loan.filter(nonzero),
        ) else {
            log::debug!("row {line}: {level}/{min_fico} has no tier or loan bounds, skipped");
            report.incomplete += 1;
            continue;
        };

        if min_loan > max_loan {
            log::warn!(
                "row {line}: {level}/{min_fico}/tier {tier} has min loan {min_loan} above max loan {max_loan}, skipped"
            );
            report.invalid_bounds += 1;
            continue;
        }

        candidates.push(PricingRow {
            product: config.product.clone(),
            borrower_level: level,
            min_experience_months,
            min_fico,
            loan_amount_tier: tier,
            min_loan: Some(min_loan),
            max_loan: Some(max_loan),
            purchase,
            refi,
            note_rates,
            extra: Map::new(),
        });
        report.candidates += 1;
    }

    log::debug!(
        "extracted {} candidates, {} caps-only rows from {} rows",
        report.candidates,
        report.caps_only,
        report.rows_scanned
    );

    Ok(Extraction {
        layout,
        candidates,
        caps,
        report,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RowKey;

    fn row(cells: &[&str]) -> Vec<Cell> {
        cells.iter().map(|s| Cell::from(*s)).collect()
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-12
    }

    fn anchor() -> PricingRow {
        PricingRow {
            product: "FNF".into(),
            borrower_level: BorrowerLevel::A,
            min_experience_months: 36,
            min_fico: 720,
            loan_amount_tier: 3,
            min_loan: Some(1_000_001.0),
            max_loan: Some(2_500_000.0),
            purchase: Caps {
                ltv: Some(0.9),
                ltarv: Some(0.75),
                ltc: Some(0.85),
            },
            refi: Caps {
                ltv: Some(0.75),
                ltarv: Some(0.7),
                ltc: Some(0.7),
            },
            note_rates: None,
            extra: Map::new(),
        }
    }

    const HEADER: [&str; 16] = [
        "Product",
        "Borrower Level",
        "Min. Experience 36 mos.",
        "Min. FICO:",
        "Loan Amount Tier",
        "Min. Loan:",
        "Max. Loan:",
        "Purchase LTV",
        "Purchase LTARV",
        "Purchase LTC",
        "Refinance LF RehabLTV",
        "Refinance LF RehabLTARV",
        "Refinance LF RehabLTC",
        "Tier 1",
        "Tier 2",
        "Tier 3",
    ];

    fn labeled_sheet() -> Vec<Vec<Cell>> {
        vec![
            row(&["Fix & Flip Rate Sheet"]),
            row(&HEADER),
            row(&[
                "FNF", "A", "36", "720", "3", "$1,000,001", "$2,500,000", "90%", "75%", "85%",
                "75%", "70%", "70%", "9.495%", "9.745%", "9.995%",
            ]),
            row(&[
                "FNF", "B", "24", "700", "", "", "", "85%", "70%", "80%", "70%", "65%", "65%", "",
                "", "",
            ]),
            row(&[
                "FNF", "B", "24", "700", "1", "$100,000", "$500,000", "", "", "", "", "", "",
                "9.9%", "10.1%", "10.4%",
            ]),
            row(&["FNF", "E", "12", "700", "1", "$100,000", "$500,000"]),
            row(&["DSCR", "A", "12", "700", "1", "$100,000", "$500,000"]),
            row(&["FNF", "A", "36", "N/A", "1", "$100,000", "$500,000"]),
            row(&["FNF", "C", "", "680", "2", "$600,000", "$500,000"]),
            row(&["FNF", "D", "", "660", "", "", ""]),
        ]
    }

    #[test]
    fn labeled_sheet_buckets_every_row() {
        let ex = extract(&labeled_sheet(), &ExtractConfig::default(), &anchor()).unwrap();
        assert_eq!(ex.layout.kind(), SourceLayout::Labeled);

        let r = &ex.report;
        assert_eq!(r.rows_scanned, 8);
        assert_eq!(r.candidates, 2);
        assert_eq!(r.caps_only, 1);
        assert_eq!(r.skipped_level, 1);
        assert_eq!(r.skipped_product, 1);
        assert_eq!(r.skipped_fico, 1);
        assert_eq!(r.invalid_bounds, 1);
        assert_eq!(r.incomplete, 1);
    }

    #[test]
    fn labeled_candidate_fields() {
        let ex = extract(&labeled_sheet(), &ExtractConfig::default(), &anchor()).unwrap();
        let a = &ex.candidates[0];
        assert_eq!(a.key(), RowKey::new(BorrowerLevel::A, 720, 3));
        assert_eq!(a.min_experience_months, 36);
        assert_eq!(a.min_loan, Some(1_000_001.0));
        assert_eq!(a.max_loan, Some(2_500_000.0));
        assert_eq!(a.purchase, anchor().purchase);
        assert_eq!(a.refi, anchor().refi);
        let rates = a.note_rates.unwrap();
        assert!(close(rates.tier1, 0.09495));
        assert!(close(rates.tier3, 0.09995));

        // No caps on the sheet and none alignable: caps stay empty for merge backfill
        let b = &ex.candidates[1];
        assert_eq!(b.key(), RowKey::new(BorrowerLevel::B, 700, 1));
        assert_eq!(b.purchase, Caps::default());
        assert!(close(b.note_rates.unwrap().tier2, 0.101));
    }

    #[test]
    fn caps_only_row_lands_in_cache() {
        let ex = extract(&labeled_sheet(), &ExtractConfig::default(), &anchor()).unwrap();
        let key = CapsKey {
            borrower_level: BorrowerLevel::B,
            min_fico: 700,
        };
        let cached = ex.caps.get(&key).unwrap();
        assert_eq!(cached.purchase.ltv, Some(0.85));
        assert_eq!(cached.refi.ltc, Some(0.65));
    }

    #[test]
    fn level_filter_follows_config() {
        let config = ExtractConfig {
            levels: vec![BorrowerLevel::B],
            ..ExtractConfig::default()
        };
        let ex = extract(&labeled_sheet(), &config, &anchor()).unwrap();
        assert_eq!(ex.candidates.len(), 1);
        assert_eq!(ex.candidates[0].borrower_level, BorrowerLevel::B);
    }

    #[test]
    fn unlabeled_caps_are_aligned_by_shape() {
        let rows = vec![
            row(&[
                "Product",
                "Borrower Level",
                "Min. FICO",
                "Loan Amount Tier",
                "Min. Loan",
                "Max. Loan",
            ]),
            row(&[
                "FNF", "A", "740", "2", "500000", "1000000", "95%", "90%", "75%", "85%", "75%",
                "70%", "70%", "9.2%", "9.2%", "9.4%", "9.4%", "9.6%", "9.6%",
            ]),
        ];
        let ex = extract(&rows, &ExtractConfig::default(), &anchor()).unwrap();
        assert_eq!(ex.report.aligned_caps, 2);
        assert_eq!(ex.report.derived_rates, 1);

        let c = &ex.candidates[0];
        assert_eq!(c.min_experience_months, 0);
        assert_eq!(c.purchase, anchor().purchase);
        assert_eq!(c.refi, anchor().refi);
        let rates = c.note_rates.unwrap();
        assert!(close(rates.tier1, 0.092));
        assert!(close(rates.tier2, 0.094));
        assert!(close(rates.tier3, 0.096));
    }

    #[test]
    fn numeric_cells_from_workbooks() {
        let mut data = vec![
            Cell::from("FNF"),
            Cell::from("A"),
            Cell::Number(36.0),
            Cell::Number(720.0),
            Cell::Number(3.0),
            Cell::Number(1_000_001.0),
            Cell::Number(2_500_000.0),
        ];
        data.extend([0.9, 0.75, 0.85, 0.75, 0.7, 0.7, 0.09495, 0.09745, 0.09995].map(Cell::Number));
        let rows = vec![row(&HEADER), data];

        let ex = extract(&rows, &ExtractConfig::default(), &anchor()).unwrap();
        let c = &ex.candidates[0];
        assert_eq!(c.min_fico, 720);
        assert_eq!(c.purchase, anchor().purchase);
        assert_eq!(c.note_rates.unwrap().tier2, 0.09745);
        assert_eq!(ex.report.aligned_caps, 0);
    }

    #[test]
    fn token_scan_reads_after_product_tag() {
        let rows = vec![row(&[
            "", "FNF", "A", "36", "720", "3", "$1,000,001", "$2,500,000", "90%", "75%", "85%",
            "75%", "70%", "70%", "9.495%", "9.495%", "9.745%", "9.745%", "9.995%", "9.995%",
        ])];
        let ex = extract(&rows, &ExtractConfig::default(), &anchor()).unwrap();
        assert_eq!(ex.layout, Layout::TokenScan);
        assert_eq!(ex.candidates.len(), 1);

        let c = &ex.candidates[0];
        assert_eq!(c.key(), RowKey::new(BorrowerLevel::A, 720, 3));
        assert_eq!(c.min_experience_months, 36);
        assert_eq!(c.purchase, anchor().purchase);
        assert_eq!(c.refi, anchor().refi);
        assert!(close(c.note_rates.unwrap().tier3, 0.09995));
    }

    #[test]
    fn out_of_range_caps_read_as_absent() {
        let rows = vec![
            row(&HEADER),
            row(&[
                "FNF", "C", "12", "680", "1", "$100,000", "$500,000", "150%", "70%", "80%", "0%",
                "0%", "0%", "10%", "10.5%", "11%",
            ]),
        ];
        let ex = extract(&rows, &ExtractConfig::default(), &anchor()).unwrap();
        assert_eq!(ex.report.aligned_caps, 0);

        let c = &ex.candidates[0];
        assert_eq!(c.purchase.ltv, None);
        assert_eq!(c.purchase.ltarv, Some(0.7));
        assert_eq!(c.purchase.ltc, Some(0.8));
        assert_eq!(c.refi, Caps::default());

        let mut book = crate::model::ProductBook::default();
        let report = crate::merge::merge(&mut book, &ex.candidates, &ex.caps, &ExtractConfig::default());
        assert_eq!(report.inserted, 1);
        let mut ds = crate::model::Dataset::default();
        ds.products.insert("FNF".into(), book);
        let findings = crate::validate::check(&ds, &ExtractConfig::default());
        assert!(!crate::validate::has_errors(&findings), "{findings:?}");
    }

    #[test]
    fn full_cap_aligns_from_workbook_numbers() {
        let mut anchor = anchor();
        anchor.purchase.ltc = Some(1.0);

        let mut data = vec![
            Cell::from("FNF"),
            Cell::from("A"),
            Cell::Number(740.0),
            Cell::Number(2.0),
            Cell::Number(500_000.0),
            Cell::Number(1_000_000.0),
        ];
        data.extend([0.9, 0.75, 1.0, 0.75, 0.7, 0.7].map(Cell::Number));
        let rows = vec![
            row(&[
                "Product",
                "Borrower Level",
                "Min. FICO",
                "Loan Amount Tier",
                "Min. Loan",
                "Max. Loan",
            ]),
            data,
        ];

        let ex = extract(&rows, &ExtractConfig::default(), &anchor).unwrap();
        assert_eq!(ex.report.aligned_caps, 2);
        let c = &ex.candidates[0];
        assert_eq!(c.purchase.ltc, Some(1.0));
        assert_eq!(c.purchase, anchor.purchase);
        assert_eq!(c.refi, anchor.refi);
    }

    #[test]
    fn zero_fico_is_skipped() {
        let rows = vec![
            row(&HEADER),
            row(&["FNF", "A", "36", "0", "1", "$100,000", "$500,000"]),
        ];
        let ex = extract(&rows, &ExtractConfig::default(), &anchor()).unwrap();
        assert_eq!(ex.report.skipped_fico, 1);
        assert!(ex.candidates.is_empty());
    }

    #[test]
    fn missing_header_without_token_scan_is_an_error() {
        let config = ExtractConfig {
            token_scan: false,
            ..ExtractConfig::default()
        };
        let rows = vec![row(&["FNF", "A", "36", "720"])];
        let err = extract(&rows, &config, &anchor()).unwrap_err();
        assert!(matches!(err, EngineError::HeaderNotFound { .. }));
    }
}
