use std::path::PathBuf;

use ratesheet_pricing::extract::SourceLayout;
use ratesheet_pricing::merge::LOAN_AMOUNT_TIERS;
use ratesheet_pricing::validate;
use ratesheet_pricing::{run, BorrowerLevel, Cell, Dataset, EngineError, ExtractConfig, RowKey};

fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn load_rows(name: &str) -> Vec<Vec<Cell>> {
    let path = fixtures_dir().join(name);
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(&path)
        .unwrap_or_else(|e| panic!("cannot read {}: {e}", path.display()));
    reader
        .records()
        .map(|record| record.unwrap().iter().map(Cell::from_text).collect())
        .collect()
}

fn load_dataset() -> Dataset {
    let json = std::fs::read_to_string(fixtures_dir().join("dataset.json")).unwrap();
    Dataset::from_json(&json).unwrap()
}

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-12
}

// -------------------------------------------------------------------------
// Labeled sheet
// -------------------------------------------------------------------------

#[test]
fn labeled_sheet_merges_into_stored_dataset() {
    let rows = load_rows("fnf_sheet.csv");
    let outcome = run(&ExtractConfig::default(), &rows, load_dataset()).unwrap();
    let s = &outcome.summary;

    assert_eq!(s.layout, SourceLayout::Labeled);
    assert_eq!(s.anchor, RowKey::new(BorrowerLevel::A, 720, 3));
    assert_eq!(s.extract.rows_scanned, 9);
    assert_eq!(s.extract.candidates, 5);
    assert_eq!(s.extract.caps_only, 1);
    assert_eq!(s.extract.skipped_product, 2);
    assert_eq!(s.extract.skipped_level, 1);
    assert_eq!(s.merge.inserted, 2);
    assert_eq!(s.merge.updated, 3);
    assert_eq!(s.merge.unchanged, 0);
    assert_eq!(s.merge.caps_backfilled, 6);
    assert_eq!(s.merge.experience_defaults, vec![BorrowerLevel::C, BorrowerLevel::D]);
    assert_eq!(s.rows_total, 6);

    let book = &outcome.dataset.products["FNF"];
    let keys: Vec<RowKey> = book.pricing_rows.iter().map(|r| r.key()).collect();
    assert_eq!(
        keys,
        vec![
            RowKey::new(BorrowerLevel::A, 720, 1),
            RowKey::new(BorrowerLevel::A, 720, 2),
            RowKey::new(BorrowerLevel::A, 720, 3),
            RowKey::new(BorrowerLevel::A, 740, 1),
            RowKey::new(BorrowerLevel::B, 700, 1),
            RowKey::new(BorrowerLevel::C, 680, 1),
        ]
    );

    // Anchor row: new rates, preserved extra field
    let anchor = book.find(&RowKey::new(BorrowerLevel::A, 720, 3)).unwrap();
    assert!(close(anchor.note_rates.unwrap().tier1, 0.09995));
    assert_eq!(anchor.extra["qualificationKey"], "A-720-3");

    // Caps filled from the caps-only row of the same level/FICO
    let b = book.find(&RowKey::new(BorrowerLevel::B, 700, 1)).unwrap();
    assert_eq!(b.purchase.ltv, Some(0.85));
    assert_eq!(b.purchase.ltc, Some(0.85));
    assert_eq!(b.refi.ltarv, Some(0.65));

    // Incoming values overwrite, the null experience gets the sheet value
    let c = book.find(&RowKey::new(BorrowerLevel::C, 680, 1)).unwrap();
    assert_eq!(c.purchase.ltv, Some(0.8));
    assert_eq!(c.purchase.ltc, Some(0.8));
    assert_eq!(c.min_experience_months, 12);

    // Stored-only row untouched
    let kept = book.find(&RowKey::new(BorrowerLevel::A, 740, 1)).unwrap();
    assert_eq!(kept.purchase.ltv, Some(0.9));

    assert_eq!(book.experience_requirements_months[&BorrowerLevel::A], 36);
    assert_eq!(book.experience_requirements_months[&BorrowerLevel::C], 12);
    assert_eq!(book.experience_requirements_months[&BorrowerLevel::D], 1);
    assert!(book.extra.contains_key("state_tiers"));
    assert_eq!(outcome.dataset.extra["version"], 3);

    let findings = validate::check(&outcome.dataset, &ExtractConfig::default());
    assert!(!validate::has_errors(&findings), "{findings:?}");
}

#[test]
fn rerun_is_idempotent() {
    let rows = load_rows("fnf_sheet.csv");
    let config = ExtractConfig::default();
    let first = run(&config, &rows, load_dataset()).unwrap();
    let second = run(&config, &rows, first.dataset.clone()).unwrap();

    assert_eq!(first.dataset, second.dataset);
    assert_eq!(second.summary.merge.inserted, 0);
    assert_eq!(second.summary.merge.updated, 0);
    assert_eq!(second.summary.merge.unchanged, 5);
    assert!(second.summary.merge.experience_defaults.is_empty());

    // Byte-identical on disk as well
    assert_eq!(
        first.dataset.to_json_pretty().unwrap(),
        second.dataset.to_json_pretty().unwrap()
    );
}

// -------------------------------------------------------------------------
// Legacy export without a header row
// -------------------------------------------------------------------------

#[test]
fn legacy_export_uses_token_scan() {
    let rows = load_rows("fnf_legacy.csv");
    let outcome = run(&ExtractConfig::default(), &rows, load_dataset()).unwrap();
    let s = &outcome.summary;

    assert_eq!(s.layout, SourceLayout::TokenScan);
    assert_eq!(s.extract.candidates, 2);
    assert_eq!(s.extract.aligned_caps, 2);
    assert_eq!(s.extract.derived_rates, 2);

    let book = &outcome.dataset.products["FNF"];
    let anchor = book.find(&RowKey::new(BorrowerLevel::A, 720, 3)).unwrap();
    let rates = anchor.note_rates.unwrap();
    assert!(close(rates.tier1, 0.09995));
    assert!(close(rates.tier2, 0.10245));
    assert!(close(rates.tier3, 0.10495));

    // No anchor-shaped caps on this row: inserted without caps
    let d = book.find(&RowKey::new(BorrowerLevel::D, 660, 1)).unwrap();
    assert_eq!(d.min_experience_months, 6);
    assert!(d.purchase.ltv.is_none());
    assert!(close(d.note_rates.unwrap().tier3, 0.12495));
}

#[test]
fn legacy_export_rejected_when_token_scan_disabled() {
    let rows = load_rows("fnf_legacy.csv");
    let config = ExtractConfig::from_toml("token_scan = false").unwrap();
    let err = run(&config, &rows, load_dataset()).unwrap_err();
    assert!(matches!(err, EngineError::HeaderNotFound { .. }));
}

// -------------------------------------------------------------------------
// Custom labels from TOML
// -------------------------------------------------------------------------

#[test]
fn custom_labels_and_loan_amount_tiers() {
    let toml = std::fs::read_to_string(fixtures_dir().join("custom_labels.toml")).unwrap();
    let config = ExtractConfig::from_toml(&toml).unwrap();
    let rows = load_rows("fnf_custom.csv");

    let outcome = run(&config, &rows, load_dataset()).unwrap();
    let s = &outcome.summary;
    assert_eq!(s.extract.candidates, 3);
    assert_eq!(s.merge.inserted, 3);
    assert_eq!(s.merge.loan_amount_tiers, Some(3));

    let book = &outcome.dataset.products["FNF"];
    let d = book.find(&RowKey::new(BorrowerLevel::D, 660, 1)).unwrap();
    assert_eq!(d.min_fico, 660);
    assert_eq!(d.max_loan, Some(250_000.0));
    assert_eq!(d.min_experience_months, 0);
    assert_eq!(d.purchase.ltarv, Some(0.65));

    // C has rows but no non-zero experience anywhere: table fallback
    assert_eq!(book.experience_requirements_months[&BorrowerLevel::C], 3);
    assert_eq!(book.experience_requirements_months[&BorrowerLevel::D], 1);

    let tiers = &book.extra[LOAN_AMOUNT_TIERS];
    assert_eq!(tiers["1"]["minLoan"], 75_000.0);
    assert_eq!(tiers["1"]["maxLoan"], 500_000.0);
    assert_eq!(tiers["3"]["maxLoan"], 2_500_000.0);
}

#[test]
fn missing_anchor_row_is_fatal() {
    let mut dataset = load_dataset();
    dataset
        .products
        .get_mut("FNF")
        .unwrap()
        .pricing_rows
        .retain(|r| r.borrower_level != BorrowerLevel::A || r.min_fico != 720);

    let rows = load_rows("fnf_sheet.csv");
    let err = run(&ExtractConfig::default(), &rows, dataset).unwrap_err();
    assert_eq!(
        err.to_string(),
        "no anchor row with complete purchase/refi caps found (tried A/720/tier 3)"
    );
}
