//! Run orchestration: anchor → extract → merge.

use serde::Serialize;

use crate::cell::Cell;
use crate::config::ExtractConfig;
use crate::error::EngineError;
use crate::extract::{extract, ExtractReport, SourceLayout};
use crate::merge::{merge, MergeReport};
use crate::model::{Dataset, PricingRow, ProductBook, RowKey};

pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// What a run did, for logs and `--json` output.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub product: String,
    pub layout: SourceLayout,
    pub anchor: RowKey,
    pub extract: ExtractReport,
    pub merge: MergeReport,
    pub rows_total: usize,
    pub engine_version: String,
    pub run_at: String,
}

#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub dataset: Dataset,
    pub summary: RunSummary,
}

/// First configured anchor key present in `book` with complete purchase and
/// refi caps.
pub fn find_anchor<'a>(book: &'a ProductBook, config: &ExtractConfig) -> Result<&'a PricingRow, EngineError> {
    config
        .anchor_keys
        .iter()
        .filter_map(|key| book.find(key))
        .find(|row| row.purchase.is_complete() && row.refi.is_complete())
        .ok_or_else(|| EngineError::AnchorNotFound {
            tried: config.anchor_keys.clone(),
        })
}

/// Extract `rows` and merge the result into `dataset`.
///
/// The dataset goes in by value and comes back updated; persisting it is the
/// caller's business. Running twice with the same rows changes nothing the
/// second time.
pub fn run(config: &ExtractConfig, rows: &[Vec<Cell>], mut dataset: Dataset) -> Result<RunOutcome, EngineError> {
    let product = config.product.clone();
    let book = dataset
        .products
        .get_mut(&product)
        .ok_or_else(|| EngineError::UnknownProduct(product.clone()))?;

    let anchor = find_anchor(book, config)?.clone();
    log::debug!("anchor row {}", anchor.key());

    let extraction = extract(rows, config, &anchor)?;
    let merge_report = merge(book, &extraction.candidates, &extraction.caps, config);

    let summary = RunSummary {
        product,
        layout: extraction.layout.kind(),
        anchor: anchor.key(),
        extract: extraction.report,
        merge: merge_report,
        rows_total: book.pricing_rows.len(),
        engine_version: ENGINE_VERSION.to_string(),
        run_at: chrono::Utc::now().to_rfc3339(),
    };

    log::info!(
        "{}: {} candidates, {} inserted, {} updated, {} unchanged, {} rows total",
        summary.product,
        summary.extract.candidates,
        summary.merge.inserted,
        summary.merge.updated,
        summary.merge.unchanged,
        summary.rows_total
    );

    Ok(RunOutcome { dataset, summary })
}
