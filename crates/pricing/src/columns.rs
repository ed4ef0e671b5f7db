//! Header detection and label → column resolution.

use serde::Serialize;

use crate::cell::{cell_at, Cell};
use crate::config::ColumnLabels;

/// The header row and the rows directly below it that may continue a label.
#[derive(Debug, Clone)]
pub struct HeaderBand<'a> {
    /// Index of the header row within the source.
    pub start: usize,
    pub rows: &'a [Vec<Cell>],
}

/// Find the first row containing both `product_label` and `level_label` as
/// exact cell values, and return it with up to `depth - 1` following rows.
///
/// A continuation row leaves the product column empty. The band ends at the
/// first row that fills it, so data rows never contribute to stacked labels.
pub fn find_header_band<'a>(
    rows: &'a [Vec<Cell>],
    product_label: &str,
    level_label: &str,
    depth: usize,
) -> Option<HeaderBand<'a>> {
    let start = rows.iter().position(|row| {
        row.iter().any(|c| c.is_token(product_label)) && row.iter().any(|c| c.is_token(level_label))
    })?;
    let product_col = rows[start].iter().position(|c| c.is_token(product_label));
    let limit = (start + depth.max(1)).min(rows.len());
    let end = (start + 1..limit)
        .find(|&i| cell_at(&rows[i], product_col).is_some())
        .unwrap_or(limit);
    Some(HeaderBand {
        start,
        rows: &rows[start..end],
    })
}

impl HeaderBand<'_> {
    /// First source row after the header row.
    pub fn data_start(&self) -> usize {
        self.start + 1
    }

    /// Column index for `label`.
    ///
    /// Exact match first, then substring containment, then containment in the
    /// column's stacked label (band cells of that column joined by a space).
    /// Every pass scans top-to-bottom, left-to-right; the first hit wins.
    pub fn resolve(&self, label: &str) -> Option<usize> {
        resolve_column(self.rows, label).or_else(|| self.resolve_stacked(label))
    }

    fn resolve_stacked(&self, label: &str) -> Option<usize> {
        let width = self.rows.iter().map(Vec::len).max().unwrap_or(0);
        (0..width).find(|&col| {
            let stacked = self
                .rows
                .iter()
                .filter_map(|row| row.get(col))
                .map(Cell::text)
                .filter(|t| !t.is_empty())
                .collect::<Vec<_>>()
                .join(" ");
            stacked.contains(label)
        })
    }
}

/// Exact-then-substring label lookup across one or more header rows.
pub fn resolve_column(header_rows: &[Vec<Cell>], label: &str) -> Option<usize> {
    let label = label.trim();
    let scan = |matches: &dyn Fn(&str) -> bool| {
        header_rows.iter().find_map(|row| {
            row.iter()
                .position(|cell| !cell.is_empty() && matches(&cell.text()))
        })
    };
    scan(&|text: &str| text == label).or_else(|| scan(&|text: &str| text.contains(label)))
}

// ---------------------------------------------------------------------------
// Column map
// ---------------------------------------------------------------------------

/// Resolved column index per logical field. `None` = not found in the band.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ColumnMap {
    pub product: Option<usize>,
    pub level: Option<usize>,
    pub min_experience: Option<usize>,
    pub min_fico: Option<usize>,
    pub loan_amount_tier: Option<usize>,
    pub min_loan: Option<usize>,
    pub max_loan: Option<usize>,
    pub purchase: [Option<usize>; 3],
    pub refi: [Option<usize>; 3],
    pub tiers: [Option<usize>; 3],
}

impl ColumnMap {
    pub fn resolve(band: &HeaderBand<'_>, labels: &ColumnLabels) -> Self {
        Self {
            product: band.resolve(&labels.product),
            level: band.resolve(&labels.level),
            min_experience: band.resolve(&labels.min_experience),
            min_fico: band.resolve(&labels.min_fico),
            loan_amount_tier: band.resolve(&labels.loan_amount_tier),
            min_loan: band.resolve(&labels.min_loan),
            max_loan: band.resolve(&labels.max_loan),
            purchase: [
                band.resolve(&labels.purchase_ltv),
                band.resolve(&labels.purchase_ltarv),
                band.resolve(&labels.purchase_ltc),
            ],
            refi: [
                band.resolve(&labels.refi_ltv),
                band.resolve(&labels.refi_ltarv),
                band.resolve(&labels.refi_ltc),
            ],
            tiers: [
                band.resolve(&labels.tier1),
                band.resolve(&labels.tier2),
                band.resolve(&labels.tier3),
            ],
        }
    }

    /// Every logical field with its resolved column, in config order.
    pub fn fields(&self) -> [(&'static str, Option<usize>); 16] {
        [
            ("product", self.product),
            ("level", self.level),
            ("min_experience", self.min_experience),
            ("min_fico", self.min_fico),
            ("loan_amount_tier", self.loan_amount_tier),
            ("min_loan", self.min_loan),
            ("max_loan", self.max_loan),
            ("purchase_ltv", self.purchase[0]),
            ("purchase_ltarv", self.purchase[1]),
            ("purchase_ltc", self.purchase[2]),
            ("refi_ltv", self.refi[0]),
            ("refi_ltarv", self.refi[1]),
            ("refi_ltc", self.refi[2]),
            ("tier1", self.tiers[0]),
            ("tier2", self.tiers[1]),
            ("tier3", self.tiers[2]),
        ]
    }

    /// Names of logical fields the band could not place.
    pub fn missing(&self) -> Vec<&'static str> {
        self.fields()
            .into_iter()
            .filter(|(_, col)| col.is_none())
            .map(|(name, _)| name)
            .collect()
    }
}
