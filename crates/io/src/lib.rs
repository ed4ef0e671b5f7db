//! Rate sheet sources and dataset persistence.
//!
//! Everything here turns files into the plain values `ratesheet-pricing`
//! works on (`Vec<Vec<Cell>>`, `Dataset`) and back.

use std::path::Path;

use ratesheet_pricing::Cell;

pub mod csv;
pub mod dataset;
pub mod error;
pub mod xlsx;

pub use error::IoError;

/// Source file kinds, decided by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Csv,
    Tsv,
    Workbook,
}

impl SourceKind {
    pub fn from_path(path: &Path) -> Result<Self, IoError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "csv" | "txt" => Ok(SourceKind::Csv),
            "tsv" | "tab" => Ok(SourceKind::Tsv),
            "xlsx" | "xlsm" | "xls" | "xlsb" | "ods" => Ok(SourceKind::Workbook),
            _ => Err(IoError::UnsupportedFormat(ext)),
        }
    }
}

/// Read a rate sheet into rows of cells. `sheet` only applies to workbooks;
/// without it the first sheet is used.
pub fn read_rows(path: &Path, sheet: Option<&str>) -> Result<Vec<Vec<Cell>>, IoError> {
    let kind = SourceKind::from_path(path)?;
    if sheet.is_some() && kind != SourceKind::Workbook {
        log::warn!("--sheet ignored for {}", path.display());
    }
    let rows = match kind {
        SourceKind::Csv => crate::csv::read(path)?,
        SourceKind::Tsv => crate::csv::read_with_delimiter(path, b'\t')?,
        SourceKind::Workbook => xlsx::read(path, sheet)?,
    };
    log::debug!("read {} rows from {}", rows.len(), path.display());
    Ok(rows)
}
