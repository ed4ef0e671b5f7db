use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum IoError {
    #[error("cannot read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("cannot write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("malformed CSV in {}: {source}", .path.display())]
    Csv { path: PathBuf, source: csv::Error },
    #[error("cannot open workbook {}: {message}", .path.display())]
    Workbook { path: PathBuf, message: String },
    #[error("workbook {} has no sheet named '{sheet}' (available: {})", .path.display(), .available.join(", "))]
    SheetNotFound {
        path: PathBuf,
        sheet: String,
        available: Vec<String>,
    },
    #[error("workbook {} contains no sheets", .path.display())]
    NoSheets { path: PathBuf },
    #[error("unsupported source format '{0}' (expected csv, tsv, txt, xlsx, xlsm, xls, xlsb or ods)")]
    UnsupportedFormat(String),
    #[error("invalid dataset JSON in {}: {source}", .path.display())]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
}
