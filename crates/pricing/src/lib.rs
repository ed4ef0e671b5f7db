//! `ratesheet-pricing`: rate sheet extraction and merge engine.
//!
//! Pure engine crate: receives pre-loaded rows of cells plus the stored
//! dataset, returns the merged dataset. No file or CLI dependencies.

pub mod align;
pub mod caps;
pub mod cell;
pub mod columns;
pub mod config;
pub mod engine;
pub mod error;
pub mod extract;
pub mod merge;
pub mod model;
pub mod rates;
pub mod validate;
pub mod value;

pub use cell::Cell;
pub use config::ExtractConfig;
pub use engine::run;
pub use error::EngineError;
pub use model::{BorrowerLevel, Caps, Dataset, NoteRates, PricingRow, ProductBook, RowKey};
