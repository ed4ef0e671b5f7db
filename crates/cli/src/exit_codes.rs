//! CLI Exit Code Registry
//!
//! Every exit code the `ratesheet` binary can return is defined here.
//! Batch jobs branch on these values, so they only ever get added to.
//!
//! # Exit Code Ranges
//!
//! | Range   | Domain    | Description                                  |
//! |---------|-----------|----------------------------------------------|
//! | 0       | Universal | Success                                      |
//! | 1       | Universal | General error (unspecified)                  |
//! | 2       | Universal | CLI usage error (bad args, bad option value) |
//! | 3-9     | io        | Source and dataset files                     |
//! | 10-19   | config    | Extraction config                            |
//! | 20-29   | ingest    | Extraction and merge                         |
//! | 30-39   | validate  | Dataset invariant checks                     |
//!
//! # Adding New Exit Codes
//!
//! 1. Add the constant in the appropriate range
//! 2. Document what triggers it
//! 3. Update the table above
//! 4. Map it in `main.rs`

// =============================================================================
// Universal (0-2)
// =============================================================================

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, missing required options.
pub const EXIT_USAGE: u8 = 2;

// =============================================================================
// IO (3-9)
// =============================================================================

/// A source sheet or the dataset could not be read (missing file, malformed
/// CSV, unreadable workbook, unknown sheet name).
pub const EXIT_IO_READ: u8 = 3;

/// The dataset or `--output` file could not be written.
pub const EXIT_IO_WRITE: u8 = 4;

/// The file was read but its format is wrong: unsupported extension or a
/// dataset that is not valid JSON.
pub const EXIT_IO_FORMAT: u8 = 5;

// =============================================================================
// Config (10-19)
// =============================================================================

/// The `--config` TOML failed to parse or validate.
pub const EXIT_CONFIG: u8 = 10;

// =============================================================================
// Ingest (20-29)
// =============================================================================

/// The dataset has no book for the configured product.
pub const EXIT_INGEST_UNKNOWN_PRODUCT: u8 = 20;

/// None of the configured anchor rows exists with complete caps.
pub const EXIT_INGEST_NO_ANCHOR: u8 = 21;

/// No header row was found and token scanning is disabled.
pub const EXIT_INGEST_NO_HEADER: u8 = 22;

// =============================================================================
// Validate (30-39)
// =============================================================================

/// The dataset has at least one error-level finding. Warnings alone exit 0.
pub const EXIT_VALIDATE_ERRORS: u8 = 30;
