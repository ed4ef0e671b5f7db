// ratesheet - rate sheet ingestion CLI
// Extracts pricing rows from lender rate sheets and merges them into the
// stored pricing dataset.

mod exit_codes;
mod ingest;
mod inspect;
mod validate;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use ratesheet_io::IoError;
use ratesheet_pricing::{EngineError, ExtractConfig};
use tracing_subscriber::EnvFilter;

use exit_codes::*;

#[derive(Parser)]
#[command(name = "ratesheet")]
#[command(about = "Extract pricing rows from rate sheets and merge them into a pricing dataset")]
#[command(version)]
#[command(after_help = "\
Examples:
  ratesheet inspect sheets/fnf_2026-10.xlsx
  ratesheet ingest sheets/fnf_2026-10.xlsx --db data/pricing.json
  ratesheet ingest export.csv --db data/pricing.json --dry-run --json
  ratesheet validate --db data/pricing.json

Logging goes to stderr and follows RUST_LOG (default: ratesheet=info).")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract a rate sheet and merge it into the dataset
    #[command(after_help = "\
Reads the sheet (CSV, TSV or workbook), locates the header row, extracts one
candidate per complete data row and merges the candidates into the product
book named by the config (default FNF). The dataset is rewritten in place
unless --dry-run is given. Re-running with the same sheet changes nothing.

Examples:
  ratesheet ingest rates.xlsx --db pricing.json
  ratesheet ingest rates.xlsx --db pricing.json --sheet \"Fix & Flip\"
  ratesheet ingest rates.csv --db pricing.json --config fnf.toml --json
  ratesheet ingest rates.csv --db pricing.json --output merged.json")]
    Ingest {
        /// Rate sheet (.csv, .tsv, .xlsx, .xlsm, .xls, .xlsb, .ods)
        source: PathBuf,

        /// Pricing dataset JSON to merge into
        #[arg(long, env = "RATESHEET_DB")]
        db: PathBuf,

        /// Extraction config (TOML); defaults describe the current sheet layout
        #[arg(long, env = "RATESHEET_CONFIG")]
        config: Option<PathBuf>,

        /// Worksheet name (workbooks only; default: first sheet)
        #[arg(long)]
        sheet: Option<String>,

        /// Run the merge without writing the dataset
        #[arg(long)]
        dry_run: bool,

        /// Print the run summary as JSON on stdout
        #[arg(long)]
        json: bool,

        /// Write the merged dataset here instead of back to --db
        #[arg(long, short = 'o', conflicts_with = "dry_run")]
        output: Option<PathBuf>,
    },

    /// Check dataset invariants (unique sorted keys, loan bounds, cap range)
    #[command(after_help = "\
Errors (exit 30): duplicate keys, unsorted rows, minLoan above maxLoan, caps
outside (0, 1]. Warnings (exit 0): note rates outside the configured band,
levels without an experience requirement, missing anchor row.

Examples:
  ratesheet validate --db pricing.json
  ratesheet validate --db pricing.json --json")]
    Validate {
        /// Pricing dataset JSON
        #[arg(long, env = "RATESHEET_DB")]
        db: PathBuf,

        /// Extraction config (TOML); supplies the rate band and anchor keys
        #[arg(long, env = "RATESHEET_CONFIG")]
        config: Option<PathBuf>,

        /// Print findings as JSON on stdout
        #[arg(long)]
        json: bool,
    },

    /// Show how a rate sheet's header resolves, without touching any dataset
    #[command(after_help = "\
Prints the header band, the column each logical field resolved to, and the
number of data rows. Useful before the first ingest of a new sheet revision.

Examples:
  ratesheet inspect rates.xlsx
  ratesheet inspect rates.xlsx --sheet Pricing --config fnf.toml")]
    Inspect {
        /// Rate sheet (.csv, .tsv, .xlsx, .xlsm, .xls, .xlsb, .ods)
        source: PathBuf,

        /// Extraction config (TOML)
        #[arg(long, env = "RATESHEET_CONFIG")]
        config: Option<PathBuf>,

        /// Worksheet name (workbooks only; default: first sheet)
        #[arg(long)]
        sheet: Option<String>,
    },

    /// Print the effective extraction config as TOML
    Config {
        /// Extraction config (TOML) to merge over the defaults
        #[arg(long, env = "RATESHEET_CONFIG")]
        config: Option<PathBuf>,
    },
}

fn main() -> ExitCode {
    init_logging();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let code = if e.use_stderr() { EXIT_USAGE } else { EXIT_SUCCESS };
            let _ = e.print();
            return ExitCode::from(code);
        }
    };

    let result = match cli.command {
        Commands::Ingest { source, db, config, sheet, dry_run, json, output } => {
            ingest::cmd_ingest(ingest::IngestArgs {
                source,
                db,
                config,
                sheet,
                dry_run,
                json,
                output,
            })
        }
        Commands::Validate { db, config, json } => validate::cmd_validate(&db, config.as_deref(), json),
        Commands::Inspect { source, config, sheet } => {
            inspect::cmd_inspect(&source, config.as_deref(), sheet.as_deref())
        }
        Commands::Config { config } => cmd_config(config.as_deref()),
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

/// Install the fmt subscriber. `log` records from the library crates are
/// picked up through the subscriber's log bridge.
fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("ratesheet=info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn new(code: u8, msg: impl Into<String>) -> Self {
        Self { code, message: msg.into(), hint: None }
    }

    pub fn general(msg: impl Into<String>) -> Self {
        Self::new(EXIT_ERROR, msg)
    }

    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

impl From<IoError> for CliError {
    fn from(err: IoError) -> Self {
        let code = match &err {
            IoError::Write { .. } => EXIT_IO_WRITE,
            IoError::UnsupportedFormat(_) | IoError::Json { .. } => EXIT_IO_FORMAT,
            IoError::Read { .. }
            | IoError::Csv { .. }
            | IoError::Workbook { .. }
            | IoError::SheetNotFound { .. }
            | IoError::NoSheets { .. } => EXIT_IO_READ,
        };
        let hint = match &err {
            IoError::SheetNotFound { .. } => Some("pass one of the listed names to --sheet".to_string()),
            IoError::UnsupportedFormat(_) => Some("save the sheet as .xlsx or .csv".to_string()),
            _ => None,
        };
        Self { code, message: err.to_string(), hint }
    }
}

impl From<EngineError> for CliError {
    fn from(err: EngineError) -> Self {
        let (code, hint) = match &err {
            EngineError::ConfigParse(_) | EngineError::ConfigValidation(_) => (EXIT_CONFIG, None),
            EngineError::UnknownProduct(_) => (
                EXIT_INGEST_UNKNOWN_PRODUCT,
                Some("set `product` in the config to a product present in the dataset"),
            ),
            EngineError::AnchorNotFound { .. } => (
                EXIT_INGEST_NO_ANCHOR,
                Some("add `[[anchor_keys]]` entries for a stored row with complete caps"),
            ),
            EngineError::HeaderNotFound { .. } => (
                EXIT_INGEST_NO_HEADER,
                Some("check [labels] product/level, or set token_scan = true for legacy exports"),
            ),
        };
        Self { code, message: err.to_string(), hint: hint.map(str::to_string) }
    }
}

// ============================================================================
// Shared helpers
// ============================================================================

/// Defaults, overlaid by `path` when given.
pub fn load_config(path: Option<&Path>) -> Result<ExtractConfig, CliError> {
    let Some(path) = path else {
        return Ok(ExtractConfig::default());
    };
    let text = std::fs::read_to_string(path)
        .map_err(|e| CliError::new(EXIT_IO_READ, format!("cannot read {}: {}", path.display(), e)))?;
    let config = ExtractConfig::from_toml(&text).map_err(|e| {
        CliError::from(e).with_hint(format!("in {}", path.display()))
    })?;
    tracing::debug!(path = %path.display(), product = %config.product, "loaded config");
    Ok(config)
}

/// Pretty JSON followed by a newline.
pub fn to_json<T: serde::Serialize>(value: &T) -> Result<String, CliError> {
    serde_json::to_string_pretty(value)
        .map(|mut s| {
            s.push('\n');
            s
        })
        .map_err(|e| CliError::general(format!("cannot serialize JSON: {}", e)))
}

fn cmd_config(path: Option<&Path>) -> Result<(), CliError> {
    let config = load_config(path)?;
    let text = toml::to_string_pretty(&config)
        .map_err(|e| CliError::general(format!("cannot serialize config: {}", e)))?;
    print!("{}", text);
    Ok(())
}
