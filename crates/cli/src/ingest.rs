// `ratesheet ingest`: extract a sheet and merge it into the dataset.

use std::path::PathBuf;

use ratesheet_pricing::engine::RunSummary;

use crate::{load_config, to_json, CliError};

pub struct IngestArgs {
    pub source: PathBuf,
    pub db: PathBuf,
    pub config: Option<PathBuf>,
    pub sheet: Option<String>,
    pub dry_run: bool,
    pub json: bool,
    pub output: Option<PathBuf>,
}

pub fn cmd_ingest(args: IngestArgs) -> Result<(), CliError> {
    let config = load_config(args.config.as_deref())?;
    let rows = ratesheet_io::read_rows(&args.source, args.sheet.as_deref())?;
    let dataset = ratesheet_io::dataset::load(&args.db)?;

    let outcome = ratesheet_pricing::run(&config, &rows, dataset)?;

    if args.dry_run {
        eprintln!("dry run: {} not modified", args.db.display());
    } else {
        let target = args.output.as_ref().unwrap_or(&args.db);
        ratesheet_io::dataset::save(target, &outcome.dataset)?;
        eprintln!("wrote {}", target.display());
    }

    if args.json {
        print!("{}", to_json(&outcome.summary)?);
    }

    print_summary(&outcome.summary);
    Ok(())
}

/// Human summary to stderr.
fn print_summary(s: &RunSummary) {
    let layout = match s.layout {
        ratesheet_pricing::extract::SourceLayout::Labeled => "labeled",
        ratesheet_pricing::extract::SourceLayout::TokenScan => "token scan",
    };
    eprintln!(
        "{}: {} rows scanned ({}), {} candidates, anchor {}",
        s.product, s.extract.rows_scanned, layout, s.extract.candidates, s.anchor,
    );
    eprintln!(
        "merge: {} inserted, {} updated, {} unchanged, {} caps backfilled, {} rows total",
        s.merge.inserted, s.merge.updated, s.merge.unchanged, s.merge.caps_backfilled, s.rows_total,
    );

    let skipped = s.extract.skipped_fico + s.extract.incomplete + s.extract.invalid_bounds;
    if skipped > 0 {
        eprintln!(
            "skipped: {} without FICO, {} incomplete, {} with minLoan above maxLoan",
            s.extract.skipped_fico, s.extract.incomplete, s.extract.invalid_bounds,
        );
    }
    if !s.merge.experience_defaults.is_empty() {
        let levels: Vec<String> = s.merge.experience_defaults.iter().map(|l| l.to_string()).collect();
        eprintln!("experience defaults filled for {}", levels.join(", "));
    }
}
