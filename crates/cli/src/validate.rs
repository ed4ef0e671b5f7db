// `ratesheet validate`: invariant checks over a stored dataset.

use std::path::Path;

use ratesheet_pricing::validate::{self, Finding, Severity};
use serde::Serialize;

use crate::exit_codes::EXIT_VALIDATE_ERRORS;
use crate::{load_config, to_json, CliError};

#[derive(Serialize)]
struct ValidateReport<'a> {
    ok: bool,
    errors: usize,
    warnings: usize,
    findings: &'a [Finding],
}

pub fn cmd_validate(db: &Path, config: Option<&Path>, json: bool) -> Result<(), CliError> {
    let config = load_config(config)?;
    let dataset = ratesheet_io::dataset::load(db)?;
    let findings = validate::check(&dataset, &config);

    let errors = findings.iter().filter(|f| f.severity == Severity::Error).count();
    let warnings = findings.len() - errors;

    if json {
        let report = ValidateReport {
            ok: errors == 0,
            errors,
            warnings,
            findings: &findings,
        };
        print!("{}", to_json(&report)?);
    } else {
        for finding in &findings {
            println!("{}", finding);
        }
    }

    let rows: usize = dataset.products.values().map(|b| b.pricing_rows.len()).sum();
    eprintln!(
        "{}: {} products, {} rows, {} errors, {} warnings",
        db.display(),
        dataset.products.len(),
        rows,
        errors,
        warnings,
    );

    if validate::has_errors(&findings) {
        return Err(CliError::new(EXIT_VALIDATE_ERRORS, "dataset has invariant errors")
            .with_hint("re-run `ratesheet ingest` to rewrite the book sorted and deduplicated"));
    }
    Ok(())
}
