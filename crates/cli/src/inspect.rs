// `ratesheet inspect`: show header resolution for a sheet.

use std::path::Path;

use ratesheet_pricing::cell::cell_at;
use ratesheet_pricing::columns::find_header_band;
use ratesheet_pricing::extract::{detect_layout, Layout};
use ratesheet_pricing::Cell;

use crate::{load_config, CliError};

pub fn cmd_inspect(source: &Path, config: Option<&Path>, sheet: Option<&str>) -> Result<(), CliError> {
    let config = load_config(config)?;
    let rows = ratesheet_io::read_rows(source, sheet)?;
    let layout = detect_layout(&rows, &config)?;

    println!("source:  {}", source.display());
    println!("rows:    {}", rows.len());

    match &layout {
        Layout::Labeled { header_row, columns } => {
            println!("layout:  labeled");
            let labels = &config.labels;
            if let Some(band) = find_header_band(&rows, &labels.product, &labels.level, config.header_depth) {
                println!(
                    "header:  row {} (band rows {}-{})",
                    header_row + 1,
                    band.start + 1,
                    band.start + band.rows.len(),
                );
            }
            println!();

            let width = labels.all().iter().map(|(_, l)| l.len()).max().unwrap_or(0);
            for ((field, col), (_, label)) in columns.fields().into_iter().zip(labels.all()) {
                let at = col.map(col_letter).unwrap_or_else(|| "-".into());
                println!("  {:<18} {:<width$}  {}", field, format!("\"{}\"", label), at, width = width + 2);
            }

            let data_rows = rows[header_row + 1..]
                .iter()
                .filter(|row| {
                    cell_at(row, columns.product).is_some_and(|c| c.is_token(&config.product))
                })
                .count();
            println!();
            println!("{} rows tagged {}", data_rows, config.product);

            let missing = columns.missing();
            if !missing.is_empty() {
                eprintln!("unresolved: {}", missing.join(", "));
            }
        }
        Layout::TokenScan => {
            println!("layout:  token scan (no header row)");
            let tagged = rows
                .iter()
                .filter(|row| row.iter().any(|c: &Cell| c.is_token(&config.product)))
                .count();
            println!();
            println!("{} rows tagged {}", tagged, config.product);
        }
    }

    Ok(())
}

/// Zero-based column index to a spreadsheet letter (0 -> A, 26 -> AA).
fn col_letter(mut col: usize) -> String {
    let mut out = Vec::new();
    loop {
        out.push(b'A' + (col % 26) as u8);
        if col < 26 {
            break;
        }
        col = col / 26 - 1;
    }
    out.reverse();
    String::from_utf8_lossy(&out).into_owned()
}
