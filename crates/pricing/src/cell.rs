use serde::{Deserialize, Serialize};

/// One raw spreadsheet cell as handed over by a tabular reader.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Cell {
    Empty,
    Text(String),
    Number(f64),
}

impl Default for Cell {
    fn default() -> Self {
        Cell::Empty
    }
}

impl Cell {
    /// Build a cell from raw CSV text. Numbers stay text here: the value
    /// parsers need to see a literal `%` or `$` to interpret the token.
    pub fn from_text(input: &str) -> Self {
        if input.trim().is_empty() {
            Cell::Empty
        } else {
            Cell::Text(input.to_string())
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(s) => s.trim().is_empty(),
            Cell::Number(_) => false,
        }
    }

    /// Trimmed text form, used for label and token comparisons.
    pub fn text(&self) -> String {
        match self {
            Cell::Empty => String::new(),
            Cell::Text(s) => s.trim().to_string(),
            Cell::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    format!("{}", *n as i64)
                } else {
                    format!("{}", n)
                }
            }
        }
    }

    /// True when the trimmed text equals `token` exactly.
    pub fn is_token(&self, token: &str) -> bool {
        match self {
            Cell::Text(s) => s.trim() == token,
            _ => false,
        }
    }
}

impl From<&str> for Cell {
    fn from(s: &str) -> Self {
        Cell::from_text(s)
    }
}

impl From<f64> for Cell {
    fn from(n: f64) -> Self {
        Cell::Number(n)
    }
}

/// Fetch a cell by optional column index; out-of-range reads as empty.
pub fn cell_at(row: &[Cell], col: Option<usize>) -> Option<&Cell> {
    let col = col?;
    row.get(col).filter(|c| !c.is_empty())
}
