//! Dataset persistence: one pretty-printed JSON document.

use std::path::{Path, PathBuf};

use ratesheet_pricing::Dataset;

use crate::error::IoError;

pub fn load(path: &Path) -> Result<Dataset, IoError> {
    let json = std::fs::read_to_string(path).map_err(|source| IoError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    Dataset::from_json(&json).map_err(|source| IoError::Json {
        path: path.to_path_buf(),
        source,
    })
}

/// Write `dataset` with 2-space indentation and a trailing newline.
///
/// The document is written next to `path` first and renamed into place, so a
/// failed write never leaves a truncated dataset behind.
pub fn save(path: &Path, dataset: &Dataset) -> Result<(), IoError> {
    let mut json = dataset.to_json_pretty().map_err(|source| IoError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    json.push('\n');

    let tmp_path = tmp_path_for(path);
    let write_err = |source: std::io::Error| IoError::Write {
        path: path.to_path_buf(),
        source,
    };
    std::fs::write(&tmp_path, json).map_err(write_err)?;
    std::fs::rename(&tmp_path, path).map_err(write_err)?;
    log::debug!("wrote {}", path.display());
    Ok(())
}

fn tmp_path_for(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    const STORED: &str = r#"{
  "products": {
    "FNF": {
      "pricing_rows": [
        {
          "product": "FNF",
          "borrowerLevel": "A",
          "minExperienceMonths": 36,
          "minFico": 720,
          "loanAmountTier": 3,
          "minLoan": 1000001.0,
          "maxLoan": 2500000.0,
          "purchase": {
            "LTV": 0.85,
            "LTARV": 0.7,
            "LTC": 0.85
          },
          "refi": {
            "LTV": 0.7,
            "LTARV": 0.65,
            "LTC": null
          },
          "noteRates": null,
          "qualificationKey": "A-720-3"
        }
      ],
      "experience_requirements_months": {
        "A": 36
      },
      "state_tiers": {
        "TX": 1,
        "CA": 2
      }
    }
  },
  "version": 3
}
"#;

    #[test]
    fn save_reproduces_stored_document() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("fnf.json");
        fs::write(&path, STORED).unwrap();

        let dataset = load(&path).unwrap();
        save(&path, &dataset).unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), STORED);
        assert!(!dir.path().join("fnf.json.tmp").exists());
    }

    #[test]
    fn invalid_json_names_the_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.json");
        fs::write(&path, "{ \"products\": [").unwrap();
        let err = load(&path).unwrap_err();
        assert!(matches!(err, IoError::Json { .. }));
        assert!(err.to_string().contains("broken.json"));
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let dir = tempdir().unwrap();
        let err = load(&dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, IoError::Read { .. }));
    }
}
