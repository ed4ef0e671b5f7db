use thiserror::Error;

use crate::model::RowKey;

#[derive(Debug, Error)]
pub enum EngineError {
    /// TOML parse / deserialization error.
    #[error("config parse error: {0}")]
    ConfigParse(String),
    /// Config validation error (empty product tag, inverted rate band, etc.).
    #[error("config validation error: {0}")]
    ConfigValidation(String),
    /// The stored dataset has no book for the configured product.
    #[error("dataset has no product '{0}'")]
    UnknownProduct(String),
    /// None of the configured anchor rows exist with complete caps.
    #[error("no anchor row with complete purchase/refi caps found (tried {})", format_keys(.tried))]
    AnchorNotFound { tried: Vec<RowKey> },
    /// No header row and the token-scan fallback is disabled.
    #[error("header row with '{product_label}' and '{level_label}' not found")]
    HeaderNotFound {
        product_label: String,
        level_label: String,
    },
}

fn format_keys(keys: &[RowKey]) -> String {
    if keys.is_empty() {
        return "none".into();
    }
    keys.iter().map(|k| k.to_string()).collect::<Vec<_>>().join(", ")
}
