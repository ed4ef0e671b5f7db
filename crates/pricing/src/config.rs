use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::model::{BorrowerLevel, RowKey};

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Everything the extractor needs to know about one rate sheet family.
///
/// `ExtractConfig::default()` describes the current sheet layout; a TOML file
/// only needs the keys it overrides.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ExtractConfig {
    /// Product tag in the sheet and product name in the dataset.
    pub product: String,
    /// Borrower levels accepted from the sheet.
    pub levels: Vec<BorrowerLevel>,
    /// Header row plus the rows below it that may carry split labels.
    pub header_depth: usize,
    /// Fall back to positional token scanning when no header row exists.
    pub token_scan: bool,
    /// Rebuild `loan_amount_tiers` from the merged rows.
    pub derive_loan_amount_tiers: bool,
    /// Anchor rows, tried in order, whose caps shape the triplet aligner.
    pub anchor_keys: Vec<RowKey>,
    pub labels: ColumnLabels,
    pub tolerance: ToleranceConfig,
    pub rates: RateConfig,
    /// Experience months for levels that no row and no stored entry supplies.
    pub experience_fallback: BTreeMap<BorrowerLevel, u32>,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            product: "FNF".into(),
            levels: BorrowerLevel::ALL.to_vec(),
            header_depth: 3,
            token_scan: true,
            derive_loan_amount_tiers: false,
            anchor_keys: vec![RowKey::new(BorrowerLevel::A, 720, 3)],
            labels: ColumnLabels::default(),
            tolerance: ToleranceConfig::default(),
            rates: RateConfig::default(),
            experience_fallback: BTreeMap::from([(BorrowerLevel::C, 3), (BorrowerLevel::D, 1)]),
        }
    }
}

// ---------------------------------------------------------------------------
// Column labels
// ---------------------------------------------------------------------------

/// Header text for every logical column.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ColumnLabels {
    pub product: String,
    pub level: String,
    pub min_experience: String,
    pub min_fico: String,
    pub loan_amount_tier: String,
    pub min_loan: String,
    pub max_loan: String,
    pub purchase_ltv: String,
    pub purchase_ltarv: String,
    pub purchase_ltc: String,
    pub refi_ltv: String,
    pub refi_ltarv: String,
    pub refi_ltc: String,
    pub tier1: String,
    pub tier2: String,
    pub tier3: String,
}

impl Default for ColumnLabels {
    fn default() -> Self {
        Self {
            product: "Product".into(),
            level: "Borrower Level".into(),
            min_experience: "Min. Experience 36 mos.".into(),
            min_fico: "Min. FICO".into(),
            loan_amount_tier: "Loan Amount Tier".into(),
            min_loan: "Min. Loan".into(),
            max_loan: "Max. Loan".into(),
            purchase_ltv: "Purchase LTV".into(),
            purchase_ltarv: "Purchase LTARV".into(),
            purchase_ltc: "Purchase LTC".into(),
            refi_ltv: "Refinance LF RehabLTV".into(),
            refi_ltarv: "Refinance LF RehabLTARV".into(),
            refi_ltc: "Refinance LF RehabLTC".into(),
            tier1: "Tier 1".into(),
            tier2: "Tier 2".into(),
            tier3: "Tier 3".into(),
        }
    }
}

impl ColumnLabels {
    pub fn all(&self) -> [(&'static str, &str); 16] {
        [
            ("product", self.product.as_str()),
            ("level", self.level.as_str()),
            ("min_experience", self.min_experience.as_str()),
            ("min_fico", self.min_fico.as_str()),
            ("loan_amount_tier", self.loan_amount_tier.as_str()),
            ("min_loan", self.min_loan.as_str()),
            ("max_loan", self.max_loan.as_str()),
            ("purchase_ltv", self.purchase_ltv.as_str()),
            ("purchase_ltarv", self.purchase_ltarv.as_str()),
            ("purchase_ltc", self.purchase_ltc.as_str()),
            ("refi_ltv", self.refi_ltv.as_str()),
            ("refi_ltarv", self.refi_ltarv.as_str()),
            ("refi_ltc", self.refi_ltc.as_str()),
            ("tier1", self.tier1.as_str()),
            ("tier2", self.tier2.as_str()),
            ("tier3", self.tier3.as_str()),
        ]
    }
}

// ---------------------------------------------------------------------------
// Tolerance + rates
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ToleranceConfig {
    /// Per-element slack when aligning a cap triplet (values get re-rounded).
    pub triplet: f64,
    /// Slack for treating two adjacent rates as one mirrored column.
    pub rate_pair: f64,
}

impl Default for ToleranceConfig {
    fn default() -> Self {
        Self {
            triplet: 5e-4,
            rate_pair: 5e-6,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RatePick {
    /// Last three rates of the row (rates sit after the caps).
    Tail,
    /// First three rates of the row.
    Head,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateConfig {
    pub band_min: f64,
    pub band_max: f64,
    pub pick: RatePick,
}

impl Default for RateConfig {
    fn default() -> Self {
        Self {
            band_min: 0.05,
            band_max: 0.15,
            pick: RatePick::Tail,
        }
    }
}

impl RateConfig {
    pub fn in_band(&self, v: f64) -> bool {
        v >= self.band_min && v <= self.band_max
    }
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl ExtractConfig {
    pub fn from_toml(input: &str) -> Result<Self, EngineError> {
        let config: ExtractConfig =
            toml::from_str(input).map_err(|e| EngineError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if self.product.trim().is_empty() {
            return Err(EngineError::ConfigValidation("product must not be empty".into()));
        }
        if self.levels.is_empty() {
            return Err(EngineError::ConfigValidation(
                "at least one borrower level is required".into(),
            ));
        }
        if self.header_depth == 0 {
            return Err(EngineError::ConfigValidation("header_depth must be at least 1".into()));
        }
        if self.anchor_keys.is_empty() {
            return Err(EngineError::ConfigValidation(
                "at least one anchor key is required".into(),
            ));
        }

        for (field, label) in self.labels.all() {
            if label.trim().is_empty() {
                return Err(EngineError::ConfigValidation(format!(
                    "labels.{field} must not be empty"
                )));
            }
        }

        let t = &self.tolerance;
        if !(t.triplet.is_finite() && t.triplet >= 0.0 && t.rate_pair.is_finite() && t.rate_pair >= 0.0) {
            return Err(EngineError::ConfigValidation(
                "tolerances must be finite and non-negative".into(),
            ));
        }

        let r = &self.rates;
        if !(r.band_min > 0.0 && r.band_min < r.band_max && r.band_max <= 1.0) {
            return Err(EngineError::ConfigValidation(format!(
                "rate band must satisfy 0 < band_min < band_max <= 1, got {}..{}",
                r.band_min, r.band_max
            )));
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
