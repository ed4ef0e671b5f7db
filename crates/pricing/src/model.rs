use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

// ---------------------------------------------------------------------------
// Borrower level
// ---------------------------------------------------------------------------

/// Discrete risk tier, `A` (best) through `D` (weakest).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BorrowerLevel {
    A,
    B,
    C,
    D,
}

impl BorrowerLevel {
    pub const ALL: [BorrowerLevel; 4] = [Self::A, Self::B, Self::C, Self::D];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::A => "A",
            Self::B => "B",
            Self::C => "C",
            Self::D => "D",
        }
    }
}

impl fmt::Display for BorrowerLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BorrowerLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "A" => Ok(Self::A),
            "B" => Ok(Self::B),
            "C" => Ok(Self::C),
            "D" => Ok(Self::D),
            other => Err(format!("unknown borrower level '{other}'")),
        }
    }
}

// Hand-written so the level works both as a plain value and as a JSON map key.
impl Serialize for BorrowerLevel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for BorrowerLevel {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct LevelVisitor;

        impl Visitor<'_> for LevelVisitor {
            type Value = BorrowerLevel;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a borrower level letter (A-D)")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<BorrowerLevel, E> {
                v.parse().map_err(E::custom)
            }
        }

        deserializer.deserialize_str(LevelVisitor)
    }
}

// ---------------------------------------------------------------------------
// Keys
// ---------------------------------------------------------------------------

/// Dataset identity of a pricing row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RowKey {
    #[serde(alias = "borrower_level")]
    pub borrower_level: BorrowerLevel,
    #[serde(alias = "min_fico")]
    pub min_fico: u32,
    #[serde(alias = "loan_amount_tier")]
    pub loan_amount_tier: u32,
}

impl RowKey {
    pub fn new(borrower_level: BorrowerLevel, min_fico: u32, loan_amount_tier: u32) -> Self {
        Self {
            borrower_level,
            min_fico,
            loan_amount_tier,
        }
    }

    pub fn caps_key(&self) -> CapsKey {
        CapsKey {
            borrower_level: self.borrower_level,
            min_fico: self.min_fico,
        }
    }
}

impl fmt::Display for RowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/tier {}", self.borrower_level, self.min_fico, self.loan_amount_tier)
    }
}

/// Partial key used by the caps-only cache: no tier, no loan bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CapsKey {
    pub borrower_level: BorrowerLevel,
    pub min_fico: u32,
}

// ---------------------------------------------------------------------------
// Caps + note rates
// ---------------------------------------------------------------------------

/// LTV / LTARV / LTC caps for one loan purpose.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Caps {
    #[serde(rename = "LTV", default)]
    pub ltv: Option<f64>,
    #[serde(rename = "LTARV", default)]
    pub ltarv: Option<f64>,
    #[serde(rename = "LTC", default)]
    pub ltc: Option<f64>,
}

impl Caps {
    pub fn from_triplet(values: &[f64]) -> Self {
        Self {
            ltv: values.first().copied(),
            ltarv: values.get(1).copied(),
            ltc: values.get(2).copied(),
        }
    }

    pub fn triplet(&self) -> [Option<f64>; 3] {
        [self.ltv, self.ltarv, self.ltc]
    }

    pub fn is_complete(&self) -> bool {
        self.triplet().iter().all(Option::is_some)
    }

    pub fn fields_mut(&mut self) -> [&mut Option<f64>; 3] {
        [&mut self.ltv, &mut self.ltarv, &mut self.ltc]
    }

    /// Fill absent caps from `other`. Returns how many were filled.
    pub fn backfill_from(&mut self, other: &Caps) -> usize {
        let mut filled = 0;
        for (slot, source) in self.fields_mut().into_iter().zip(other.triplet()) {
            if slot.is_none() && source.is_some() {
                *slot = source;
                filled += 1;
            }
        }
        filled
    }
}

/// The three note-rate tiers of a pricing row.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NoteRates {
    #[serde(rename = "Tier1")]
    pub tier1: f64,
    #[serde(rename = "Tier2")]
    pub tier2: f64,
    #[serde(rename = "Tier3")]
    pub tier3: f64,
}

impl NoteRates {
    pub fn from_slice(values: &[f64]) -> Option<Self> {
        match values {
            [tier1, tier2, tier3] => Some(Self {
                tier1: *tier1,
                tier2: *tier2,
                tier3: *tier3,
            }),
            _ => None,
        }
    }

    pub fn as_array(&self) -> [f64; 3] {
        [self.tier1, self.tier2, self.tier3]
    }
}

// ---------------------------------------------------------------------------
// Pricing row
// ---------------------------------------------------------------------------

/// One eligibility / pricing rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PricingRow {
    pub product: String,
    pub borrower_level: BorrowerLevel,
    #[serde(default, deserialize_with = "null_as_default")]
    pub min_experience_months: u32,
    pub min_fico: u32,
    pub loan_amount_tier: u32,
    #[serde(default)]
    pub min_loan: Option<f64>,
    #[serde(default)]
    pub max_loan: Option<f64>,
    #[serde(default)]
    pub purchase: Caps,
    #[serde(default)]
    pub refi: Caps,
    #[serde(default, deserialize_with = "partial_rates_as_none")]
    pub note_rates: Option<NoteRates>,
    /// Fields written by other tools (e.g. `qualificationKey`), kept as-is.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PricingRow {
    pub fn key(&self) -> RowKey {
        RowKey::new(self.borrower_level, self.min_fico, self.loan_amount_tier)
    }

    pub fn caps_key(&self) -> CapsKey {
        self.key().caps_key()
    }
}

// Older dataset revisions wrote `null` where a zero was meant.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

// Older exports wrote `{"Tier1": null, ...}` when a tier column was missing.
// Any null tier makes the whole triple absent.
fn partial_rates_as_none<'de, D>(deserializer: D) -> Result<Option<NoteRates>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    struct PartialRates {
        #[serde(rename = "Tier1", default)]
        tier1: Option<f64>,
        #[serde(rename = "Tier2", default)]
        tier2: Option<f64>,
        #[serde(rename = "Tier3", default)]
        tier3: Option<f64>,
    }

    let partial = Option::<PartialRates>::deserialize(deserializer)?;
    Ok(partial.and_then(|p| match (p.tier1, p.tier2, p.tier3) {
        (Some(tier1), Some(tier2), Some(tier3)) => Some(NoteRates { tier1, tier2, tier3 }),
        _ => None,
    }))
}

// ---------------------------------------------------------------------------
// Dataset
// ---------------------------------------------------------------------------

/// All rules for one product.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductBook {
    #[serde(default)]
    pub pricing_rows: Vec<PricingRow>,
    #[serde(default)]
    pub experience_requirements_months: BTreeMap<BorrowerLevel, u32>,
    /// `loan_amount_tiers`, `state_tiers` and anything else consumers store.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ProductBook {
    pub fn find(&self, key: &RowKey) -> Option<&PricingRow> {
        self.pricing_rows.iter().find(|r| r.key() == *key)
    }
}

/// The persisted document: `{ products: { <name>: ProductBook } }`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    #[serde(default)]
    pub products: BTreeMap<String, ProductBook>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Dataset {
    pub fn from_json(input: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(input)
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
