//! Lenient decoding of completion answers. Models mostly honor the contract
//! but wrap the JSON in code fences or prose, answer confidences as strings,
//! and name the type flag after the statement they were asked about.
//! [`FieldExtraction`] absorbs those variants and hands the pipeline one
//! normalized shape.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::Value;

use crate::error::{ExtractionError, Result};
use crate::numeral;

/// Normalized completion answer: the statement-type flag plus per-field
/// amounts and confidences, all coerced to numbers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldExtraction {
    pub is_type: Option<bool>,
    pub type_confidence: Option<f64>,
    pub fields: BTreeMap<String, Option<f64>>,
    pub field_confidence: BTreeMap<String, Option<f64>>,
}

/// Wire shape before normalization. The flag and confidence keys differ per
/// statement type, so each variant is an alias of the same field; amounts
/// and confidences stay `Value` until coerced.
#[derive(Debug, Deserialize)]
struct RawExtraction {
    #[serde(alias = "is_balance", alias = "is_eri", alias = "is_cashflow")]
    is_type: Option<bool>,
    #[serde(
        alias = "balance_confidence",
        alias = "eri_confidence",
        alias = "cashflow_confidence"
    )]
    type_confidence: Option<Value>,
    #[serde(default)]
    fields: BTreeMap<String, Value>,
    #[serde(default)]
    field_confidence: BTreeMap<String, Value>,
}

impl FieldExtraction {
    /// Parse a raw completion answer. The outermost JSON object is cut out
    /// of whatever surrounds it; amounts go through the numeral normalizer
    /// and confidences are clamped to 0..1.
    pub fn from_completion(raw: &str) -> Result<Self> {
        let cleaned = clean_json_output(raw);
        let raw: RawExtraction = serde_json::from_str(&cleaned).map_err(|e| {
            ExtractionError::ExtractionParse(format!("completion answer is not contract JSON: {e}"))
        })?;
        Ok(Self::from_raw(raw))
    }

    fn from_raw(raw: RawExtraction) -> Self {
        let type_confidence = raw
            .type_confidence
            .as_ref()
            .and_then(numeral::coerce_confidence);
        let fields = raw
            .fields
            .iter()
            .map(|(key, value)| (key.clone(), numeral::normalize_value(value)))
            .collect();
        let field_confidence = raw
            .field_confidence
            .iter()
            .map(|(key, value)| (key.clone(), numeral::coerce_confidence(value)))
            .collect();
        Self {
            is_type: raw.is_type,
            type_confidence,
            fields,
            field_confidence,
        }
    }

    pub fn value(&self, key: &str) -> Option<f64> {
        self.fields.get(key).copied().flatten()
    }

    pub fn confidence(&self, key: &str) -> Option<f64> {
        self.field_confidence.get(key).copied().flatten()
    }
}

/// Cut the outermost JSON object out of a completion answer, dropping code
/// fences and any prose around it.
pub fn clean_json_output(raw: &str) -> String {
    if let Some(start) = raw.find('{') {
        if let Some(end) = raw.rfind('}') {
            if end > start {
                return raw[start..=end].to_string();
            }
        }
    }
    raw.trim().to_string()
}
