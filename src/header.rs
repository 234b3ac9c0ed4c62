//! Header metadata and scale detection on first-page text.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static RUC_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bRUC[:\s]*([0-9\-]+)").unwrap());
static ENTITY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(RAZ[ÓO]N SOCIAL|DENOMINACI[ÓO]N)[:\s]*([A-Z0-9\.\-&\s]+)").unwrap()
});
static YEAR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(20\d{2})\b").unwrap());
static CURRENCY_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(USD|D[ÓO]LARES|\$)").unwrap());
static SCALE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(EN\s+MIL(ES)?|MILES)\b").unwrap());

/// Issuer metadata pulled from the report header, plus the scale every
/// monetary field must be multiplied by ("expresado en miles" reports carry
/// amounts a thousand times smaller than their real value).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeaderMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ruc: Option<String>,
    #[serde(rename = "empresa", skip_serializing_if = "Option::is_none")]
    pub entity_name: Option<String>,
    #[serde(rename = "anio", skip_serializing_if = "Option::is_none")]
    pub report_year: Option<u16>,
    #[serde(rename = "moneda", skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    pub scale_factor: f64,
}

impl Default for HeaderMeta {
    fn default() -> Self {
        Self {
            ruc: None,
            entity_name: None,
            report_year: None,
            currency: None,
            scale_factor: 1.0,
        }
    }
}

/// Scan header text for issuer metadata. Matching is done on the uppercased
/// text, so the patterns only need the uppercase forms.
pub fn detect(text: &str) -> HeaderMeta {
    let t = text.to_uppercase();

    let ruc = RUC_RE
        .captures(&t)
        .map(|c| c[1].trim().to_string())
        .filter(|s| !s.is_empty());
    let entity_name = ENTITY_RE
        .captures(&t)
        .map(|c| c[2].trim().to_string())
        .filter(|s| !s.is_empty());
    let report_year = YEAR_RE.captures(&t).and_then(|c| c[1].parse::<u16>().ok());
    let currency = CURRENCY_RE.captures(&t).map(|c| c[1].trim().to_string());
    let scale_factor = if SCALE_RE.is_match(&t) { 1000.0 } else { 1.0 };

    HeaderMeta {
        ruc,
        entity_name,
        report_year,
        currency,
        scale_factor,
    }
}
