//! Marker-based statement classification. Each statement type has a list of
//! phrases (and registry codes) that SCVS filings reliably print somewhere in
//! the document. The vote is advisory: it seeds type flags and confidence
//! defaults but never blocks an extraction pass.

use crate::schema::DocumentType;

/// Phrases that suggest a statement of financial position.
pub const BALANCE_MARKERS: &[&str] = &[
    "ESTADO DE SITUACION FINANCIERA",
    "ESTADO DE SITUACIÓN FINANCIERA",
    "ESTADO DE SITUACION",
    "ESTADO DE SITUACIÓN",
    "BALANCE GENERAL",
    "BALANCE DE SITUACION",
    "1 ACTIVO",
    "2 PASIVO",
    "3 PATRIMONIO",
    "TOTAL ACTIVO",
    "TOTAL PASIVO",
];

/// Phrases that suggest a comprehensive income statement.
pub const INCOME_MARKERS: &[&str] = &[
    "ESTADO DE RESULTADO INTEGRAL",
    "ESTADO DE RESULTADOS",
    "RESULTADO DEL PERIODO",
    "INGRESOS DE ACTIVIDADES ORDINARIAS",
    "VENTAS",
    "INGRESOS",
    "COSTO DE VENTAS",
    "UTILIDAD NETA",
    "RESULTADO NETO",
    "401",
    "501",
    "707",
];

/// Phrases and registry codes that suggest a cash-flow statement.
pub const CASH_FLOW_MARKERS: &[&str] = &[
    "ESTADO DE FLUJO DE EFECTIVO",
    "FLUJOS DE EFECTIVO",
    "FLUJO DE EFECTIVO",
    "ACTIVIDADES DE OPERACIÓN",
    "OPERACION",
    "ACTIVIDADES DE INVERSION",
    "ACTIVIDADES DE FINANCIACION",
    "9501",
    "9505",
    "9506",
    "9507",
];

/// Tolerant vote: one hit is enough to say the document "looks like" the
/// type. Used to seed type flags and confidence defaults, never to block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarkerVote {
    pub looks_like: bool,
    pub hits: usize,
}

impl MarkerVote {
    /// Confidence to fall back on when the completion contract carries no
    /// type confidence: a quarter per hit, saturating at 1.0.
    pub fn default_confidence(&self) -> f64 {
        (self.hits as f64 / 4.0).min(1.0)
    }
}

pub fn markers_for(kind: DocumentType) -> &'static [&'static str] {
    match kind {
        DocumentType::Balance => BALANCE_MARKERS,
        DocumentType::Income => INCOME_MARKERS,
        DocumentType::CashFlow => CASH_FLOW_MARKERS,
    }
}

/// Count marker hits in `text`. Matching is case-insensitive via an
/// uppercased copy, so callers can pass page text as extracted.
pub fn classify(kind: DocumentType, text: &str) -> MarkerVote {
    let upper = text.to_uppercase();
    let hits = markers_for(kind)
        .iter()
        .filter(|marker| upper.contains(**marker))
        .count();
    MarkerVote {
        looks_like: hits >= 1,
        hits,
    }
}
