//! Core data model: document types, the closed per-type field vocabularies
//! (SCVS wire keys and retrieval hints), extraction results, and the JSON
//! contracts the completion capability must answer with.

use std::collections::{BTreeMap, BTreeSet};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::header::HeaderMeta;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    /// Estado de Situación Financiera (balance sheet).
    Balance,
    /// Estado de Resultado Integral (income statement).
    Income,
    /// Estado de Flujo de Efectivo (cash-flow statement).
    CashFlow,
}

impl DocumentType {
    /// Suffix of the persisted artifact file, `{hash}{suffix}.json`.
    pub fn artifact_suffix(self) -> &'static str {
        match self {
            DocumentType::Balance => "",
            DocumentType::Income => "_eri",
            DocumentType::CashFlow => "_efe",
        }
    }
}

/// A document type's closed field vocabulary. The three sets are disjoint
/// enumerations, not an open schema; the wire key is what prompts, contracts
/// and artifacts all use.
pub trait FieldSet: Copy + Sized + 'static {
    /// Every field of the set, in artifact order.
    const ALL: &'static [Self];

    /// Wire key (snake_case Spanish, as printed in SCVS filings).
    fn key(self) -> &'static str;

    /// Retrieval hint phrases, most specific first.
    fn hints(self) -> &'static [&'static str];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BalanceField {
    ActivosCorrientes,
    ActivosNoCorrientes,
    ActivosTotales,
    PasivosCorrientes,
    PasivosNoCorrientes,
    PasivosTotales,
    Inventarios,
}

impl FieldSet for BalanceField {
    const ALL: &'static [Self] = &[
        BalanceField::ActivosCorrientes,
        BalanceField::ActivosNoCorrientes,
        BalanceField::ActivosTotales,
        BalanceField::PasivosCorrientes,
        BalanceField::PasivosNoCorrientes,
        BalanceField::PasivosTotales,
        BalanceField::Inventarios,
    ];

    fn key(self) -> &'static str {
        match self {
            BalanceField::ActivosCorrientes => "activos_corrientes",
            BalanceField::ActivosNoCorrientes => "activos_no_corrientes",
            BalanceField::ActivosTotales => "activos_totales",
            BalanceField::PasivosCorrientes => "pasivos_corrientes",
            BalanceField::PasivosNoCorrientes => "pasivos_no_corrientes",
            BalanceField::PasivosTotales => "pasivos_totales",
            BalanceField::Inventarios => "inventarios",
        }
    }

    fn hints(self) -> &'static [&'static str] {
        match self {
            BalanceField::ActivosCorrientes => &["ACTIVO CORRIENTE", "ACTIVOS CORRIENTES"],
            BalanceField::ActivosNoCorrientes => {
                &["ACTIVO NO CORRIENTE", "ACTIVOS NO CORRIENTES"]
            }
            BalanceField::ActivosTotales => &["1 ACTIVO", "TOTAL ACTIVO", "TOTAL ACTIVOS"],
            BalanceField::PasivosCorrientes => &["PASIVO CORRIENTE", "PASIVOS CORRIENTES"],
            BalanceField::PasivosNoCorrientes => {
                &["PASIVO NO CORRIENTE", "PASIVOS NO CORRIENTES"]
            }
            BalanceField::PasivosTotales => {
                &["2 PASIVO", "TOTAL PASIVO", "TOTAL PASIVOS", "PASIVO (TOTAL)"]
            }
            BalanceField::Inventarios => &["INVENTARIO", "INVENTARIOS", "EXISTENCIAS"],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IncomeField {
    Ventas,
    CostoVentas,
    UtilidadNeta,
}

impl FieldSet for IncomeField {
    const ALL: &'static [Self] = &[
        IncomeField::Ventas,
        IncomeField::CostoVentas,
        IncomeField::UtilidadNeta,
    ];

    fn key(self) -> &'static str {
        match self {
            IncomeField::Ventas => "ventas",
            IncomeField::CostoVentas => "costo_ventas",
            IncomeField::UtilidadNeta => "utilidad_neta",
        }
    }

    fn hints(self) -> &'static [&'static str] {
        match self {
            IncomeField::Ventas => &[
                "40101 VENTA DE BIENES",
                "INGRESOS DE ACTIVIDADES ORDINARIAS",
                "VENTAS",
            ],
            IncomeField::CostoVentas => {
                &["501 COSTO DE VENTAS", "COSTO DE VENTAS Y PRODUCCIÓN"]
            }
            IncomeField::UtilidadNeta => &[
                "707 GANANCIA (PÉRDIDA) NETA DEL PERIODO",
                "UTILIDAD NETA",
                "RESULTADO NETO",
            ],
        }
    }
}

/// Auxiliary income hints: retrieved and offered to the completion call (the
/// inventory pair helps it locate the cost-of-sales block) but never
/// persisted as fields.
pub const INCOME_AUX_HINTS: &[(&str, &[&str])] = &[
    (
        "inventario_inicial",
        &["INVENTARIO INICIAL", "EXISTENCIAS INICIALES"],
    ),
    (
        "inventario_final",
        &["INVENTARIO FINAL", "EXISTENCIAS FINALES"],
    ),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CashFlowField {
    FlujoOperacion,
    NetoEfectivo,
    EfectivoInicio,
    EfectivoFinal,
    InteresesPagados,
    InteresesRecibidos,
    ImpuestosPagados,
}

impl CashFlowField {
    /// SCVS registry code printed next to the line item. 4 digits for the
    /// statement totals, 6 digits for the interest/tax sub-items; lookup is
    /// exact full-string equality, never prefix matching.
    pub fn registry_code(self) -> &'static str {
        match self {
            CashFlowField::FlujoOperacion => "9501",
            CashFlowField::NetoEfectivo => "9505",
            CashFlowField::EfectivoInicio => "9506",
            CashFlowField::EfectivoFinal => "9507",
            CashFlowField::InteresesPagados => "950105",
            CashFlowField::InteresesRecibidos => "950106",
            CashFlowField::ImpuestosPagados => "950107",
        }
    }

    /// The four statement totals that decide whether the completion fallback
    /// runs and how confident the type signal is.
    pub fn is_core_total(self) -> bool {
        matches!(
            self,
            CashFlowField::FlujoOperacion
                | CashFlowField::NetoEfectivo
                | CashFlowField::EfectivoInicio
                | CashFlowField::EfectivoFinal
        )
    }
}

impl FieldSet for CashFlowField {
    const ALL: &'static [Self] = &[
        CashFlowField::FlujoOperacion,
        CashFlowField::NetoEfectivo,
        CashFlowField::EfectivoInicio,
        CashFlowField::EfectivoFinal,
        CashFlowField::InteresesPagados,
        CashFlowField::InteresesRecibidos,
        CashFlowField::ImpuestosPagados,
    ];

    fn key(self) -> &'static str {
        match self {
            CashFlowField::FlujoOperacion => "flujo_operacion",
            CashFlowField::NetoEfectivo => "neto_efectivo",
            CashFlowField::EfectivoInicio => "efectivo_inicio",
            CashFlowField::EfectivoFinal => "efectivo_final",
            CashFlowField::InteresesPagados => "intereses_pagados",
            CashFlowField::InteresesRecibidos => "intereses_recibidos",
            CashFlowField::ImpuestosPagados => "impuestos_pagados",
        }
    }

    fn hints(self) -> &'static [&'static str] {
        match self {
            CashFlowField::FlujoOperacion => &[
                "9501",
                "FLUJOS DE EFECTIVO",
                "ACTIVIDADES DE OPERACIÓN",
                "OPERACION",
            ],
            CashFlowField::NetoEfectivo => {
                &["9505", "INCREMENTO (DISMINUCIÓN) NETO DE EFECTIVO"]
            }
            CashFlowField::EfectivoInicio => &[
                "9506",
                "EFECTIVO Y EQUIVALENTES AL EFECTIVO AL PRINCIPIO DEL PERIODO",
            ],
            CashFlowField::EfectivoFinal => &[
                "9507",
                "EFECTIVO Y EQUIVALENTES AL EFECTIVO AL FINAL DEL PERIODO",
            ],
            CashFlowField::InteresesPagados => &["INTERESES PAGADOS"],
            CashFlowField::InteresesRecibidos => &["INTERESES RECIBIDOS"],
            CashFlowField::ImpuestosPagados => {
                &["IMPUESTOS A LAS GANANCIAS PAGADOS", "IMPUESTOS PAGADOS"]
            }
        }
    }
}

/// One extracted line item. An absent value never carries a fabricated
/// confidence; evidence pages substantiate where the value (or its retrieval
/// context) came from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldValue {
    pub value: Option<f64>,
    pub confidence: Option<f64>,
    pub evidence_pages: BTreeSet<u32>,
}

/// Terminal output of one pipeline pass over one document. Frozen once
/// produced; KPI scoring and artifact assembly both read from it.
#[derive(Debug, Clone, Serialize)]
pub struct ExtractionResult {
    pub doc_hash: String,
    pub document_type: DocumentType,
    /// Whether the document appears to be of `document_type` (contract flag
    /// when the completion answered, marker vote otherwise).
    pub is_type: bool,
    pub type_confidence: f64,
    /// Every wire key of the type's field set is present, populated or not.
    pub fields: BTreeMap<String, FieldValue>,
    pub header: HeaderMeta,
    /// Advisory marker count surfaced as a quality signal.
    pub markers_hits: usize,
    pub notes: Vec<String>,
}

impl ExtractionResult {
    pub fn value(&self, key: &str) -> Option<f64> {
        self.fields.get(key).and_then(|f| f.value)
    }

    /// Populated persisted fields over total persisted fields.
    pub fn non_null_ratio(&self) -> f64 {
        if self.fields.is_empty() {
            return 0.0;
        }
        let populated = self.fields.values().filter(|f| f.value.is_some()).count();
        populated as f64 / self.fields.len() as f64
    }
}

// ---------- Completion output contracts ----------
//
// The schema of each contract is embedded verbatim in the prompt as format
// instructions; responses are parsed leniently through
// `llm::types::FieldExtraction` rather than against these structs.

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct BalanceContract {
    #[schemars(description = "Whether the document is an ESTADO DE SITUACIÓN FINANCIERA (SCVS balance sheet)")]
    pub is_balance: bool,

    #[schemars(description = "Confidence 0..1 that the document is a balance sheet")]
    pub balance_confidence: f64,

    #[schemars(
        description = "Extracted amount per field key (activos_corrientes, activos_no_corrientes, activos_totales, pasivos_corrientes, pasivos_no_corrientes, pasivos_totales, inventarios); null when the context shows no clear evidence"
    )]
    pub fields: BTreeMap<String, Option<f64>>,

    #[schemars(description = "Confidence 0..1 per field key")]
    pub field_confidence: BTreeMap<String, Option<f64>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct IncomeContract {
    #[schemars(description = "Whether the document is an ESTADO DE RESULTADO INTEGRAL (SCVS income statement)")]
    pub is_eri: bool,

    #[schemars(description = "Confidence 0..1 that the document is an income statement")]
    pub eri_confidence: f64,

    #[schemars(
        description = "Extracted amount per field key (ventas, costo_ventas, utilidad_neta and, when printed, inventario_inicial / inventario_final); null when the context shows no clear evidence"
    )]
    pub fields: BTreeMap<String, Option<f64>>,

    #[schemars(description = "Confidence 0..1 per field key")]
    pub field_confidence: BTreeMap<String, Option<f64>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CashFlowContract {
    #[schemars(description = "Whether the document is an ESTADO DE FLUJO DE EFECTIVO (SCVS cash-flow statement)")]
    pub is_cashflow: bool,

    #[schemars(description = "Confidence 0..1 that the document is a cash-flow statement")]
    pub cashflow_confidence: f64,

    #[schemars(
        description = "Extracted amount per field key (flujo_operacion, neto_efectivo, efectivo_inicio, efectivo_final, intereses_pagados, intereses_recibidos, impuestos_pagados); null when the exact registry code is not printed"
    )]
    pub fields: BTreeMap<String, Option<f64>>,

    #[schemars(description = "Confidence 0..1 per field key")]
    pub field_confidence: BTreeMap<String, Option<f64>>,
}

impl BalanceContract {
    pub fn schema_as_json() -> Result<String> {
        let schema = schemars::schema_for!(BalanceContract);
        Ok(serde_json::to_string_pretty(&schema)?)
    }
}

impl IncomeContract {
    pub fn schema_as_json() -> Result<String> {
        let schema = schemars::schema_for!(IncomeContract);
        Ok(serde_json::to_string_pretty(&schema)?)
    }
}

impl CashFlowContract {
    pub fn schema_as_json() -> Result<String> {
        let schema = schemars::schema_for!(CashFlowContract);
        Ok(serde_json::to_string_pretty(&schema)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_keys_are_disjoint() {
        let mut keys: Vec<&str> = BalanceField::ALL.iter().map(|f| f.key()).collect();
        keys.extend(IncomeField::ALL.iter().map(|f| f.key()));
        keys.extend(CashFlowField::ALL.iter().map(|f| f.key()));
        let total = keys.len();
        keys.sort();
        keys.dedup();
        assert_eq!(keys.len(), total);
        assert_eq!(total, 7 + 3 + 7);
    }

    #[test]
    fn test_registry_codes() {
        assert_eq!(CashFlowField::FlujoOperacion.registry_code(), "9501");
        assert_eq!(CashFlowField::InteresesPagados.registry_code(), "950105");
        let core: Vec<_> = CashFlowField::ALL
            .iter()
            .filter(|f| f.is_core_total())
            .collect();
        assert_eq!(core.len(), 4);
        assert!(!CashFlowField::ImpuestosPagados.is_core_total());
    }

    #[test]
    fn test_every_field_has_hints() {
        for f in BalanceField::ALL {
            assert!(!f.hints().is_empty());
        }
        for f in IncomeField::ALL {
            assert!(!f.hints().is_empty());
        }
        for f in CashFlowField::ALL {
            assert!(!f.hints().is_empty());
        }
    }

    #[test]
    fn test_contract_schema_generation() {
        let schema = BalanceContract::schema_as_json().unwrap();
        assert!(schema.contains("is_balance"));
        assert!(schema.contains("balance_confidence"));
        assert!(schema.contains("field_confidence"));

        let schema = CashFlowContract::schema_as_json().unwrap();
        assert!(schema.contains("is_cashflow"));
        assert!(schema.contains("flujo_operacion"));
    }

    #[test]
    fn test_non_null_ratio() {
        let mut fields = BTreeMap::new();
        fields.insert(
            "ventas".to_string(),
            FieldValue {
                value: Some(10.0),
                confidence: Some(0.9),
                evidence_pages: BTreeSet::new(),
            },
        );
        fields.insert("costo_ventas".to_string(), FieldValue::default());
        fields.insert("utilidad_neta".to_string(), FieldValue::default());
        let result = ExtractionResult {
            doc_hash: "h".into(),
            document_type: DocumentType::Income,
            is_type: true,
            type_confidence: 0.9,
            fields,
            header: HeaderMeta::default(),
            markers_hits: 2,
            notes: Vec::new(),
        };
        assert!((result.non_null_ratio() - 1.0 / 3.0).abs() < 1e-9);
        assert_eq!(result.value("ventas"), Some(10.0));
        assert_eq!(result.value("costo_ventas"), None);
    }

    #[test]
    fn test_artifact_suffixes() {
        assert_eq!(DocumentType::Balance.artifact_suffix(), "");
        assert_eq!(DocumentType::Income.artifact_suffix(), "_eri");
        assert_eq!(DocumentType::CashFlow.artifact_suffix(), "_efe");
    }
}
