//! End-to-end pipeline tests over mock retrieval and completion capabilities.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use statement_extractor::*;

/// Keyword retriever: scores chunks by how many hint terms of the query they
/// contain, standing in for the embedding index.
struct KeywordRetriever;

#[async_trait]
impl Retriever for KeywordRetriever {
    async fn index(&self, _doc_hash: &str, chunks: Vec<Chunk>) -> Result<Box<dyn ChunkIndex>> {
        Ok(Box::new(KeywordIndex { chunks }))
    }
}

struct KeywordIndex {
    chunks: Vec<Chunk>,
}

#[async_trait]
impl ChunkIndex for KeywordIndex {
    async fn query(&self, query: &str, top_k: usize) -> Result<Vec<Fragment>> {
        let terms: Vec<String> = query.split(" | ").map(|t| t.to_uppercase()).collect();
        let mut scored: Vec<(usize, Fragment)> = self
            .chunks
            .iter()
            .map(|c| {
                let upper = c.text.to_uppercase();
                let score = terms.iter().filter(|t| upper.contains(t.as_str())).count();
                (
                    score,
                    Fragment {
                        text: c.text.clone(),
                        page: c.page,
                    },
                )
            })
            .filter(|(score, _)| *score > 0)
            .collect();
        scored.sort_by(|a, b| b.0.cmp(&a.0));
        Ok(scored.into_iter().take(top_k).map(|(_, f)| f).collect())
    }
}

/// Completion model answering from a scripted queue and recording every
/// prompt it was given.
struct ScriptedModel {
    answers: Mutex<VecDeque<Result<String>>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedModel {
    fn new(answers: Vec<Result<String>>) -> Arc<Self> {
        Arc::new(Self {
            answers: Mutex::new(answers.into_iter().collect()),
            calls: Mutex::new(Vec::new()),
        })
    }

    fn answering(answer: &str) -> Arc<Self> {
        Self::new(vec![Ok(answer.to_string())])
    }

    fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    fn user_prompt(&self, call: usize) -> String {
        self.calls.lock().unwrap()[call].clone()
    }
}

#[async_trait]
impl CompletionModel for ScriptedModel {
    async fn complete(&self, _system_prompt: &str, user_prompt: &str) -> Result<String> {
        self.calls.lock().unwrap().push(user_prompt.to_string());
        self.answers
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok("{}".to_string()))
    }
}

fn extractor(model: Arc<ScriptedModel>) -> StatementExtractor {
    StatementExtractor::new(Arc::new(KeywordRetriever), model)
}

fn doc(pages: Vec<PageText>) -> DocumentText {
    DocumentText::new("testhash", pages).unwrap()
}

fn cash_flow_doc() -> DocumentText {
    doc(vec![
        PageText::new(
            1,
            "ESTADO DE FLUJO DE EFECTIVO\n\
             EXPRESADO EN DOLARES\n\
             9501 FLUJO NETO DE OPERACION (1.500,00)",
        ),
        PageText::new(
            2,
            "INCREMENTO (DISMINUCIÓN) NETO DE EFECTIVO 2.000,00\n\
             EFECTIVO Y EQUIVALENTES AL EFECTIVO AL PRINCIPIO DEL PERIODO 500,00\n\
             EFECTIVO Y EQUIVALENTES AL EFECTIVO AL FINAL DEL PERIODO 2.500,00",
        ),
    ])
}

#[tokio::test]
async fn test_cash_flow_code_pass_with_completion_fallback() {
    let model = ScriptedModel::answering(
        r#"{"is_cashflow": true, "cashflow_confidence": 0.9,
            "fields": {"neto_efectivo": "2.000,00", "efectivo_inicio": 500,
                       "efectivo_final": "2.500,00", "intereses_pagados": null,
                       "intereses_recibidos": null, "impuestos_pagados": null},
            "field_confidence": {"neto_efectivo": 0.7}}"#,
    );
    let result = extractor(model.clone())
        .extract_cash_flow(&cash_flow_doc())
        .await
        .unwrap();

    // The 9501 line was matched deterministically, parenthesized negative.
    let flujo = &result.fields["flujo_operacion"];
    assert_eq!(flujo.value, Some(-1500.0));
    assert_eq!(flujo.confidence, Some(0.95));
    assert_eq!(
        flujo.evidence_pages.iter().copied().collect::<Vec<_>>(),
        vec![1]
    );

    // The fallback was invoked once and only asked for the missing fields.
    assert_eq!(model.call_count(), 1);
    let prompt = model.user_prompt(0);
    assert!(!prompt.contains("[flujo_operacion]"));
    assert!(prompt.contains("[neto_efectivo]"));
    assert!(prompt.contains("[efectivo_final]"));

    assert_eq!(result.fields["neto_efectivo"].value, Some(2000.0));
    assert_eq!(result.fields["neto_efectivo"].confidence, Some(0.7));
    // Contract omitted this confidence: the completion default applies.
    assert_eq!(result.fields["efectivo_inicio"].value, Some(500.0));
    assert_eq!(result.fields["efectivo_inicio"].confidence, Some(0.6));

    // Fallback values carry the pages their retrieval context came from.
    assert_eq!(
        result.fields["neto_efectivo"]
            .evidence_pages
            .iter()
            .copied()
            .collect::<Vec<_>>(),
        vec![2]
    );

    // Sub-items the fallback answered null for stay absent.
    assert_eq!(result.fields["intereses_pagados"].value, None);

    // All four core totals present after the fallback.
    assert!(result.is_type);
    assert_eq!(result.type_confidence, 1.0);
    assert!(result
        .notes
        .iter()
        .any(|n| n.contains("completion fallback")));
}

#[tokio::test]
async fn test_cash_flow_complete_code_pass_skips_completion() {
    let model = ScriptedModel::new(vec![]);
    let pages = vec![PageText::new(
        1,
        "ESTADO DE FLUJO DE EFECTIVO\n\
         9501 FLUJO OPERACION 100,00\n\
         9505 NETO EFECTIVO 50,00\n\
         9506 EFECTIVO INICIO 20,00\n\
         9507 EFECTIVO FINAL 70,00",
    )];
    let result = extractor(model.clone())
        .extract_cash_flow(&doc(pages))
        .await
        .unwrap();

    // Core totals all matched by code: no completion call, even though the
    // interest/tax sub-items are still absent.
    assert_eq!(model.call_count(), 0);
    assert_eq!(result.fields["flujo_operacion"].value, Some(100.0));
    assert_eq!(result.fields["efectivo_final"].value, Some(70.0));
    assert_eq!(result.fields["intereses_pagados"].value, None);
    assert_eq!(result.fields["intereses_pagados"].confidence, None);
    assert_eq!(result.type_confidence, 1.0);
}

#[tokio::test]
async fn test_cash_flow_code_pass_is_deterministic() {
    let document = doc(vec![PageText::new(
        1,
        "9501 FLUJO 100,00\n9505 NETO 50,00\n9506 INICIO 20,00\n9507 FINAL 70,00",
    )]);
    let first = extractor(ScriptedModel::new(vec![]))
        .extract_cash_flow(&document)
        .await
        .unwrap();
    let second = extractor(ScriptedModel::new(vec![]))
        .extract_cash_flow(&document)
        .await
        .unwrap();
    assert_eq!(first.fields, second.fields);
    assert_eq!(first.type_confidence, second.type_confidence);
}

#[tokio::test]
async fn test_cash_flow_scale_applied_once_to_code_values() {
    let pages = vec![PageText::new(
        1,
        "ESTADO DE FLUJO DE EFECTIVO (EXPRESADO EN MILES)\n\
         9501 FLUJO OPERACION 500,00\n\
         9505 NETO 50,00\n9506 INICIO 20,00\n9507 FINAL 70,00",
    )];
    let result = extractor(ScriptedModel::new(vec![]))
        .extract_cash_flow(&doc(pages))
        .await
        .unwrap();
    assert_eq!(result.header.scale_factor, 1000.0);
    assert_eq!(result.fields["flujo_operacion"].value, Some(500_000.0));
}

fn balance_doc() -> DocumentText {
    doc(vec![
        PageText::new(
            1,
            "RUC: 1790012345001\n\
             RAZÓN SOCIAL: COMERCIAL ANDINA S.A.\n\
             ESTADO DE SITUACION FINANCIERA 2023\n\
             EXPRESADO EN MILES DE DOLARES",
        ),
        PageText::new(2, "ACTIVOS CORRIENTES 300,00\nACTIVOS NO CORRIENTES 200,00"),
        PageText::new(3, "PASIVOS CORRIENTES 100,00"),
    ])
}

#[tokio::test]
async fn test_balance_end_to_end_with_derivation_and_scale() {
    let model = ScriptedModel::answering(
        r#"{"is_balance": true, "balance_confidence": 0.9,
            "fields": {"activos_corrientes": "300,00", "activos_no_corrientes": 200,
                       "pasivos_corrientes": 100, "activos_totales": null,
                       "pasivos_totales": null, "pasivos_no_corrientes": null,
                       "inventarios": null},
            "field_confidence": {"activos_corrientes": 0.9,
                                 "activos_no_corrientes": 0.8,
                                 "pasivos_corrientes": 0.85}}"#,
    );
    let result = extractor(model.clone())
        .extract_balance(&balance_doc())
        .await
        .unwrap();

    assert_eq!(model.call_count(), 1);
    assert_eq!(result.header.ruc.as_deref(), Some("1790012345001"));
    assert_eq!(result.header.report_year, Some(2023));
    assert_eq!(result.header.scale_factor, 1000.0);

    // Extracted components were scaled exactly once.
    assert_eq!(result.fields["activos_corrientes"].value, Some(300_000.0));
    assert_eq!(
        result.fields["activos_corrientes"]
            .evidence_pages
            .iter()
            .copied()
            .collect::<Vec<_>>(),
        vec![2]
    );

    // Missing totals were derived from components, then scaled once too.
    let activos_totales = &result.fields["activos_totales"];
    assert_eq!(activos_totales.value, Some(500_000.0));
    assert_eq!(activos_totales.confidence, Some(0.8));

    let pasivos_totales = &result.fields["pasivos_totales"];
    assert_eq!(pasivos_totales.value, Some(100_000.0));
    // The absent non-current component contributes the 0.6 default.
    assert_eq!(pasivos_totales.confidence, Some(0.6));

    assert!(result.is_type);
    assert_eq!(result.type_confidence, 0.9);
    assert!(result.markers_hits >= 1);
}

#[tokio::test]
async fn test_balance_tolerates_malformed_completion_answer() {
    let model = ScriptedModel::answering("I could not find any figures in this document.");
    let result = extractor(model)
        .extract_balance(&balance_doc())
        .await
        .unwrap();

    // The pass survives on heuristic defaults: empty fields, marker vote.
    assert!(result.fields.values().all(|f| f.value.is_none()));
    assert!(result.is_type);
    assert_eq!(result.type_confidence, result.markers_hits as f64 / 4.0);
    assert!(result
        .notes
        .iter()
        .any(|n| n.contains("failed the contract")));
}

#[tokio::test]
async fn test_income_fails_on_malformed_completion_answer() {
    let model = ScriptedModel::answering("not json");
    let pages = vec![PageText::new(1, "ESTADO DE RESULTADOS\nVENTAS 9.000,00")];
    let err = extractor(model)
        .extract_income(&doc(pages))
        .await
        .unwrap_err();
    assert!(matches!(err, ExtractionError::ExtractionParse(_)));
}

#[tokio::test]
async fn test_income_extraction_persists_only_income_fields() {
    let model = ScriptedModel::answering(
        r#"{"is_eri": true, "eri_confidence": 0.8,
            "fields": {"ventas": "9.000,00", "costo_ventas": "(4.000,00)",
                       "utilidad_neta": 1200, "inventario_inicial": 100,
                       "inventario_final": 150},
            "field_confidence": {"ventas": 0.9, "costo_ventas": 0.8, "utilidad_neta": 0.85}}"#,
    );
    let pages = vec![PageText::new(
        1,
        "ESTADO DE RESULTADO INTEGRAL\n40101 VENTA DE BIENES 9.000,00",
    )];
    let result = extractor(model.clone())
        .extract_income(&doc(pages))
        .await
        .unwrap();

    // The auxiliary inventory hints reach the prompt but never persist.
    let prompt = model.user_prompt(0);
    assert!(prompt.contains("[inventario_inicial]"));
    assert_eq!(result.fields.len(), 3);
    assert!(!result.fields.contains_key("inventario_inicial"));

    assert_eq!(result.fields["ventas"].value, Some(9000.0));
    assert_eq!(result.fields["costo_ventas"].value, Some(-4000.0));
    assert_eq!(result.fields["utilidad_neta"].value, Some(1200.0));

    // The dropped auxiliary keys are recorded in the run notes.
    assert_eq!(result.notes.len(), 1);
    assert!(result.notes[0].contains("inventario_inicial"));
    assert!(result.notes[0].contains("not persisted"));
}

#[tokio::test]
async fn test_capability_outage_is_fatal_for_every_pass() {
    let model = ScriptedModel::new(vec![Err(ExtractionError::CapabilityUnavailable(
        "connection refused".to_string(),
    ))]);
    let err = extractor(model)
        .extract_balance(&balance_doc())
        .await
        .unwrap_err();
    assert!(matches!(err, ExtractionError::CapabilityUnavailable(_)));
}

#[test]
fn test_unreadable_document_is_rejected_up_front() {
    let err = DocumentText::new("h", vec![PageText::new(1, "  \n ")]).unwrap_err();
    assert!(matches!(err, ExtractionError::UnreadableDocument));
}

#[tokio::test]
async fn test_artifacts_persist_with_type_specific_names() {
    let dir = tempfile::tempdir().unwrap();
    let store = ArtifactStore::new(dir.path());

    let balance_model = ScriptedModel::answering(
        r#"{"is_balance": true, "balance_confidence": 0.9,
            "fields": {"activos_corrientes": 300, "activos_no_corrientes": 200,
                       "pasivos_corrientes": 100},
            "field_confidence": {"activos_corrientes": 0.9}}"#,
    );
    let balance = extractor(balance_model)
        .extract_balance(&balance_doc())
        .await
        .unwrap();
    let balance_path = store
        .save(&StatementArtifact::from_result(&balance))
        .unwrap();
    assert!(balance_path.ends_with("testhash.json"));

    let cash_flow = extractor(ScriptedModel::new(vec![]))
        .extract_cash_flow(&doc(vec![PageText::new(
            1,
            "9501 FLUJO 100,00\n9505 NETO 50,00\n9506 INICIO 20,00\n9507 FINAL 70,00",
        )]))
        .await
        .unwrap();
    let cash_flow_path = store
        .save(&StatementArtifact::from_result(&cash_flow))
        .unwrap();
    assert!(cash_flow_path.ends_with("testhash_efe.json"));

    let balance_json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&balance_path).unwrap()).unwrap();
    assert_eq!(balance_json["is_balance"], serde_json::json!(true));
    // KPIs ride along on the balance artifact; derived totals feed them.
    let liquidez = &balance_json["kpis"]["liquidez_corriente"];
    assert_eq!(liquidez["ratio"], serde_json::json!(3.0));
    assert_eq!(liquidez["score"], serde_json::json!(95.0));
    assert_eq!(
        balance_json["data_quality"]["scale_factor"],
        serde_json::json!(1000.0)
    );

    let cash_flow_json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&cash_flow_path).unwrap()).unwrap();
    assert_eq!(cash_flow_json["is_cashflow"], serde_json::json!(true));
    assert!(cash_flow_json.get("kpis").is_none());
    // Unmatched sub-items persist as explicit nulls.
    assert_eq!(
        cash_flow_json["fields"]["intereses_pagados"],
        serde_json::Value::Null
    );
}

#[tokio::test]
async fn test_kpis_recomputable_from_any_result() {
    let cash_flow = extractor(ScriptedModel::new(vec![]))
        .extract_cash_flow(&doc(vec![PageText::new(
            1,
            "9501 FLUJO 100,00\n9505 NETO 50,00\n9506 INICIO 20,00\n9507 FINAL 70,00",
        )]))
        .await
        .unwrap();
    // Scoring is decoupled from document type; a field map without balance
    // keys simply yields absent indicators.
    let report = score_fields(&cash_flow.fields);
    assert_eq!(report.liquidez_corriente, KpiVal::default());
    assert_eq!(report.endeudamiento, KpiVal::default());
}
