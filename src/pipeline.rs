//! Per-statement extraction pipelines. One [`StatementExtractor`] holds the
//! injected retrieval and completion handles and runs the document-type
//! passes: retrieval plus one completion call for balance and income
//! statements, the deterministic code-index pass with a completion fallback
//! for cash-flow statements. Scale is applied exactly once per run, after
//! derivation.

use std::collections::BTreeMap;
use std::sync::Arc;

use log::{debug, info, warn};

use crate::classify;
use crate::codes::CodeIndex;
use crate::document::DocumentText;
use crate::error::{ExtractionError, Result};
use crate::header;
use crate::llm::{CompletionModel, FieldExtraction, FieldExtractor};
use crate::retrieval::{self, FieldContext, Retriever, DEFAULT_TOP_K};
use crate::schema::{
    BalanceField, CashFlowField, DocumentType, ExtractionResult, FieldSet, FieldValue, IncomeField,
    INCOME_AUX_HINTS,
};
use crate::totals;

/// Confidence attached to a value matched by registry code.
const CODE_MATCH_CONFIDENCE: f64 = 0.95;
/// Confidence assumed for a completion value whose contract omitted one.
const COMPLETION_DEFAULT_CONFIDENCE: f64 = 0.6;
/// Ceiling on the confidence of a field with no value. Absence of evidence
/// must never look confident.
const ABSENT_CONFIDENCE_CAP: f64 = 0.3;
/// Type-confidence weight per core cash-flow total found by code.
const CORE_TOTAL_WEIGHT: f64 = 0.25;

/// Request-scoped extraction pipeline over injected capability handles.
/// No ambient singletons: the caller constructs the retriever and model once
/// and shares them across documents.
pub struct StatementExtractor {
    retriever: Arc<dyn Retriever>,
    extractor: FieldExtractor,
}

impl StatementExtractor {
    pub fn new(retriever: Arc<dyn Retriever>, model: Arc<dyn CompletionModel>) -> Self {
        Self {
            retriever,
            extractor: FieldExtractor::new(model),
        }
    }

    /// Run the pass for `document_type` over one document.
    pub async fn extract(
        &self,
        document_type: DocumentType,
        doc: &DocumentText,
    ) -> Result<ExtractionResult> {
        match document_type {
            DocumentType::Balance => self.extract_balance(doc).await,
            DocumentType::Income => self.extract_income(doc).await,
            DocumentType::CashFlow => self.extract_cash_flow(doc).await,
        }
    }

    /// Balance-sheet pass: retrieval context per field, one completion call,
    /// totals derivation, scale. A completion answer that fails the contract
    /// is tolerated here; the marker vote keeps the result usable.
    pub async fn extract_balance(&self, doc: &DocumentText) -> Result<ExtractionResult> {
        let header = header::detect(doc.first_page_text());
        let vote = classify::classify(DocumentType::Balance, &doc.full_text());
        let mut notes = Vec::new();

        let hints = retrieval::hint_table::<BalanceField>();
        let contexts = self.field_contexts(doc, &hints).await?;
        let keys: Vec<&str> = BalanceField::ALL.iter().map(|f| f.key()).collect();

        let extraction = match self
            .extractor
            .extract(DocumentType::Balance, &keys, &contexts)
            .await
        {
            Ok(extraction) => extraction,
            Err(ExtractionError::ExtractionParse(msg)) => {
                warn!("balance completion answer rejected, keeping marker defaults: {msg}");
                notes.push(format!(
                    "completion answer failed the contract ({msg}); fields left empty, type signal from markers"
                ));
                FieldExtraction::default()
            }
            Err(e) => return Err(e),
        };

        let mut fields = collect_fields(&keys, &extraction, &contexts);
        totals::derive_balance_totals(&mut fields);
        totals::apply_scale(&mut fields, header.scale_factor);

        info!(
            "balance pass for {}: {} markers, {}/{} fields populated",
            doc.doc_hash,
            vote.hits,
            fields.values().filter(|f| f.value.is_some()).count(),
            fields.len()
        );

        Ok(ExtractionResult {
            doc_hash: doc.doc_hash.clone(),
            document_type: DocumentType::Balance,
            is_type: extraction.is_type.unwrap_or(vote.looks_like),
            type_confidence: extraction
                .type_confidence
                .unwrap_or_else(|| vote.default_confidence()),
            fields,
            header,
            markers_hits: vote.hits,
            notes,
        })
    }

    /// Income-statement pass. The inventory hints are retrieved and offered
    /// to the completion call but only the three income fields persist. A
    /// contract failure is fatal here: there is no deterministic fallback.
    pub async fn extract_income(&self, doc: &DocumentText) -> Result<ExtractionResult> {
        let header = header::detect(doc.first_page_text());
        let vote = classify::classify(DocumentType::Income, &doc.full_text());

        let mut hints = retrieval::hint_table::<IncomeField>();
        hints.extend(INCOME_AUX_HINTS.iter().copied());
        let contexts = self.field_contexts(doc, &hints).await?;
        let prompt_keys: Vec<&str> = hints.iter().map(|(key, _)| *key).collect();

        let extraction = self
            .extractor
            .extract(DocumentType::Income, &prompt_keys, &contexts)
            .await?;

        let persisted: Vec<&str> = IncomeField::ALL.iter().map(|f| f.key()).collect();
        let mut fields = collect_fields(&persisted, &extraction, &contexts);
        totals::apply_scale(&mut fields, header.scale_factor);

        let aux: Vec<&str> = INCOME_AUX_HINTS.iter().map(|(key, _)| *key).collect();
        let notes = vec![format!(
            "auxiliary context queried but not persisted: {}",
            aux.join(", ")
        )];

        info!(
            "income pass for {}: {} markers, {}/{} fields populated",
            doc.doc_hash,
            vote.hits,
            fields.values().filter(|f| f.value.is_some()).count(),
            fields.len()
        );

        Ok(ExtractionResult {
            doc_hash: doc.doc_hash.clone(),
            document_type: DocumentType::Income,
            is_type: extraction.is_type.unwrap_or(vote.looks_like),
            type_confidence: extraction
                .type_confidence
                .unwrap_or_else(|| vote.default_confidence()),
            fields,
            header,
            markers_hits: vote.hits,
            notes,
        })
    }

    /// Cash-flow pass: registry codes first, then a completion fallback only
    /// for the fields the code scan left empty. Code matches always win over
    /// completion answers; a contract failure in the fallback is fatal.
    pub async fn extract_cash_flow(&self, doc: &DocumentText) -> Result<ExtractionResult> {
        let header = header::detect(doc.first_page_text());
        let vote = classify::classify(DocumentType::CashFlow, &doc.full_text());
        let mut notes = Vec::new();

        let code_index = CodeIndex::from_pages(&doc.pages);
        let mut fields: BTreeMap<String, FieldValue> = BTreeMap::new();
        for field in CashFlowField::ALL {
            let entry = match code_index.get(field.registry_code()) {
                Some(entry) => FieldValue {
                    value: Some(entry.value),
                    confidence: Some(CODE_MATCH_CONFIDENCE),
                    evidence_pages: entry.pages.clone(),
                },
                None => FieldValue::default(),
            };
            fields.insert(field.key().to_string(), entry);
        }

        let by_code = fields.values().filter(|f| f.value.is_some()).count();
        if by_code > 0 {
            notes.push(format!("{by_code} fields matched by registry code"));
        }

        let missing_core = CashFlowField::ALL
            .iter()
            .any(|f| f.is_core_total() && fields[f.key()].value.is_none());
        if missing_core {
            let missing: Vec<CashFlowField> = CashFlowField::ALL
                .iter()
                .copied()
                .filter(|f| fields[f.key()].value.is_none())
                .collect();
            info!(
                "cash-flow code pass for {} left {} fields empty, invoking completion fallback",
                doc.doc_hash,
                missing.len()
            );

            let hints: Vec<(&'static str, &'static [&'static str])> =
                missing.iter().map(|f| (f.key(), f.hints())).collect();
            let contexts = self.field_contexts(doc, &hints).await?;
            let keys: Vec<&str> = missing.iter().map(|f| f.key()).collect();
            let extraction = self
                .extractor
                .extract(DocumentType::CashFlow, &keys, &contexts)
                .await?;

            for field in &missing {
                let key = field.key();
                let entry = match fields.get_mut(key) {
                    Some(entry) => entry,
                    None => continue,
                };
                match extraction.value(key) {
                    Some(value) => {
                        entry.value = Some(value);
                        entry.confidence = Some(
                            extraction
                                .confidence(key)
                                .unwrap_or(COMPLETION_DEFAULT_CONFIDENCE),
                        );
                        entry.evidence_pages = contexts
                            .get(key)
                            .map(|c| c.pages.clone())
                            .unwrap_or_default();
                    }
                    None => {
                        entry.confidence = extraction
                            .confidence(key)
                            .map(|c| c.min(ABSENT_CONFIDENCE_CAP));
                    }
                }
            }
            notes.push(format!(
                "completion fallback queried for: {}",
                keys.join(", ")
            ));
        }

        totals::apply_scale(&mut fields, header.scale_factor);

        let found = CashFlowField::ALL
            .iter()
            .filter(|f| f.is_core_total() && fields[f.key()].value.is_some())
            .count();
        debug!(
            "cash-flow pass for {}: {found}/4 core totals, {} markers",
            doc.doc_hash, vote.hits
        );

        Ok(ExtractionResult {
            doc_hash: doc.doc_hash.clone(),
            document_type: DocumentType::CashFlow,
            is_type: vote.looks_like || found >= 2,
            type_confidence: if found > 0 {
                (CORE_TOTAL_WEIGHT * found as f64).min(1.0)
            } else {
                vote.default_confidence()
            },
            fields,
            header,
            markers_hits: vote.hits,
            notes,
        })
    }

    /// Chunk the document, build a fresh retrieval index and assemble one
    /// context per hint row.
    async fn field_contexts(
        &self,
        doc: &DocumentText,
        hints: &[(&'static str, &'static [&'static str])],
    ) -> Result<BTreeMap<String, FieldContext>> {
        let chunks = doc.chunks();
        debug!(
            "indexing {} chunks for {} across {} field queries",
            chunks.len(),
            doc.doc_hash,
            hints.len()
        );
        let index = self.retriever.index(&doc.doc_hash, chunks).await?;
        retrieval::retrieve_context_by_field(index.as_ref(), hints, DEFAULT_TOP_K).await
    }
}

/// Turn a completion extraction into the persisted field map. Values keep
/// their contract confidence (defaulting to 0.6 when present but unstated);
/// fields without a value never exceed the 0.3 confidence ceiling. Retrieval
/// pages are attached as evidence whether or not a value came back, so
/// derived totals keep the pages their own hints matched.
fn collect_fields(
    keys: &[&str],
    extraction: &FieldExtraction,
    contexts: &BTreeMap<String, FieldContext>,
) -> BTreeMap<String, FieldValue> {
    keys.iter()
        .map(|key| {
            let value = extraction.value(key);
            let confidence = match (value, extraction.confidence(key)) {
                (Some(_), Some(c)) => Some(c),
                (Some(_), None) => Some(COMPLETION_DEFAULT_CONFIDENCE),
                (None, Some(c)) => Some(c.min(ABSENT_CONFIDENCE_CAP)),
                (None, None) => None,
            };
            let evidence_pages = contexts
                .get(*key)
                .map(|c| c.pages.clone())
                .unwrap_or_default();
            (
                key.to_string(),
                FieldValue {
                    value,
                    confidence,
                    evidence_pages,
                },
            )
        })
        .collect()
}
