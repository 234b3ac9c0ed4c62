//! Schema-bound extraction round against an injected completion model.

use std::collections::BTreeMap;
use std::sync::Arc;

use log::debug;

use crate::error::Result;
use crate::llm::prompts;
use crate::llm::types::FieldExtraction;
use crate::llm::CompletionModel;
use crate::retrieval::FieldContext;
use crate::schema::{BalanceContract, CashFlowContract, DocumentType, IncomeContract};

/// Runs one completion per document and parses the answer into the
/// normalized intermediate. Holds nothing but the model handle, so the same
/// extractor serves every statement type.
pub struct FieldExtractor {
    model: Arc<dyn CompletionModel>,
}

impl FieldExtractor {
    pub fn new(model: Arc<dyn CompletionModel>) -> Self {
        Self { model }
    }

    /// One extraction round: the type's system prompt plus a user prompt
    /// carrying one context block per key and the contract schema.
    pub async fn extract(
        &self,
        document_type: DocumentType,
        keys: &[&str],
        contexts: &BTreeMap<String, FieldContext>,
    ) -> Result<FieldExtraction> {
        let schema = match document_type {
            DocumentType::Balance => BalanceContract::schema_as_json()?,
            DocumentType::Income => IncomeContract::schema_as_json()?,
            DocumentType::CashFlow => CashFlowContract::schema_as_json()?,
        };
        let system = prompts::system_prompt(document_type);
        let user = prompts::field_extraction_prompt(keys, contexts, &schema);

        debug!(
            "requesting {document_type:?} extraction over {} fields",
            keys.len()
        );
        let answer = self.model.complete(system, &user).await?;
        FieldExtraction::from_completion(&answer)
    }
}
