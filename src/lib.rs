//! # Statement Extractor
//!
//! A library for pulling a small set of numeric line items out of noisy
//! financial-statement page text (SCVS balance sheets, income statements,
//! cash-flow statements) and scoring a fixed set of credit KPIs over them.
//!
//! ## Core Concepts
//!
//! - **Page text**: externally extracted text per physical page; this crate
//!   never touches raw PDFs or images.
//! - **Code-indexed extraction**: cash-flow line items carry stable registry
//!   codes (`9501`, `9505`, ...) and are matched deterministically, last
//!   printed occurrence winning.
//! - **Retrieval + completion extraction**: balance and income fields have
//!   no stable codes; per-field context is retrieved through an injected
//!   [`retrieval::Retriever`] and resolved by one schema-bound call to an
//!   injected [`llm::CompletionModel`].
//! - **Reconciliation**: missing balance totals are derived from their
//!   current/non-current components, then the header scale factor ("en
//!   miles") is applied exactly once.
//! - **Confidence discipline**: an absent value never carries a confident
//!   score, and values are never invented.
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use statement_extractor::*;
//!
//! let client = OpenAiClient::new(api_key);
//! let extractor = StatementExtractor::new(
//!     Arc::new(EmbeddingRetriever::new(client.clone())),
//!     Arc::new(client),
//! );
//!
//! let doc = DocumentText::from_bytes(&pdf_bytes, pages)?;
//! let result = extractor.extract(DocumentType::CashFlow, &doc).await?;
//!
//! let store = ArtifactStore::new("artifacts");
//! store.save(&StatementArtifact::from_result(&result))?;
//! ```

pub mod classify;
pub mod codes;
pub mod document;
pub mod error;
pub mod header;
pub mod kpi;
pub mod llm;
pub mod numeral;
pub mod pipeline;
pub mod retrieval;
pub mod schema;
pub mod storage;
pub mod totals;

pub use classify::{classify, MarkerVote};
pub use codes::{CodeIndex, CodeIndexEntry};
pub use document::{content_hash, Chunk, DocumentText, PageText};
pub use error::{ExtractionError, Result};
pub use header::HeaderMeta;
pub use kpi::{score_fields, KpiReport, KpiVal};
pub use llm::{CompletionModel, FieldExtraction, FieldExtractor};
pub use pipeline::StatementExtractor;
pub use retrieval::{ChunkIndex, Fragment, Retriever};
pub use schema::*;
pub use storage::{ArtifactStore, StatementArtifact};

#[cfg(feature = "openai")]
pub use llm::{EmbeddingRetriever, OpenAiClient};

use std::sync::Arc;

/// One-shot convenience: run the pass for `document_type` over `doc` with
/// freshly supplied capability handles.
pub async fn extract_statement(
    retriever: Arc<dyn Retriever>,
    model: Arc<dyn CompletionModel>,
    document_type: DocumentType,
    doc: &DocumentText,
) -> Result<ExtractionResult> {
    StatementExtractor::new(retriever, model)
        .extract(document_type, doc)
        .await
}
