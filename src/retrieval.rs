//! Per-field context retrieval. A document is chunked once and indexed
//! through an injected [`Retriever`]; each field then fires a single query
//! built from its hint phrases, and the top fragments become the completion
//! context for that field.

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;

use crate::document::Chunk;
use crate::error::Result;
use crate::schema::FieldSet;

/// Fragments fetched per field query.
pub const DEFAULT_TOP_K: usize = 5;

/// One chunk returned from an index query, with the page it was cut from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    pub text: String,
    pub page: u32,
}

/// Queryable index over one document's chunks.
#[async_trait]
pub trait ChunkIndex: Send + Sync {
    /// Return up to `top_k` fragments relevant to `query`, best first.
    async fn query(&self, query: &str, top_k: usize) -> Result<Vec<Fragment>>;
}

/// Capability that turns a document's chunks into a queryable index. The
/// pipeline holds one retriever and builds a fresh index per document.
#[async_trait]
pub trait Retriever: Send + Sync {
    async fn index(&self, doc_hash: &str, chunks: Vec<Chunk>) -> Result<Box<dyn ChunkIndex>>;
}

/// Context assembled for one field: fragment texts joined by blank lines,
/// plus the pages the fragments were cut from. Evidence pages in the final
/// result come from here.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldContext {
    pub context: String,
    pub pages: BTreeSet<u32>,
}

/// Hint rows for a field set, in artifact order.
pub fn hint_table<F: FieldSet>() -> Vec<(&'static str, &'static [&'static str])> {
    F::ALL.iter().map(|f| (f.key(), f.hints())).collect()
}

/// Run one query per field (hint phrases joined with `" | "`) and assemble a
/// context per wire key. Every requested key gets an entry, even when no
/// fragment matched.
pub async fn retrieve_context_by_field(
    index: &dyn ChunkIndex,
    hints: &[(&'static str, &'static [&'static str])],
    top_k: usize,
) -> Result<BTreeMap<String, FieldContext>> {
    let mut out = BTreeMap::new();
    for (key, field_hints) in hints {
        let query = field_hints.join(" | ");
        let fragments = index.query(&query, top_k).await?;
        let pages = fragments.iter().map(|f| f.page).collect();
        let context = fragments
            .iter()
            .map(|f| f.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");
        out.insert(key.to_string(), FieldContext { context, pages });
    }
    Ok(out)
}
