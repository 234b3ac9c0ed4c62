//! OpenAI-compatible capability implementations: chat completions behind
//! [`CompletionModel`] and a batch-embedding retriever with in-memory cosine
//! ranking behind [`Retriever`]. Transport and response-shape failures map to
//! [`ExtractionError::CapabilityUnavailable`]; the pipeline never retries.

use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use serde_json::{json, Value};

use crate::document::Chunk;
use crate::error::{ExtractionError, Result};
use crate::llm::CompletionModel;
use crate::retrieval::{ChunkIndex, Fragment, Retriever};

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_COMPLETION_MODEL: &str = "gpt-4o-mini";
const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";

#[derive(Clone)]
pub struct OpenAiClient {
    client: Client,
    api_key: String,
    base_url: String,
    completion_model: String,
    embedding_model: String,
}

impl OpenAiClient {
    pub fn new(api_key: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
            base_url: OPENAI_BASE_URL.to_string(),
            completion_model: DEFAULT_COMPLETION_MODEL.to_string(),
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
        }
    }

    /// Point the client at an OpenAI-compatible server (proxy, local model).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_completion_model(mut self, model: impl Into<String>) -> Self {
        self.completion_model = model.into();
        self
    }

    pub fn with_embedding_model(mut self, model: impl Into<String>) -> Self {
        self.embedding_model = model.into();
        self
    }

    async fn post(&self, path: &str, payload: Value) -> Result<Value> {
        let url = format!("{}{}", self.base_url, path);
        let res = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| ExtractionError::CapabilityUnavailable(e.to_string()))?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(ExtractionError::CapabilityUnavailable(format!(
                "{path} returned status {status}: {body}"
            )));
        }
        res.json()
            .await
            .map_err(|e| ExtractionError::CapabilityUnavailable(e.to_string()))
    }

    /// Embed a batch of texts in one call, preserving input order.
    pub async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>> {
        let body = self
            .post(
                "/embeddings",
                json!({ "model": self.embedding_model, "input": inputs }),
            )
            .await?;
        let data = body
            .get("data")
            .and_then(|d| d.as_array())
            .ok_or_else(|| {
                ExtractionError::CapabilityUnavailable(
                    "embeddings response missing data array".to_string(),
                )
            })?;
        let mut out = vec![Vec::new(); inputs.len()];
        for item in data {
            let index = item.get("index").and_then(|i| i.as_u64()).unwrap_or(0) as usize;
            let embedding: Vec<f32> = item
                .get("embedding")
                .and_then(|e| e.as_array())
                .map(|values| {
                    values
                        .iter()
                        .filter_map(|v| v.as_f64())
                        .map(|v| v as f32)
                        .collect()
                })
                .unwrap_or_default();
            if index < out.len() {
                out[index] = embedding;
            }
        }
        Ok(out)
    }
}

#[async_trait]
impl CompletionModel for OpenAiClient {
    async fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String> {
        debug!(
            "completion call to {} ({} prompt chars)",
            self.completion_model,
            user_prompt.len()
        );
        let body = self
            .post(
                "/chat/completions",
                json!({
                    "model": self.completion_model,
                    "temperature": 0,
                    "response_format": { "type": "json_object" },
                    "messages": [
                        { "role": "system", "content": system_prompt },
                        { "role": "user", "content": user_prompt },
                    ],
                }),
            )
            .await?;
        body.pointer("/choices/0/message/content")
            .and_then(|c| c.as_str())
            .map(|s| s.to_string())
            .ok_or_else(|| {
                ExtractionError::CapabilityUnavailable(
                    "completion response carried no message content".to_string(),
                )
            })
    }
}

/// Retriever embedding every chunk in one batch at index time and ranking
/// queries by cosine similarity in memory. One index per document; nothing
/// survives the request.
pub struct EmbeddingRetriever {
    client: OpenAiClient,
}

impl EmbeddingRetriever {
    pub fn new(client: OpenAiClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Retriever for EmbeddingRetriever {
    async fn index(&self, doc_hash: &str, chunks: Vec<Chunk>) -> Result<Box<dyn ChunkIndex>> {
        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let embeddings = if texts.is_empty() {
            Vec::new()
        } else {
            self.client.embed(&texts).await?
        };
        debug!("indexed {} chunks for {doc_hash}", chunks.len());
        Ok(Box::new(EmbeddedIndex {
            client: self.client.clone(),
            chunks,
            embeddings,
        }))
    }
}

struct EmbeddedIndex {
    client: OpenAiClient,
    chunks: Vec<Chunk>,
    embeddings: Vec<Vec<f32>>,
}

#[async_trait]
impl ChunkIndex for EmbeddedIndex {
    async fn query(&self, query: &str, top_k: usize) -> Result<Vec<Fragment>> {
        if self.chunks.is_empty() {
            return Ok(Vec::new());
        }
        let query_embedding = self
            .client
            .embed(std::slice::from_ref(&query.to_string()))
            .await?
            .into_iter()
            .next()
            .unwrap_or_default();
        Ok(rank_by_similarity(
            &self.chunks,
            &self.embeddings,
            &query_embedding,
            top_k,
        ))
    }
}

fn rank_by_similarity(
    chunks: &[Chunk],
    embeddings: &[Vec<f32>],
    query: &[f32],
    top_k: usize,
) -> Vec<Fragment> {
    let mut scored: Vec<(f32, &Chunk)> = chunks
        .iter()
        .zip(embeddings)
        .map(|(chunk, embedding)| (cosine_similarity(embedding, query), chunk))
        .collect();
    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
    scored
        .into_iter()
        .take(top_k)
        .map(|(_, chunk)| Fragment {
            text: chunk.text.clone(),
            page: chunk.page,
        })
        .collect()
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() || a.len() != b.len() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 2.0]), 0.0);
    }

    #[test]
    fn test_rank_by_similarity_orders_and_truncates() {
        let chunks = vec![
            Chunk {
                text: "far".to_string(),
                page: 1,
            },
            Chunk {
                text: "near".to_string(),
                page: 2,
            },
            Chunk {
                text: "middle".to_string(),
                page: 3,
            },
        ];
        let embeddings = vec![vec![0.0, 1.0], vec![1.0, 0.0], vec![0.7, 0.7]];
        let ranked = rank_by_similarity(&chunks, &embeddings, &[1.0, 0.0], 2);
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].text, "near");
        assert_eq!(ranked[1].text, "middle");
    }
}
