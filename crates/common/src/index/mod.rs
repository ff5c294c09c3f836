//! Passage index abstraction
//!
//! The index stores small child chunks with vector embeddings and answers
//! nearest-neighbour queries. It is read-only at query time and built by
//! an out-of-scope ingestion job. This module provides the trait, an HTTP
//! client for a Chroma-style REST index, and an in-memory index for tests
//! and offline development.

use crate::errors::{AppError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// One child-chunk hit, in descending-similarity order
#[derive(Debug, Clone, PartialEq)]
pub struct ChildHit {
    /// Id of the parent chunk this child was split from
    pub parent_id: String,

    /// Similarity score, higher is better
    pub score: f32,

    /// The child chunk text (used for logging and diagnostics only;
    /// generation always receives the parent text)
    pub text: String,
}

/// Trait for child-chunk similarity search
#[async_trait]
pub trait PassageIndex: Send + Sync {
    /// Return the top-k child chunks nearest to the query embedding.
    ///
    /// An empty index yields an empty list, not an error.
    async fn search(&self, embedding: &[f32], k: usize) -> Result<Vec<ChildHit>>;
}

/// HTTP client for a Chroma-style vector index
pub struct HttpPassageIndex {
    client: reqwest::Client,
    base_url: String,
    collection: String,
}

#[derive(Serialize)]
struct QueryRequest<'a> {
    query_embeddings: Vec<&'a [f32]>,
    n_results: usize,
    include: Vec<&'static str>,
}

#[derive(Deserialize)]
struct QueryResponse {
    documents: Vec<Vec<String>>,
    metadatas: Vec<Vec<ChunkMetadata>>,
    distances: Vec<Vec<f32>>,
}

#[derive(Deserialize)]
struct ChunkMetadata {
    parent_id: Option<String>,
}

impl HttpPassageIndex {
    pub fn new(base_url: String, collection: String, timeout_secs: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| AppError::Configuration {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            base_url,
            collection,
        })
    }
}

#[async_trait]
impl PassageIndex for HttpPassageIndex {
    async fn search(&self, embedding: &[f32], k: usize) -> Result<Vec<ChildHit>> {
        let url = format!(
            "{}/api/v1/collections/{}/query",
            self.base_url, self.collection
        );

        let request = QueryRequest {
            query_embeddings: vec![embedding],
            n_results: k,
            include: vec!["documents", "metadatas", "distances"],
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::IndexError {
                message: format!("Query request failed: {}", e),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::IndexError {
                message: format!("API error {}: {}", status, body),
            });
        }

        let result: QueryResponse = response.json().await.map_err(|e| AppError::IndexError {
            message: format!("Failed to parse response: {}", e),
        })?;

        let (documents, metadatas, distances) = match (
            result.documents.into_iter().next(),
            result.metadatas.into_iter().next(),
            result.distances.into_iter().next(),
        ) {
            (Some(d), Some(m), Some(s)) => (d, m, s),
            // No query row means no hits
            _ => return Ok(Vec::new()),
        };

        let hits = documents
            .into_iter()
            .zip(metadatas)
            .zip(distances)
            .filter_map(|((text, metadata), distance)| {
                let parent_id = metadata.parent_id?;
                Some(ChildHit {
                    parent_id,
                    // Chroma reports cosine distance; convert to similarity
                    score: 1.0 - distance,
                    text,
                })
            })
            .collect();

        Ok(hits)
    }
}

/// In-memory index for tests and offline development
#[derive(Default)]
pub struct InMemoryPassageIndex {
    chunks: Vec<(Vec<f32>, ChildHit)>,
}

impl InMemoryPassageIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one child chunk with its embedding
    pub fn add(&mut self, embedding: Vec<f32>, parent_id: impl Into<String>, text: impl Into<String>) {
        self.chunks.push((
            embedding,
            ChildHit {
                parent_id: parent_id.into(),
                score: 0.0,
                text: text.into(),
            },
        ));
    }

    fn cosine(a: &[f32], b: &[f32]) -> f32 {
        let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
        let na: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        let nb: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
        if na == 0.0 || nb == 0.0 {
            0.0
        } else {
            dot / (na * nb)
        }
    }
}

#[async_trait]
impl PassageIndex for InMemoryPassageIndex {
    async fn search(&self, embedding: &[f32], k: usize) -> Result<Vec<ChildHit>> {
        let mut scored: Vec<ChildHit> = self
            .chunks
            .iter()
            .map(|(e, hit)| ChildHit {
                score: Self::cosine(embedding, e),
                ..hit.clone()
            })
            .collect();
        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(k);
        Ok(scored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_empty_index_returns_empty() {
        let index = InMemoryPassageIndex::new();
        let hits = index.search(&[1.0, 0.0], 5).await.unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn test_top_k_by_similarity() {
        let mut index = InMemoryPassageIndex::new();
        index.add(vec![1.0, 0.0], "p1", "close");
        index.add(vec![0.0, 1.0], "p2", "far");
        index.add(vec![0.9, 0.1], "p3", "closer");

        let hits = index.search(&[1.0, 0.0], 2).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].parent_id, "p1");
        assert_eq!(hits[1].parent_id, "p3");
        assert!(hits[0].score >= hits[1].score);
    }
}
