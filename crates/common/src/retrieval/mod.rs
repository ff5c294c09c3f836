//! Two-stage passage retrieval
//!
//! Stage 1 embeds the query and searches the passage index over small
//! child chunks. Stage 2 promotes each hit to its parent chunk for
//! delivery, collapsing duplicate parents to the first-seen (best) rank.
//! Returned order is the similarity-rank order of first occurrence.

use crate::embeddings::Embedder;
use crate::errors::Result;
use crate::index::PassageIndex;
use crate::metrics;
use crate::store::{DocumentStore, ParentChunk};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

/// A parent chunk with the score of its best child hit
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredParent {
    pub chunk: ParentChunk,
    pub score: f32,
}

/// Two-stage retriever over the passage index and document store
pub struct Retriever {
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn PassageIndex>,
    store: Arc<dyn DocumentStore>,
}

impl Retriever {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn PassageIndex>,
        store: Arc<dyn DocumentStore>,
    ) -> Self {
        Self {
            embedder,
            index,
            store,
        }
    }

    /// Retrieve up to `k` distinct parent chunks grounding `query`.
    ///
    /// Zero hits yield an empty list, not an error. A store lookup failure
    /// for one parent skips that hit and keeps going.
    pub async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<ScoredParent>> {
        let start = Instant::now();

        let embedding = self.embedder.embed(query).await?;
        let hits = self.index.search(&embedding, k).await?;

        if hits.is_empty() {
            tracing::info!(query = %query, "Retrieval found no child hits");
            metrics::record_retrieval(start.elapsed().as_secs_f64(), 0);
            return Ok(Vec::new());
        }

        let mut seen: HashSet<String> = HashSet::new();
        let mut parents = Vec::new();

        for hit in &hits {
            // First occurrence carries the best rank; later duplicates drop
            if !seen.insert(hit.parent_id.clone()) {
                continue;
            }
            match self.store.get(&hit.parent_id).await {
                Ok(chunk) => parents.push(ScoredParent {
                    chunk,
                    score: hit.score,
                }),
                Err(e) => {
                    tracing::warn!(
                        parent_id = %hit.parent_id,
                        error = %e,
                        "Skipping unresolvable parent chunk"
                    );
                }
            }
        }

        tracing::info!(
            query = %query,
            child_hits = hits.len(),
            parents = parents.len(),
            latency_ms = start.elapsed().as_millis() as u64,
            "Retrieval completed"
        );
        metrics::record_retrieval(start.elapsed().as_secs_f64(), parents.len());

        Ok(parents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::MockEmbedder;
    use crate::errors::AppError;
    use crate::index::ChildHit;
    use crate::store::InMemoryDocumentStore;
    use async_trait::async_trait;

    /// Index stub returning a scripted hit list
    struct StubIndex {
        hits: Vec<ChildHit>,
    }

    #[async_trait]
    impl PassageIndex for StubIndex {
        async fn search(&self, _embedding: &[f32], k: usize) -> Result<Vec<ChildHit>> {
            Ok(self.hits.iter().take(k).cloned().collect())
        }
    }

    fn hit(parent_id: &str, score: f32) -> ChildHit {
        ChildHit {
            parent_id: parent_id.into(),
            score,
            text: format!("child of {}", parent_id),
        }
    }

    fn parent(id: &str, source: &str) -> ParentChunk {
        ParentChunk {
            id: id.into(),
            text: format!("parent text {}", id),
            source: source.into(),
            page: None,
        }
    }

    async fn store_with(chunks: Vec<ParentChunk>) -> Arc<InMemoryDocumentStore> {
        let store = InMemoryDocumentStore::new();
        for chunk in chunks {
            store.insert(chunk).await;
        }
        Arc::new(store)
    }

    #[tokio::test]
    async fn test_dedup_preserves_first_seen_order() {
        let index = StubIndex {
            hits: vec![hit("P1", 0.9), hit("P2", 0.8), hit("P1", 0.7)],
        };
        let store = store_with(vec![parent("P1", "a.pdf"), parent("P2", "b.pdf")]).await;
        let retriever = Retriever::new(Arc::new(MockEmbedder::new(4)), Arc::new(index), store);

        let results = retriever.retrieve("五大发展理念", 5).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].chunk.id, "P1");
        assert_eq!(results[0].score, 0.9);
        assert_eq!(results[1].chunk.id, "P2");
    }

    #[tokio::test]
    async fn test_zero_hits_is_empty_not_error() {
        let index = StubIndex { hits: vec![] };
        let store = store_with(vec![]).await;
        let retriever = Retriever::new(Arc::new(MockEmbedder::new(4)), Arc::new(index), store);

        let results = retriever.retrieve("不存在的主题", 3).await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_store_lookup_failure_skips_hit() {
        let index = StubIndex {
            hits: vec![hit("P1", 0.9), hit("MISSING", 0.8), hit("P2", 0.7)],
        };
        let store = store_with(vec![parent("P1", "a.pdf"), parent("P2", "b.pdf")]).await;
        let retriever = Retriever::new(Arc::new(MockEmbedder::new(4)), Arc::new(index), store);

        let results = retriever.retrieve("q", 5).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].chunk.id, "P1");
        assert_eq!(results[1].chunk.id, "P2");
    }

    #[tokio::test]
    async fn test_never_more_parents_than_hits() {
        let index = StubIndex {
            hits: vec![hit("P1", 0.9), hit("P1", 0.8)],
        };
        let store = store_with(vec![parent("P1", "a.pdf")]).await;
        let retriever = Retriever::new(Arc::new(MockEmbedder::new(4)), Arc::new(index), store);

        let results = retriever.retrieve("q", 2).await.unwrap();
        assert_eq!(results.len(), 1);
    }

    #[tokio::test]
    async fn test_embedding_failure_propagates() {
        struct FailingEmbedder;

        #[async_trait]
        impl Embedder for FailingEmbedder {
            async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
                Err(AppError::EmbeddingError {
                    message: "down".into(),
                })
            }
            fn model_name(&self) -> &str {
                "failing"
            }
            fn dimension(&self) -> usize {
                0
            }
        }

        let index = StubIndex { hits: vec![] };
        let store = store_with(vec![]).await;
        let retriever = Retriever::new(Arc::new(FailingEmbedder), Arc::new(index), store);

        assert!(retriever.retrieve("q", 3).await.is_err());
    }
}
