//! Parent-chunk document store abstraction
//!
//! Large context units (~2000 chars) keyed by id, each carrying its source
//! document name. Read-only at query time; populated by the out-of-scope
//! ingestion job. The file-backed store keeps one JSON record per parent
//! id, matching the layout the ingestion job writes.

use crate::errors::{AppError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;

/// A large context unit delivered to the generator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParentChunk {
    pub id: String,

    /// Full chunk text (~2000 chars)
    pub text: String,

    /// Source document identifier (filename)
    pub source: String,

    /// Page within the source, when the ingestion job recorded it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
}

/// Trait for parent-chunk lookup
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fetch one parent chunk by id
    async fn get(&self, id: &str) -> Result<ParentChunk>;

    /// Check the store is reachable (readiness probe)
    async fn ping(&self) -> Result<()>;
}

/// On-disk record layout, one file per parent id
#[derive(Serialize, Deserialize)]
struct StoredRecord {
    page_content: String,
    #[serde(default)]
    metadata: StoredMetadata,
}

#[derive(Default, Serialize, Deserialize)]
struct StoredMetadata {
    #[serde(default)]
    source: Option<String>,
    #[serde(default)]
    page: Option<u32>,
}

/// File-backed document store: `{directory}/{id}.json`
pub struct FileDocumentStore {
    directory: PathBuf,
}

impl FileDocumentStore {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    fn path_for(&self, id: &str) -> Result<PathBuf> {
        // Parent ids are UUIDs written by the ingestion job; refuse
        // anything that could escape the store directory.
        if id.contains('/') || id.contains('\\') || id.contains("..") {
            return Err(AppError::InvalidFormat {
                message: format!("Invalid parent chunk id: {}", id),
            });
        }
        Ok(self.directory.join(format!("{}.json", id)))
    }
}

#[async_trait]
impl DocumentStore for FileDocumentStore {
    async fn get(&self, id: &str) -> Result<ParentChunk> {
        let path = self.path_for(id)?;
        let raw = tokio::fs::read(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                AppError::ParentChunkNotFound { id: id.to_string() }
            } else {
                AppError::StoreError {
                    message: format!("Failed to read {}: {}", path.display(), e),
                }
            }
        })?;

        let record: StoredRecord =
            serde_json::from_slice(&raw).map_err(|e| AppError::StoreError {
                message: format!("Corrupt record {}: {}", path.display(), e),
            })?;

        Ok(ParentChunk {
            id: id.to_string(),
            text: record.page_content,
            source: record
                .metadata
                .source
                .unwrap_or_else(|| "Unknown".to_string()),
            page: record.metadata.page,
        })
    }

    async fn ping(&self) -> Result<()> {
        tokio::fs::metadata(&self.directory)
            .await
            .map_err(|e| AppError::StoreError {
                message: format!(
                    "Store directory {} unavailable: {}",
                    self.directory.display(),
                    e
                ),
            })?;
        Ok(())
    }
}

/// In-memory document store for tests and offline development
#[derive(Default)]
pub struct InMemoryDocumentStore {
    chunks: Arc<RwLock<HashMap<String, ParentChunk>>>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, chunk: ParentChunk) {
        self.chunks.write().await.insert(chunk.id.clone(), chunk);
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn get(&self, id: &str) -> Result<ParentChunk> {
        self.chunks
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| AppError::ParentChunkNotFound { id: id.to_string() })
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}
