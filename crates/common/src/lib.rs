//! Lectern Common Library
//!
//! Shared code for the Lectern teaching-assistant backend including:
//! - Conversation data model (turns, citations, stream events)
//! - Context manager (history windowing + query rewriting)
//! - Two-stage passage retriever (child-chunk search, parent-chunk delivery)
//! - Generation service client (lite and full tiers)
//! - Session orchestrator (request pipeline -> event stream)
//! - Stream framing, client, and state merger
//! - Configuration, errors, auth, and metrics

pub mod auth;
pub mod config;
pub mod context;
pub mod embeddings;
pub mod errors;
pub mod generation;
pub mod index;
pub mod metrics;
pub mod orchestrator;
pub mod retrieval;
pub mod store;
pub mod stream;
pub mod types;

// Re-export commonly used types
pub use config::AppConfig;
pub use errors::{AppError, Result};
pub use orchestrator::Orchestrator;
pub use stream::StreamEvent;
pub use types::{Citation, Role, Turn};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default embedding model
pub const DEFAULT_EMBEDDING_MODEL: &str = "shibing624/text2vec-base-chinese";

/// Default embedding dimension
pub const DEFAULT_EMBEDDING_DIMENSION: usize = 768;

/// Approximate child chunk size used by the out-of-scope ingestion job.
/// Kept here so retrieval-side code and tests share one reference value.
pub const CHILD_CHUNK_CHARS: usize = 400;

/// Approximate parent chunk size used by the out-of-scope ingestion job.
pub const PARENT_CHUNK_CHARS: usize = 2000;
