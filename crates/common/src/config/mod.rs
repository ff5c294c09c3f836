//! Configuration management for Lectern services
//!
//! Supports loading configuration from:
//! - Environment variables (prefixed with APP__)
//! - Configuration files (config.toml, config.yaml)
//! - Default values

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Authentication configuration
    #[serde(default)]
    pub auth: AuthConfig,

    /// Generation service configuration
    #[serde(default)]
    pub generation: GenerationConfig,

    /// Embedding service configuration
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Passage index configuration
    #[serde(default)]
    pub index: IndexConfig,

    /// Document store configuration
    #[serde(default)]
    pub store: StoreConfig,

    /// Retrieval configuration
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// Conversation history configuration
    #[serde(default)]
    pub history: HistoryConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Shutdown timeout in seconds
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AuthConfig {
    /// Opaque access token required on /api routes; unset disables the check
    pub access_token: Option<String>,

    /// Access token header name (fallback to Authorization: Bearer)
    #[serde(default = "default_token_header")]
    pub token_header: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GenerationConfig {
    /// API key for the generation service
    pub api_key: Option<String>,

    /// OpenAI-compatible API base URL
    #[serde(default = "default_generation_base")]
    pub api_base: String,

    /// Full-tier model used for answers and lesson plans
    #[serde(default = "default_full_model")]
    pub model: String,

    /// Lite-tier model used only for query rewriting
    #[serde(default = "default_lite_model")]
    pub lite_model: String,

    /// Request timeout for full-tier calls in seconds
    #[serde(default = "default_generation_timeout")]
    pub timeout_secs: u64,

    /// Timeout for the lite rewrite call in seconds (fail-open on expiry)
    #[serde(default = "default_rewrite_timeout")]
    pub rewrite_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EmbeddingConfig {
    /// Embedding provider: http, mock
    #[serde(default = "default_embedding_provider")]
    pub provider: String,

    /// API key for the embedding service
    pub api_key: Option<String>,

    /// API base URL
    pub api_base: Option<String>,

    /// Model to use
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Embedding dimension
    #[serde(default = "default_embedding_dimension")]
    pub dimension: usize,

    /// Request timeout in seconds
    #[serde(default = "default_embedding_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IndexConfig {
    /// Passage index base URL
    #[serde(default = "default_index_url")]
    pub url: String,

    /// Collection holding the child chunks
    #[serde(default = "default_collection")]
    pub collection: String,

    /// Request timeout in seconds
    #[serde(default = "default_index_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StoreConfig {
    /// Directory holding parent chunk records (one JSON file per id)
    #[serde(default = "default_store_dir")]
    pub directory: String,

    /// Directory holding the original source documents for click-through
    #[serde(default = "default_source_dir")]
    pub source_directory: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetrievalConfig {
    /// Top-k child chunks for chat requests
    #[serde(default = "default_chat_top_k")]
    pub chat_top_k: usize,

    /// Top-k child chunks for lesson requests
    #[serde(default = "default_lesson_top_k")]
    pub lesson_top_k: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HistoryConfig {
    /// Maximum user+assistant turn pairs kept in the window
    #[serde(default = "default_max_turns")]
    pub max_turns: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level (debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default = "default_json_logging")]
    pub json_logging: bool,

    /// Metrics port (0 to disable)
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,

    /// Service name for tracing
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

// Default value functions
fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 5000 }
fn default_shutdown_timeout() -> u64 { 30 }
fn default_token_header() -> String { "X-Access-Token".to_string() }
fn default_generation_base() -> String { "https://ark.cn-beijing.volces.com/api/v3".to_string() }
fn default_full_model() -> String { "deepseek-r1-250528".to_string() }
fn default_lite_model() -> String { "doubao-lite-32k".to_string() }
fn default_generation_timeout() -> u64 { 300 }
fn default_rewrite_timeout() -> u64 { 5 }
fn default_embedding_provider() -> String { "http".to_string() }
fn default_embedding_model() -> String { crate::DEFAULT_EMBEDDING_MODEL.to_string() }
fn default_embedding_dimension() -> usize { crate::DEFAULT_EMBEDDING_DIMENSION }
fn default_embedding_timeout() -> u64 { 30 }
fn default_index_url() -> String { "http://127.0.0.1:8000".to_string() }
fn default_collection() -> String { "split_parents".to_string() }
fn default_index_timeout() -> u64 { 10 }
fn default_store_dir() -> String { "doc_store".to_string() }
fn default_source_dir() -> String { "source_docs".to_string() }
fn default_chat_top_k() -> usize { 3 }
fn default_lesson_top_k() -> usize { 5 }
fn default_max_turns() -> usize { 5 }
fn default_log_level() -> String { "info".to_string() }
fn default_json_logging() -> bool { true }
fn default_metrics_port() -> u16 { 9090 }
fn default_service_name() -> String { "lectern".to_string() }

impl AppConfig {
    /// Load configuration from environment and files
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            // Start with defaults
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 5000)?
            // Load base config file
            .add_source(File::with_name("config/default").required(false))
            // Load environment-specific config
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            // Load local overrides
            .add_source(File::with_name("config/local").required(false))
            // Load from environment variables with APP__ prefix
            // e.g., APP__GENERATION__LITE_MODEL=doubao-lite-4k
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Load from a specific TOML file
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name(path))
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Get shutdown timeout as Duration
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.server.shutdown_timeout_secs)
    }

    /// Get the rewrite timeout as Duration
    pub fn rewrite_timeout(&self) -> Duration {
        Duration::from_secs(self.generation.rewrite_timeout_secs)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            shutdown_timeout_secs: default_shutdown_timeout(),
        }
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_base: default_generation_base(),
            model: default_full_model(),
            lite_model: default_lite_model(),
            timeout_secs: default_generation_timeout(),
            rewrite_timeout_secs: default_rewrite_timeout(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            api_key: None,
            api_base: None,
            model: default_embedding_model(),
            dimension: default_embedding_dimension(),
            timeout_secs: default_embedding_timeout(),
        }
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            url: default_index_url(),
            collection: default_collection(),
            timeout_secs: default_index_timeout(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            directory: default_store_dir(),
            source_directory: default_source_dir(),
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            chat_top_k: default_chat_top_k(),
            lesson_top_k: default_lesson_top_k(),
        }
    }
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_turns: default_max_turns(),
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logging: default_json_logging(),
            metrics_port: default_metrics_port(),
            service_name: default_service_name(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            auth: AuthConfig::default(),
            generation: GenerationConfig::default(),
            embedding: EmbeddingConfig::default(),
            index: IndexConfig::default(),
            store: StoreConfig::default(),
            retrieval: RetrievalConfig::default(),
            history: HistoryConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 5000);
        assert_eq!(config.embedding.model, "shibing624/text2vec-base-chinese");
        assert_eq!(config.retrieval.chat_top_k, 3);
        assert_eq!(config.retrieval.lesson_top_k, 5);
        assert_eq!(config.history.max_turns, 5);
    }

    #[test]
    fn test_rewrite_timeout_is_short() {
        let config = AppConfig::default();
        assert!(config.rewrite_timeout() < Duration::from_secs(config.generation.timeout_secs));
    }
}
