//! Context management
//!
//! Prepares a raw user query for retrieval and generation: windows the
//! conversation history and, for context-dependent queries, rewrites the
//! query into a standalone form using the lite model tier. The rewrite is
//! strictly best-effort: on timeout, error, or an unusable result the raw
//! query is used verbatim and the request continues.

mod detect;
mod window;

pub use detect::{ContextDependence, HeuristicDetector};
pub use window::window;

use crate::generation::{GenerationRequest, Generator, ModelTier};
use crate::metrics;
use crate::types::Message;
use std::sync::Arc;
use std::time::Duration;

const REWRITE_SYSTEM_PROMPT: &str = "你是一个查询改写助手。根据对话历史，将用户的最新问题改写为一个独立、完整、无需上下文即可理解的问题。只输出改写后的问题本身，不要输出任何解释或标点以外的内容。";

/// A query and history ready for retrieval and generation
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedContext {
    /// The retrieval/generation query (rewritten or verbatim)
    pub query: String,

    /// Windowed conversation history
    pub history: Vec<Message>,
}

/// Windows history and resolves context-dependent queries
pub struct ContextManager {
    generator: Arc<dyn Generator>,
    detector: Box<dyn ContextDependence>,
    max_turns: usize,
    rewrite_timeout: Duration,
}

impl ContextManager {
    pub fn new(generator: Arc<dyn Generator>, max_turns: usize, rewrite_timeout: Duration) -> Self {
        Self {
            generator,
            detector: Box::new(HeuristicDetector::new()),
            max_turns,
            rewrite_timeout,
        }
    }

    pub fn with_detector(mut self, detector: Box<dyn ContextDependence>) -> Self {
        self.detector = detector;
        self
    }

    /// Window the history and resolve the query.
    ///
    /// Never fails: any rewrite problem falls back to the raw query.
    pub async fn prepare(&self, raw_query: &str, history: &[Message]) -> PreparedContext {
        let history = window(history, self.max_turns);

        if !self
            .detector
            .is_context_dependent(raw_query, history.len())
        {
            return PreparedContext {
                query: raw_query.to_string(),
                history,
            };
        }

        let query = match self.rewrite(raw_query, &history).await {
            Some(rewritten) => {
                tracing::info!(raw = %raw_query, rewritten = %rewritten, "Query rewritten");
                metrics::record_rewrite(false);
                rewritten
            }
            None => {
                metrics::record_rewrite(true);
                raw_query.to_string()
            }
        };

        PreparedContext { query, history }
    }

    /// One lite-tier rewrite attempt under a short timeout
    async fn rewrite(&self, raw_query: &str, history: &[Message]) -> Option<String> {
        let request = GenerationRequest::new(ModelTier::Lite, raw_query)
            .with_system(REWRITE_SYSTEM_PROMPT)
            .with_history(history.to_vec());

        let result = tokio::time::timeout(self.rewrite_timeout, self.generator.complete(request))
            .await;

        match result {
            Ok(Ok(rewritten)) => {
                let rewritten = rewritten.trim();
                if rewritten.is_empty() {
                    tracing::warn!(raw = %raw_query, "Empty rewrite, using raw query");
                    None
                } else {
                    Some(rewritten.to_string())
                }
            }
            Ok(Err(e)) => {
                tracing::warn!(raw = %raw_query, error = %e, "Rewrite failed, using raw query");
                None
            }
            Err(_) => {
                tracing::warn!(
                    raw = %raw_query,
                    timeout_ms = self.rewrite_timeout.as_millis() as u64,
                    "Rewrite timed out, using raw query"
                );
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::MockGenerator;

    fn history() -> Vec<Message> {
        vec![
            Message::user("介绍一下新质生产力"),
            Message::assistant("新质生产力是创新起主导作用的先进生产力质态……"),
        ]
    }

    #[tokio::test]
    async fn test_standalone_query_passes_verbatim() {
        let manager = ContextManager::new(
            Arc::new(MockGenerator::replying("不应被调用")),
            5,
            Duration::from_secs(5),
        );

        let prepared = manager
            .prepare("请系统阐述中国式现代化的基本特征", &history())
            .await;
        assert_eq!(prepared.query, "请系统阐述中国式现代化的基本特征");
        assert_eq!(prepared.history.len(), 2);
    }

    #[tokio::test]
    async fn test_dependent_query_rewritten() {
        let manager = ContextManager::new(
            Arc::new(MockGenerator::replying("新质生产力现在发展得怎么样？")),
            5,
            Duration::from_secs(5),
        );

        let prepared = manager.prepare("它现在发展得怎么样？", &history()).await;
        assert_eq!(prepared.query, "新质生产力现在发展得怎么样？");
    }

    #[tokio::test]
    async fn test_rewrite_failure_falls_back_to_raw() {
        let manager = ContextManager::new(
            Arc::new(MockGenerator::failing("lite tier down")),
            5,
            Duration::from_secs(5),
        );

        let prepared = manager.prepare("它现在发展得怎么样？", &history()).await;
        assert_eq!(prepared.query, "它现在发展得怎么样？");
    }

    #[tokio::test]
    async fn test_empty_rewrite_falls_back_to_raw() {
        let manager = ContextManager::new(
            Arc::new(MockGenerator::replying("   ")),
            5,
            Duration::from_secs(5),
        );

        let prepared = manager.prepare("它现在发展得怎么样？", &history()).await;
        assert_eq!(prepared.query, "它现在发展得怎么样？");
    }

    #[tokio::test]
    async fn test_no_rewrite_without_history() {
        let manager = ContextManager::new(
            Arc::new(MockGenerator::replying("不应被调用")),
            5,
            Duration::from_secs(5),
        );

        let prepared = manager.prepare("它是什么？", &[]).await;
        assert_eq!(prepared.query, "它是什么？");
        assert!(prepared.history.is_empty());
    }

    #[tokio::test]
    async fn test_history_windowed_before_rewrite() {
        let mut long_history = Vec::new();
        for i in 0..8 {
            long_history.push(Message::user(format!("问题{}", i)));
            long_history.push(Message::assistant(format!("回答{}", i)));
        }

        let manager = ContextManager::new(
            Arc::new(MockGenerator::replying("改写结果")),
            5,
            Duration::from_secs(5),
        );

        let prepared = manager.prepare("完全独立且足够长的标准问题", &long_history).await;
        assert_eq!(prepared.history.len(), 10);
        assert_eq!(prepared.history[0].content, "问题3");
    }
}
