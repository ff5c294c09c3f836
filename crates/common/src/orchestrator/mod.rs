//! Session orchestration
//!
//! Runs one request through the full pipeline: context preparation,
//! two-stage retrieval, prompt assembly, and generation, relayed to the
//! caller as a stream of events. The stream carries zero or more
//! non-terminal events followed by exactly one terminal (done or error);
//! a dropped receiver aborts the request.

mod prompt;

pub use prompt::{
    chat_user_prompt, context_preview, context_text, lesson_user_prompt, Grade,
    CHAT_SYSTEM_PROMPT, LESSON_SYSTEM_PROMPT,
};

use crate::config::RetrievalConfig;
use crate::context::ContextManager;
use crate::errors::Result;
use crate::generation::{GenEvent, GenerationRequest, Generator, ModelTier};
use crate::metrics;
use crate::retrieval::{Retriever, ScoredParent};
use crate::stream::StreamEvent;
use crate::types::{Citation, Message};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;

/// One incoming request, either mode
#[derive(Debug, Clone)]
pub enum RequestMode {
    Chat {
        message: String,
        history: Vec<Message>,
    },
    Lesson {
        topic: String,
        grade: Grade,
    },
}

impl RequestMode {
    fn label(&self) -> &'static str {
        match self {
            RequestMode::Chat { .. } => "chat",
            RequestMode::Lesson { .. } => "lesson",
        }
    }
}

/// Result of the non-streaming pipeline
#[derive(Debug, Clone)]
pub struct CompletedResponse {
    pub reply: String,
    pub sources: Vec<Citation>,
    pub context_used: String,
}

/// A request resolved up to the point of generation
struct PreparedRequest {
    request: GenerationRequest,
    citations: Vec<Citation>,
    context: String,
}

/// Drives the request pipeline and owns its collaborators
pub struct Orchestrator {
    context_manager: ContextManager,
    retriever: Retriever,
    generator: Arc<dyn Generator>,
    retrieval: RetrievalConfig,
}

impl Orchestrator {
    pub fn new(
        context_manager: ContextManager,
        retriever: Retriever,
        generator: Arc<dyn Generator>,
        retrieval: RetrievalConfig,
    ) -> Self {
        Self {
            context_manager,
            retriever,
            generator,
            retrieval,
        }
    }

    /// Citations for the retrieved parents, deduplicated by (source, page)
    /// keeping retrieval order
    fn citations(parents: &[ScoredParent]) -> Vec<Citation> {
        let mut citations: Vec<Citation> = Vec::new();
        for parent in parents {
            let already = citations
                .iter()
                .any(|c| c.source == parent.chunk.source && c.page == parent.chunk.page);
            if !already {
                citations.push(Citation {
                    source: parent.chunk.source.clone(),
                    page: parent.chunk.page,
                    section_grade: None,
                });
            }
        }
        citations
    }

    /// Resolve context, run retrieval, and assemble the generation request
    async fn prepare(&self, mode: &RequestMode) -> Result<PreparedRequest> {
        match mode {
            RequestMode::Chat { message, history } => {
                let prepared = self.context_manager.prepare(message, history).await;
                tracing::debug!(query = %prepared.query, "Context prepared");

                let parents = self
                    .retriever
                    .retrieve(&prepared.query, self.retrieval.chat_top_k)
                    .await?;
                let context = context_text(&parents);

                let request =
                    GenerationRequest::new(ModelTier::Full, chat_user_prompt(&prepared.query, &context))
                        .with_system(CHAT_SYSTEM_PROMPT)
                        .with_history(prepared.history);

                Ok(PreparedRequest {
                    request,
                    citations: Self::citations(&parents),
                    context,
                })
            }
            RequestMode::Lesson { topic, grade } => {
                // Grade-qualified query steers retrieval toward passages
                // tagged for that学段
                let query = format!("{} {}", grade, topic);
                let parents = self
                    .retriever
                    .retrieve(&query, self.retrieval.lesson_top_k)
                    .await?;
                let context = context_text(&parents);

                let request = GenerationRequest::new(
                    ModelTier::Full,
                    lesson_user_prompt(topic, *grade, &context),
                )
                .with_system(LESSON_SYSTEM_PROMPT);

                Ok(PreparedRequest {
                    request,
                    citations: Self::citations(&parents),
                    context,
                })
            }
        }
    }

    /// Run one streaming request.
    ///
    /// The returned receiver yields events in emission order and always
    /// ends with exactly one terminal event, unless the receiver itself is
    /// dropped first.
    pub fn handle(self: Arc<Self>, mode: RequestMode) -> mpsc::Receiver<StreamEvent> {
        let (tx, rx) = mpsc::channel(32);

        tokio::spawn(async move {
            let start = Instant::now();
            let label = mode.label();
            tracing::info!(mode = label, "Request received");

            let prepared = match self.prepare(&mode).await {
                Ok(prepared) => prepared,
                Err(e) => {
                    tracing::error!(mode = label, error = %e, "Request failed before generation");
                    let _ = tx.send(StreamEvent::Error(e.to_string())).await;
                    metrics::record_request(label, "failed", start.elapsed().as_secs_f64());
                    return;
                }
            };

            let generation_start = Instant::now();
            let mut events = match self.generator.generate(prepared.request).await {
                Ok(events) => events,
                Err(e) => {
                    tracing::error!(mode = label, error = %e, "Failed to start generation");
                    let _ = tx.send(StreamEvent::Error(e.to_string())).await;
                    metrics::record_request(label, "failed", start.elapsed().as_secs_f64());
                    return;
                }
            };
            tracing::debug!(mode = label, "Generating");

            while let Some(event) = events.recv().await {
                let outgoing = match event {
                    GenEvent::Reasoning(step) => StreamEvent::Thought(step),
                    GenEvent::Token(token) => StreamEvent::Token(token),
                    GenEvent::Done => {
                        metrics::record_generation("full", generation_start.elapsed().as_secs_f64());
                        let _ = tx.send(StreamEvent::done(prepared.citations)).await;
                        tracing::info!(
                            mode = label,
                            latency_ms = start.elapsed().as_millis() as u64,
                            "Request completed"
                        );
                        metrics::record_request(label, "completed", start.elapsed().as_secs_f64());
                        return;
                    }
                    GenEvent::Error(cause) => {
                        tracing::error!(mode = label, error = %cause, "Generation failed");
                        let _ = tx.send(StreamEvent::Error(cause)).await;
                        metrics::record_request(label, "failed", start.elapsed().as_secs_f64());
                        return;
                    }
                };
                if tx.send(outgoing).await.is_err() {
                    // Client went away; stop the pipeline
                    tracing::debug!(mode = label, "Client disconnected, aborting request");
                    metrics::record_request(label, "aborted", start.elapsed().as_secs_f64());
                    return;
                }
            }

            // Generator channel closed without a terminal event
            tracing::error!(mode = label, "Generation ended without completion");
            let _ = tx
                .send(StreamEvent::Error(
                    "Generation ended unexpectedly".to_string(),
                ))
                .await;
            metrics::record_request(label, "failed", start.elapsed().as_secs_f64());
        });

        rx
    }

    /// Run one request to completion without streaming
    pub async fn complete(&self, mode: RequestMode) -> Result<CompletedResponse> {
        let start = Instant::now();
        let label = mode.label();
        tracing::info!(mode = label, "Request received");

        let prepared = self.prepare(&mode).await.inspect_err(|_| {
            metrics::record_request(label, "failed", start.elapsed().as_secs_f64());
        })?;

        let generation_start = Instant::now();
        let reply = self
            .generator
            .complete(prepared.request)
            .await
            .inspect_err(|e| {
                tracing::error!(mode = label, error = %e, "Generation failed");
                metrics::record_request(label, "failed", start.elapsed().as_secs_f64());
            })?;
        metrics::record_generation("full", generation_start.elapsed().as_secs_f64());

        tracing::info!(
            mode = label,
            latency_ms = start.elapsed().as_millis() as u64,
            "Request completed"
        );
        metrics::record_request(label, "completed", start.elapsed().as_secs_f64());

        Ok(CompletedResponse {
            reply,
            sources: prepared.citations,
            context_used: context_preview(&prepared.context),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::MockEmbedder;
    use crate::generation::MockGenerator;
    use crate::index::{ChildHit, PassageIndex};
    use crate::store::{InMemoryDocumentStore, ParentChunk};
    use async_trait::async_trait;
    use std::time::Duration;

    struct StubIndex {
        hits: Vec<ChildHit>,
    }

    #[async_trait]
    impl PassageIndex for StubIndex {
        async fn search(&self, _embedding: &[f32], k: usize) -> Result<Vec<ChildHit>> {
            Ok(self.hits.iter().take(k).cloned().collect())
        }
    }

    async fn orchestrator(
        generator: MockGenerator,
        hits: Vec<ChildHit>,
        chunks: Vec<ParentChunk>,
    ) -> Arc<Orchestrator> {
        let generator: Arc<dyn Generator> = Arc::new(generator);
        let store = InMemoryDocumentStore::new();
        for chunk in chunks {
            store.insert(chunk).await;
        }
        let retriever = Retriever::new(
            Arc::new(MockEmbedder::new(4)),
            Arc::new(StubIndex { hits }),
            Arc::new(store),
        );
        let context_manager =
            ContextManager::new(generator.clone(), 5, Duration::from_secs(5));
        Arc::new(Orchestrator::new(
            context_manager,
            retriever,
            generator,
            RetrievalConfig::default(),
        ))
    }

    fn hit(parent_id: &str) -> ChildHit {
        ChildHit {
            parent_id: parent_id.into(),
            score: 0.9,
            text: "child".into(),
        }
    }

    fn chunk(id: &str, source: &str, page: Option<u32>) -> ParentChunk {
        ParentChunk {
            id: id.into(),
            text: format!("parent {}", id),
            source: source.into(),
            page,
        }
    }

    async fn collect(mut rx: mpsc::Receiver<StreamEvent>) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn test_stream_relays_events_then_done_with_sources() {
        let generator = MockGenerator::scripted(vec![
            GenEvent::Reasoning("先梳理概念".into()),
            GenEvent::Token("高质量".into()),
            GenEvent::Token("发展".into()),
            GenEvent::Done,
        ]);
        let orchestrator = orchestrator(
            generator,
            vec![hit("P1"), hit("P2")],
            vec![
                chunk("P1", "教材.pdf", Some(12)),
                chunk("P2", "讲义.pdf", None),
            ],
        )
        .await;

        let events = collect(orchestrator.handle(RequestMode::Chat {
            message: "请系统阐述高质量发展的内涵".into(),
            history: vec![],
        }))
        .await;

        assert_eq!(events.len(), 4);
        assert_eq!(events[0], StreamEvent::Thought("先梳理概念".into()));
        assert_eq!(events[1], StreamEvent::Token("高质量".into()));
        assert_eq!(events[2], StreamEvent::Token("发展".into()));
        match &events[3] {
            StreamEvent::Done(payload) => {
                assert_eq!(payload.sources.len(), 2);
                assert_eq!(payload.sources[0].source, "教材.pdf");
                assert_eq!(payload.sources[0].page, Some(12));
                assert_eq!(payload.sources[1].source, "讲义.pdf");
            }
            other => panic!("expected done, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_exactly_one_terminal_event() {
        let generator = MockGenerator::scripted(vec![GenEvent::Token("答".into()), GenEvent::Done]);
        let orchestrator = orchestrator(generator, vec![], vec![]).await;

        let events = collect(orchestrator.handle(RequestMode::Chat {
            message: "请系统阐述共同富裕的理论基础".into(),
            history: vec![],
        }))
        .await;

        let terminals = events.iter().filter(|e| e.is_terminal()).count();
        assert_eq!(terminals, 1);
        assert!(events.last().is_some_and(StreamEvent::is_terminal));
    }

    #[tokio::test]
    async fn test_empty_index_yields_done_with_no_sources() {
        let generator = MockGenerator::replying("基于常识的回答");
        let orchestrator = orchestrator(generator, vec![], vec![]).await;

        let events = collect(orchestrator.handle(RequestMode::Chat {
            message: "请介绍一个索引中不存在的主题".into(),
            history: vec![],
        }))
        .await;

        match events.last() {
            Some(StreamEvent::Done(payload)) => assert!(payload.sources.is_empty()),
            other => panic!("expected done, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_generation_error_is_single_error_terminal() {
        let generator = MockGenerator::failing("上游服务不可用");
        let orchestrator = orchestrator(generator, vec![], vec![]).await;

        let events = collect(orchestrator.handle(RequestMode::Chat {
            message: "请系统阐述全过程人民民主的制度安排".into(),
            history: vec![],
        }))
        .await;

        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], StreamEvent::Error(_)));
    }

    #[tokio::test]
    async fn test_duplicate_source_page_collapsed_in_citations() {
        let generator = MockGenerator::replying("答");
        let orchestrator = orchestrator(
            generator,
            vec![hit("P1"), hit("P2"), hit("P3")],
            vec![
                chunk("P1", "教材.pdf", Some(3)),
                chunk("P2", "教材.pdf", Some(3)),
                chunk("P3", "教材.pdf", Some(7)),
            ],
        )
        .await;

        let events = collect(orchestrator.handle(RequestMode::Lesson {
            topic: "伟大建党精神".into(),
            grade: Grade::HighSchool,
        }))
        .await;

        match events.last() {
            Some(StreamEvent::Done(payload)) => {
                assert_eq!(payload.sources.len(), 2);
                assert_eq!(payload.sources[0].page, Some(3));
                assert_eq!(payload.sources[1].page, Some(7));
            }
            other => panic!("expected done, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_complete_returns_reply_and_context_preview() {
        let generator = MockGenerator::replying("完整回答");
        let orchestrator = orchestrator(
            generator,
            vec![hit("P1")],
            vec![chunk("P1", "教材.pdf", Some(1))],
        )
        .await;

        let response = orchestrator
            .complete(RequestMode::Chat {
                message: "请系统阐述高质量发展的内涵".into(),
                history: vec![],
            })
            .await
            .unwrap();

        assert_eq!(response.reply, "完整回答");
        assert_eq!(response.sources.len(), 1);
        assert!(response.context_used.contains("教材.pdf"));
    }
}
