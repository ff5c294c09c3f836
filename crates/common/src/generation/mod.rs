//! Generation service abstraction
//!
//! The language model is an external capability: given a prompt it returns
//! either a complete reply or a stream of generation events (reasoning
//! steps, answer tokens, completion). Two tiers exist: the full tier for
//! answers and lesson plans, and a lite tier used only for query
//! rewriting.
//!
//! The HTTP implementation targets OpenAI-compatible chat-completion
//! endpoints (Volcengine Ark with DeepSeek-R1 style reasoning deltas).

use crate::config::GenerationConfig;
use crate::errors::{AppError, Result};
use crate::stream::{sse_data, RecordFramer};
use crate::types::{Message, Role};
use async_trait::async_trait;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Model tier selector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelTier {
    /// Fast, small-capability model (query rewriting only)
    Lite,
    /// Primary model (answers and lesson plans)
    Full,
}

/// One event from an in-flight generation
#[derive(Debug, Clone, PartialEq)]
pub enum GenEvent {
    /// Reasoning-step text
    Reasoning(String),
    /// Answer text fragment
    Token(String),
    /// End of generation
    Done,
    /// Generation failed mid-stream
    Error(String),
}

/// A prompt for either tier
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub tier: ModelTier,
    pub system_prompt: Option<String>,
    pub history: Vec<Message>,
    pub user_prompt: String,
}

impl GenerationRequest {
    pub fn new(tier: ModelTier, user_prompt: impl Into<String>) -> Self {
        Self {
            tier,
            system_prompt: None,
            history: Vec::new(),
            user_prompt: user_prompt.into(),
        }
    }

    pub fn with_system(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(system_prompt.into());
        self
    }

    pub fn with_history(mut self, history: Vec<Message>) -> Self {
        self.history = history;
        self
    }
}

/// Trait for the generation capability
#[async_trait]
pub trait Generator: Send + Sync {
    /// Run a generation to completion and return the full reply text
    async fn complete(&self, request: GenerationRequest) -> Result<String>;

    /// Run a streaming generation; events arrive in emission order and the
    /// stream ends with exactly one `Done` or `Error`. Dropping the
    /// receiver aborts the generation.
    async fn generate(&self, request: GenerationRequest) -> Result<mpsc::Receiver<GenEvent>>;
}

// Wire types for OpenAI-compatible chat completions

#[derive(Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    stream: bool,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

#[derive(Deserialize)]
struct StreamChunk {
    choices: Vec<StreamChoice>,
}

#[derive(Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
    finish_reason: Option<String>,
}

#[derive(Deserialize, Default)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
    /// DeepSeek-R1 style reasoning channel
    #[serde(default)]
    reasoning_content: Option<String>,
}

/// HTTP generation client for OpenAI-compatible endpoints
pub struct ArkGenerator {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    lite_model: String,
}

impl ArkGenerator {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| AppError::Configuration {
                message: "generation.api_key is required".to_string(),
            })?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::Configuration {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            api_key,
            base_url: config.api_base.clone(),
            model: config.model.clone(),
            lite_model: config.lite_model.clone(),
        })
    }

    fn model_for(&self, tier: ModelTier) -> &str {
        match tier {
            ModelTier::Lite => &self.lite_model,
            ModelTier::Full => &self.model,
        }
    }

    fn build_messages(request: &GenerationRequest) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(request.history.len() + 2);
        if let Some(ref system) = request.system_prompt {
            messages.push(ChatMessage {
                role: "system",
                content: system.clone(),
            });
        }
        for message in &request.history {
            messages.push(ChatMessage {
                role: match message.role {
                    Role::User => "user",
                    Role::Assistant => "assistant",
                },
                content: message.content.clone(),
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: request.user_prompt.clone(),
        });
        messages
    }

    async fn send(&self, request: &GenerationRequest, stream: bool) -> Result<reqwest::Response> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = ChatRequest {
            model: self.model_for(request.tier).to_string(),
            messages: Self::build_messages(request),
            stream,
        };

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::GenerationError {
                message: format!("Request failed: {}", e),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::GenerationError {
                message: format!("API error {}: {}", status, body),
            });
        }

        Ok(response)
    }
}

#[async_trait]
impl Generator for ArkGenerator {
    async fn complete(&self, request: GenerationRequest) -> Result<String> {
        let response = self.send(&request, false).await?;

        let parsed: ChatResponse = response.json().await.map_err(|e| AppError::GenerationError {
            message: format!("Failed to parse response: {}", e),
        })?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| AppError::GenerationError {
                message: "Empty response from generation service".to_string(),
            })
    }

    async fn generate(&self, request: GenerationRequest) -> Result<mpsc::Receiver<GenEvent>> {
        let response = self.send(&request, true).await?;
        let (tx, rx) = mpsc::channel(32);

        tokio::spawn(async move {
            let mut bytes = response.bytes_stream();
            let mut framer = RecordFramer::new();
            let mut finished = false;

            while let Some(chunk) = bytes.next().await {
                let chunk = match chunk {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        let _ = tx.send(GenEvent::Error(e.to_string())).await;
                        return;
                    }
                };

                for record in framer.push(&chunk) {
                    let Some(payload) = sse_data(&record) else {
                        continue;
                    };
                    if payload.trim() == "[DONE]" {
                        let _ = tx.send(GenEvent::Done).await;
                        return;
                    }
                    let parsed: StreamChunk = match serde_json::from_str(&payload) {
                        Ok(parsed) => parsed,
                        Err(e) => {
                            tracing::warn!(error = %e, "Dropping malformed generation chunk");
                            continue;
                        }
                    };
                    for choice in parsed.choices {
                        if let Some(step) = choice.delta.reasoning_content {
                            if !step.is_empty()
                                && tx.send(GenEvent::Reasoning(step)).await.is_err()
                            {
                                return;
                            }
                        }
                        if let Some(token) = choice.delta.content {
                            if !token.is_empty() && tx.send(GenEvent::Token(token)).await.is_err() {
                                return;
                            }
                        }
                        if choice.finish_reason.is_some() {
                            finished = true;
                        }
                    }
                }
            }

            if finished {
                let _ = tx.send(GenEvent::Done).await;
            } else {
                let _ = tx
                    .send(GenEvent::Error(
                        "Generation stream ended unexpectedly".to_string(),
                    ))
                    .await;
            }
        });

        Ok(rx)
    }
}

/// Scriptable generator for tests and offline development
pub struct MockGenerator {
    completion: std::result::Result<String, String>,
    script: Vec<GenEvent>,
}

impl MockGenerator {
    /// Succeeds with the given reply; streaming emits it as one token
    pub fn replying(reply: impl Into<String>) -> Self {
        let reply = reply.into();
        Self {
            script: vec![GenEvent::Token(reply.clone()), GenEvent::Done],
            completion: Ok(reply),
        }
    }

    /// Fails every call with the given message
    pub fn failing(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            completion: Err(message.clone()),
            script: vec![GenEvent::Error(message)],
        }
    }

    /// Streams the given event script; `complete` returns the
    /// concatenated tokens
    pub fn scripted(script: Vec<GenEvent>) -> Self {
        let completion = script
            .iter()
            .filter_map(|e| match e {
                GenEvent::Token(t) => Some(t.as_str()),
                _ => None,
            })
            .collect::<String>();
        Self {
            completion: Ok(completion),
            script,
        }
    }
}

#[async_trait]
impl Generator for MockGenerator {
    async fn complete(&self, _request: GenerationRequest) -> Result<String> {
        self.completion
            .clone()
            .map_err(|message| AppError::GenerationError { message })
    }

    async fn generate(&self, _request: GenerationRequest) -> Result<mpsc::Receiver<GenEvent>> {
        let (tx, rx) = mpsc::channel(32);
        let script = self.script.clone();
        tokio::spawn(async move {
            for event in script {
                if tx.send(event).await.is_err() {
                    return;
                }
            }
        });
        Ok(rx)
    }
}

/// Create a generator from configuration.
///
/// Without an API key a mock with a canned reply is used, so the service
/// stays runnable for local development.
pub fn create_generator(config: &GenerationConfig) -> Result<Arc<dyn Generator>> {
    if config.api_key.is_some() {
        Ok(Arc::new(ArkGenerator::new(config)?))
    } else {
        tracing::warn!("generation.api_key not set, using mock generator");
        Ok(Arc::new(MockGenerator::replying(
            "（未配置生成服务，当前为模拟回复。）",
        )))
    }
}
