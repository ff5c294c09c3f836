//! Chat handlers

use axum::{extract::State, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::AppState;
use lectern_common::{
    errors::{AppError, Result},
    orchestrator::RequestMode,
    types::{Citation, Message},
};

/// Chat request, shared by the streaming and sync endpoints
#[derive(Debug, Deserialize, Validate)]
pub struct ChatRequest {
    #[validate(length(min = 1, max = 2000))]
    pub message: String,

    /// Prior turns, oldest first; windowing happens server-side
    #[serde(default)]
    pub history: Vec<Message>,
}

/// Non-streaming chat response
#[derive(Serialize)]
pub struct ChatResponse {
    pub reply: String,
    pub sources: Vec<Citation>,
    pub context_used: String,
}

/// Stream a chat answer as server-sent events
pub async fn stream(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<impl IntoResponse> {
    request.validate().map_err(|e| AppError::Validation {
        message: e.to_string(),
        field: None,
    })?;

    let events = state.orchestrator.clone().handle(RequestMode::Chat {
        message: request.message,
        history: request.history,
    });

    Ok(super::sse_response(events))
}

/// Answer a chat message without streaming
pub async fn send(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>> {
    request.validate().map_err(|e| AppError::Validation {
        message: e.to_string(),
        field: None,
    })?;

    let response = state
        .orchestrator
        .complete(RequestMode::Chat {
            message: request.message,
            history: request.history,
        })
        .await?;

    Ok(Json(ChatResponse {
        reply: response.reply,
        sources: response.sources,
        context_used: response.context_used,
    }))
}
