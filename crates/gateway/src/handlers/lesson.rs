//! Lesson plan handlers

use axum::{extract::State, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::AppState;
use lectern_common::{
    errors::{AppError, Result},
    orchestrator::{Grade, RequestMode},
    types::Citation,
};

/// Lesson plan request, shared by the streaming and sync endpoints
#[derive(Debug, Deserialize, Validate)]
pub struct LessonRequest {
    #[validate(length(min = 1, max = 200))]
    pub topic: String,

    /// Target学段; defaults to 通用
    #[serde(default)]
    pub grade: Grade,
}

/// Non-streaming lesson response
#[derive(Serialize)]
pub struct LessonResponse {
    pub lesson_plan: String,
    pub sources: Vec<Citation>,
}

impl LessonRequest {
    fn into_mode(self) -> RequestMode {
        RequestMode::Lesson {
            topic: self.topic,
            grade: self.grade,
        }
    }
}

/// Stream a lesson plan as server-sent events
pub async fn stream(
    State(state): State<AppState>,
    Json(request): Json<LessonRequest>,
) -> Result<impl IntoResponse> {
    request.validate().map_err(|e| AppError::Validation {
        message: e.to_string(),
        field: None,
    })?;

    let events = state.orchestrator.clone().handle(request.into_mode());

    Ok(super::sse_response(events))
}

/// Generate a lesson plan without streaming
pub async fn generate(
    State(state): State<AppState>,
    Json(request): Json<LessonRequest>,
) -> Result<Json<LessonResponse>> {
    request.validate().map_err(|e| AppError::Validation {
        message: e.to_string(),
        field: None,
    })?;

    let response = state.orchestrator.complete(request.into_mode()).await?;

    Ok(Json(LessonResponse {
        lesson_plan: response.reply,
        sources: response.sources,
    }))
}
