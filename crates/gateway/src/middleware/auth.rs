//! Access-token middleware
//!
//! Guards the /api routes with the single configured access token. When no
//! token is configured the check is disabled, which is the expected local
//! development setup.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::AppState;
use lectern_common::{auth, errors::AppError};

/// Reject requests without a valid access token
pub async fn require_access_token(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let Some(ref expected) = state.config.auth.access_token else {
        return Ok(next.run(request).await);
    };

    let provided = auth::extract_token(request.headers(), &state.config.auth.token_header)
        .ok_or_else(|| AppError::Unauthorized {
            message: "Missing access token".to_string(),
        })?;

    if !auth::validate_token(expected, &provided) {
        return Err(AppError::InvalidAccessToken);
    }

    Ok(next.run(request).await)
}
