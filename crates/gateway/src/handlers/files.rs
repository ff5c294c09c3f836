//! Source document click-through
//!
//! Serves the original documents that citations point at, straight from
//! the configured source directory.

use axum::{
    extract::{Path, State},
    http::header,
    response::IntoResponse,
};
use std::path::PathBuf;

use crate::AppState;
use lectern_common::errors::{AppError, Result};

/// Content type by file extension; anything unknown downloads as a blob
fn content_type(filename: &str) -> &'static str {
    match filename.rsplit('.').next() {
        Some("pdf") => "application/pdf",
        Some("txt") => "text/plain; charset=utf-8",
        Some("md") => "text/markdown; charset=utf-8",
        Some("docx") => {
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
        }
        Some("pptx") => {
            "application/vnd.openxmlformats-officedocument.presentationml.presentation"
        }
        _ => "application/octet-stream",
    }
}

/// Serve one source document by filename
pub async fn source(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<impl IntoResponse> {
    // Citations carry bare filenames; anything path-like is hostile
    if filename.contains('/') || filename.contains('\\') || filename.contains("..") {
        return Err(AppError::InvalidFormat {
            message: format!("Invalid source filename: {}", filename),
        });
    }

    let path = PathBuf::from(&state.config.store.source_directory).join(&filename);

    let bytes = tokio::fs::read(&path).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            AppError::SourceNotFound {
                name: filename.clone(),
            }
        } else {
            AppError::Internal {
                message: format!("Failed to read {}: {}", path.display(), e),
            }
        }
    })?;

    tracing::info!(filename = %filename, size = bytes.len(), "Serving source document");

    Ok((
        [
            (header::CONTENT_TYPE, content_type(&filename).to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("inline; filename=\"{}\"", filename),
            ),
        ],
        bytes,
    ))
}
