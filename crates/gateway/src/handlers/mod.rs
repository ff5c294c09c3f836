//! API handlers module

pub mod chat;
pub mod files;
pub mod health;
pub mod lesson;

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::Stream;
use lectern_common::stream::StreamEvent;
use tokio::sync::mpsc;
use tokio_stream::{wrappers::ReceiverStream, StreamExt};

/// Turn an orchestrator event channel into an SSE response.
///
/// Each event is one SSE record whose data line carries the tagged JSON
/// envelope. The stream closes after the terminal event.
pub fn sse_response(
    events: mpsc::Receiver<StreamEvent>,
) -> Sse<impl Stream<Item = Result<Event, std::convert::Infallible>>> {
    let stream = ReceiverStream::new(events).map(|event| {
        let data = serde_json::to_string(&event).unwrap_or_else(|e| {
            // A StreamEvent always serializes; keep the stream alive anyway
            tracing::error!(error = %e, "Failed to serialize stream event");
            r#"{"type":"error","data":"internal serialization error"}"#.to_string()
        });
        Ok(Event::default().data(data))
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}
