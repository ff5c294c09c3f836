//! Wire event model for the answer stream
//!
//! A request produces zero or more `Thought`/`Token` events followed by
//! exactly one terminal event (`Done` or `Error`). Non-terminal events are
//! append-only fragments and must be applied in emission order.

use crate::types::Citation;
use serde::{Deserialize, Serialize};

/// One record on the outbound event stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum StreamEvent {
    /// A reasoning step emitted before or between answer tokens
    Thought(String),

    /// An answer text fragment
    Token(String),

    /// Terminal event: generation finished, citations attached
    Done(DonePayload),

    /// Terminal event: the request failed with a human-readable cause
    Error(String),
}

/// Payload of the `done` event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DonePayload {
    /// Deduplicated citations in retrieval rank order
    pub sources: Vec<Citation>,
}

impl StreamEvent {
    /// Whether this event terminates the stream
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::Done(_) | StreamEvent::Error(_))
    }

    pub fn done(sources: Vec<Citation>) -> Self {
        StreamEvent::Done(DonePayload { sources })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_token_event() {
        let json = r#"{"type": "token", "data": "高质量"}"#;
        let event: StreamEvent = serde_json::from_str(json).unwrap();
        assert!(matches!(event, StreamEvent::Token(s) if s == "高质量"));
    }

    #[test]
    fn test_parse_thought_event() {
        let json = r#"{"type": "thought", "data": "先检索相关段落..."}"#;
        let event: StreamEvent = serde_json::from_str(json).unwrap();
        assert!(matches!(event, StreamEvent::Thought(_)));
        assert!(!event.is_terminal());
    }

    #[test]
    fn test_parse_done_event() {
        let json = r#"{"type": "done", "data": {"sources": [{"source": "a.pdf", "page": 2}]}}"#;
        let event: StreamEvent = serde_json::from_str(json).unwrap();
        match event {
            StreamEvent::Done(payload) => {
                assert_eq!(payload.sources.len(), 1);
                assert_eq!(payload.sources[0].source, "a.pdf");
                assert_eq!(payload.sources[0].page, Some(2));
            }
            _ => panic!("Expected Done event"),
        }
    }

    #[test]
    fn test_roundtrip_error_event() {
        let event = StreamEvent::Error("generation service unavailable".into());
        let json = serde_json::to_string(&event).unwrap();
        let parsed: StreamEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(event, parsed);
        assert!(parsed.is_terminal());
    }
}
