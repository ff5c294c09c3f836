//! Incremental turn reconstruction from stream events
//!
//! A pure, order-dependent reducer: each event moves the in-progress
//! assistant turn to its next state. The reducer applies events exactly as
//! received; emission order is the producer's contract and is not repaired
//! here.

use super::event::StreamEvent;
use crate::types::Turn;

/// Apply one stream event to the in-progress turn.
///
/// - `Thought` appends one reasoning step
/// - `Token` appends to the answer text
/// - `Done` replaces the citation list and finalizes the turn
/// - `Error` appends an error notice and finalizes the turn as failed
pub fn apply(turn: &mut Turn, event: StreamEvent) {
    match event {
        StreamEvent::Thought(step) => {
            turn.reasoning_steps.push(step);
        }
        StreamEvent::Token(fragment) => {
            turn.content.push_str(&fragment);
        }
        StreamEvent::Done(payload) => {
            turn.sources = payload.sources;
            turn.finalized = true;
        }
        StreamEvent::Error(cause) => {
            if !turn.content.is_empty() {
                turn.content.push_str("\n\n");
            }
            turn.content.push_str(&format!("[错误] {}", cause));
            turn.finalized = true;
            turn.failed = true;
        }
    }
}
