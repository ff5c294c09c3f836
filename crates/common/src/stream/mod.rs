//! Streaming protocol and client-side state reconstruction
//!
//! Provides:
//! - The wire event model (`StreamEvent`)
//! - A buffered record framer for blank-line-delimited transports
//! - An async event-stream consumer
//! - The pure reducer that rebuilds a structured turn from events
//! - Per-mode client state with strict isolation between conversations

mod client;
mod event;
mod framer;
mod merge;
mod state;

pub use client::EventStreamClient;
pub use event::{DonePayload, StreamEvent};
pub use framer::{sse_data, RecordFramer};
pub use merge::apply;
pub use state::{ClientState, Conversation, Mode};
