//! Per-mode client conversation state
//!
//! Chat and lesson conversations are fully independent: separate turn
//! lists, input buffers, and in-flight flags. An event is applied only to
//! the conversation of the mode whose request produced it, so switching
//! the active mode mid-stream cannot leak events across conversations.

use super::event::StreamEvent;
use super::merge;
use crate::types::Turn;

/// Conversation mode tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    Chat,
    Lesson,
}

/// One mode's conversation: committed turns plus UI-adjacent state
#[derive(Debug, Default, Clone)]
pub struct Conversation {
    pub turns: Vec<Turn>,
    pub input: String,
    pub loading: bool,
}

impl Conversation {
    /// The in-progress assistant turn, if a request is in flight
    pub fn draft(&self) -> Option<&Turn> {
        self.turns.last().filter(|t| !t.finalized)
    }
}

/// Client-side state for both conversation modes
#[derive(Debug, Default, Clone)]
pub struct ClientState {
    chat: Conversation,
    lesson: Conversation,
}

impl ClientState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn conversation(&self, mode: Mode) -> &Conversation {
        match mode {
            Mode::Chat => &self.chat,
            Mode::Lesson => &self.lesson,
        }
    }

    fn conversation_mut(&mut self, mode: Mode) -> &mut Conversation {
        match mode {
            Mode::Chat => &mut self.chat,
            Mode::Lesson => &mut self.lesson,
        }
    }

    /// Commit the user's message and open an assistant draft for the
    /// incoming stream.
    pub fn begin_request(&mut self, mode: Mode, user_text: impl Into<String>) {
        let conv = self.conversation_mut(mode);
        conv.turns.push(Turn::user(user_text));
        conv.turns.push(Turn::assistant_draft());
        conv.input.clear();
        conv.loading = true;
    }

    /// Apply one stream event to the draft of the given mode.
    ///
    /// Events arriving after the draft finalized (e.g. after a client
    /// abort) are dropped; committed turns are never mutated.
    pub fn apply_event(&mut self, mode: Mode, event: StreamEvent) {
        let terminal = event.is_terminal();
        let conv = self.conversation_mut(mode);
        match conv.turns.last_mut().filter(|t| !t.finalized) {
            Some(draft) => merge::apply(draft, event),
            None => {
                tracing::warn!(?mode, "Dropping stream event with no open draft");
                return;
            }
        }
        if terminal {
            conv.loading = false;
        }
    }

    /// Abort the in-flight request of one mode: the draft keeps whatever
    /// streamed in and is finalized as failed.
    pub fn abort(&mut self, mode: Mode, reason: &str) {
        if self.conversation(mode).loading {
            self.apply_event(mode, StreamEvent::Error(reason.to_string()));
        }
    }
}
