//! Conversation history windowing
//!
//! The generator only ever sees the most recent turns. The window holds at
//! most `max_turns` user+assistant pairs and never splits a pair: if the
//! cut would leave a dangling assistant reply at the front, that reply is
//! dropped too.

use crate::types::{Message, Role};

/// Truncate `history` to the trailing window of at most `max_turns` pairs
pub fn window(history: &[Message], max_turns: usize) -> Vec<Message> {
    if max_turns == 0 {
        return Vec::new();
    }

    let max_messages = max_turns * 2;
    let mut start = history.len().saturating_sub(max_messages);

    // An assistant message at the cut belongs to an evicted user message
    if history
        .get(start)
        .is_some_and(|m| m.role == Role::Assistant)
    {
        start += 1;
    }

    history[start..].to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(n: usize) -> Vec<Message> {
        let mut history = Vec::new();
        for i in 0..n {
            history.push(Message::user(format!("问题{}", i)));
            history.push(Message::assistant(format!("回答{}", i)));
        }
        history
    }

    #[test]
    fn test_short_history_untouched() {
        let history = pairs(3);
        assert_eq!(window(&history, 5), history);
    }

    #[test]
    fn test_oldest_pairs_evicted_first() {
        let history = pairs(7);
        let windowed = window(&history, 5);
        assert_eq!(windowed.len(), 10);
        assert_eq!(windowed[0].content, "问题2");
        assert_eq!(windowed[9].content, "回答6");
    }

    #[test]
    fn test_never_starts_with_assistant() {
        // Odd-length history: user message without a reply yet at the end
        let mut history = pairs(5);
        history.push(Message::user("最新问题"));

        let windowed = window(&history, 5);
        assert_eq!(windowed[0].role, Role::User);
        // Dropping the dangling assistant reply leaves 9 messages
        assert_eq!(windowed.len(), 9);
        assert_eq!(windowed[0].content, "问题1");
    }

    #[test]
    fn test_zero_turns_empty() {
        assert!(window(&pairs(3), 0).is_empty());
    }
}
