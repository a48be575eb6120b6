//! Conversation memory: an ordered, append-only message log (§4.D).

use crate::message::Message;

/// An ordered, append-only log of [`Message`]s.
///
/// Append is O(1). `snapshot` returns an immutable view of the current log.
/// If a system instruction is present, it is always at index 0 and is never
/// evicted by any retention strategy built on top of this type.
#[derive(Debug, Default, Clone)]
pub struct ConversationMemory {
    messages: Vec<Message>,
}

impl ConversationMemory {
    /// Builds an empty memory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a message to the end of the log.
    pub fn append(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Returns an immutable view of the log, in append order.
    #[must_use]
    pub fn snapshot(&self) -> &[Message] {
        &self.messages
    }

    /// Clears every message. If the first message was a system instruction,
    /// callers that want to retain it must re-append it themselves; `clear`
    /// itself honors no exceptions.
    pub fn clear(&mut self) {
        self.messages.clear();
    }

    /// Number of messages currently held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Returns `true` if the log holds no messages.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// A cheap approximation of the token cost of the current log, at
    /// roughly four characters per token. Callers needing an exact count
    /// should use the model client's `count_tokens` instead (§4.C).
    #[must_use]
    pub fn approx_token_count(&self) -> usize {
        let chars: usize = self
            .messages
            .iter()
            .filter_map(Message::text_content)
            .map(|text| text.chars().count())
            .sum();
        chars.div_ceil(4)
    }

    /// Whether a system instruction is present at index 0.
    #[must_use]
    pub fn has_system_prompt(&self) -> bool {
        matches!(self.messages.first(), Some(Message::System { .. }))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn append_is_observable_in_snapshot() {
        let mut memory = ConversationMemory::new();
        memory.append(Message::user("hi"));
        assert_eq!(memory.len(), 1);
        assert_eq!(memory.snapshot().len(), 1);
    }

    #[test]
    fn clear_empties_the_log() {
        let mut memory = ConversationMemory::new();
        memory.append(Message::user("hi"));
        memory.clear();
        assert!(memory.is_empty());
    }

    #[test]
    fn approx_token_count_grows_with_content() {
        let mut memory = ConversationMemory::new();
        assert_eq!(memory.approx_token_count(), 0);
        memory.append(Message::user("a".repeat(40)));
        assert_eq!(memory.approx_token_count(), 10);
    }

    #[test]
    fn detects_system_prompt_at_index_zero() {
        let mut memory = ConversationMemory::new();
        assert!(!memory.has_system_prompt());
        memory.append(Message::system("be helpful"));
        memory.append(Message::user("hi"));
        assert!(memory.has_system_prompt());
    }
}
