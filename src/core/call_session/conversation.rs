//! Append-only conversation transcript shared by a session and its reply task.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::core::llm::ChatMessage;

struct ConversationInner {
    messages: Vec<ChatMessage>,
    /// Only the reply with this generation may append
    active_generation: u64,
}

/// Ordered, role-tagged message log for one call.
///
/// Entries are never removed or rewritten. Reply tasks append through
/// [`Conversation::append`], which rejects writes from any generation but
/// the active one, so a cancelled reply that is still winding down cannot
/// leave stale text in the transcript.
#[derive(Clone)]
pub struct Conversation {
    inner: Arc<Mutex<ConversationInner>>,
}

impl Conversation {
    pub fn new(initial: Vec<ChatMessage>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(ConversationInner {
                messages: initial,
                active_generation: 0,
            })),
        }
    }

    /// Hand the write permission to `generation`.
    pub fn activate(&self, generation: u64) {
        self.inner.lock().active_generation = generation;
    }

    /// Append on behalf of `generation`; returns false if it is stale.
    pub fn append(&self, generation: u64, message: ChatMessage) -> bool {
        let mut inner = self.inner.lock();
        if inner.active_generation != generation {
            debug!(
                generation,
                active = inner.active_generation,
                "Rejected transcript append from stale reply"
            );
            return false;
        }
        inner.messages.push(message);
        true
    }

    pub fn snapshot(&self) -> Vec<ChatMessage> {
        self.inner.lock().messages.clone()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::llm::Role;

    #[test]
    fn test_append_from_active_generation() {
        let conversation = Conversation::new(vec![ChatMessage::system("prompt")]);
        conversation.activate(1);
        assert!(conversation.append(1, ChatMessage::user("hello")));

        let messages = conversation.snapshot();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].role, Role::User);
    }

    #[test]
    fn test_stale_generation_is_rejected() {
        let conversation = Conversation::new(Vec::new());
        conversation.activate(1);
        assert!(conversation.append(1, ChatMessage::user("first")));

        conversation.activate(2);
        assert!(!conversation.append(1, ChatMessage::assistant("late")));
        assert!(conversation.append(2, ChatMessage::user("second")));

        let texts: Vec<_> = conversation
            .snapshot()
            .into_iter()
            .map(|m| m.content)
            .collect();
        assert_eq!(texts, vec!["first", "second"]);
    }

    #[test]
    fn test_clones_share_state() {
        let conversation = Conversation::new(Vec::new());
        let other = conversation.clone();
        other.activate(1);
        assert!(other.append(1, ChatMessage::user("shared")));
        assert_eq!(conversation.len(), 1);
    }
}
