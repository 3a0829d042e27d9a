use crate::channel::InboundMessage;

/// Messages received in the current session, in arrival order.
///
/// Append-only and unbounded: nothing is deduplicated, reordered or evicted, and
/// the store lives exactly as long as its session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversationStore {
    messages: Vec<InboundMessage>,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, message: InboundMessage) {
        self.messages.push(message);
    }

    pub fn all(&self) -> &[InboundMessage] {
        &self.messages
    }

    pub fn iter(&self) -> impl Iterator<Item = &InboundMessage> {
        self.messages.iter()
    }

    pub fn last(&self) -> Option<&InboundMessage> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
