// crates/analytics-engine/src/test_support.rs
//! An in-memory `ConversationSource` fake used only by this crate's own
//! unit tests. Never ships outside `#[cfg(test)]`.

use std::collections::HashMap;
use std::sync::Mutex;

use analytics_core::{ConversationSource, SourceError};
use analytics_types::{Conversation, Message};
use async_trait::async_trait;

#[derive(Default)]
pub struct InMemorySource {
    conversations: Mutex<HashMap<String, Conversation>>,
    messages: Mutex<HashMap<String, Vec<Message>>>,
}

impl InMemorySource {
    pub fn add_conversation(&mut self, conversation: Conversation, messages: Vec<Message>) {
        let id = conversation.id.clone();
        self.conversations.get_mut().unwrap_or_else(|e| e.into_inner()).insert(id.clone(), conversation);
        self.messages.get_mut().unwrap_or_else(|e| e.into_inner()).insert(id, messages);
    }
}

#[async_trait]
impl ConversationSource for InMemorySource {
    async fn get_conversation(&self, id: &str) -> Result<Option<Conversation>, SourceError> {
        Ok(self.conversations.lock().unwrap_or_else(|e| e.into_inner()).get(id).cloned())
    }

    async fn get_messages(&self, conversation_id: &str) -> Result<Vec<Message>, SourceError> {
        Ok(self.messages.lock().unwrap_or_else(|e| e.into_inner()).get(conversation_id).cloned().unwrap_or_default())
    }

    async fn conversations_updated_since(&self, since_ms: i64) -> Result<Vec<String>, SourceError> {
        Ok(self
            .conversations
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .filter(|c| c.updated_at >= since_ms)
            .map(|c| c.id.clone())
            .collect())
    }
}
