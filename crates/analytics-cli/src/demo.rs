// crates/analytics-cli/src/demo.rs
//! A small fixed corpus standing in for a real message store, so the CLI
//! can exercise the engine end to end without an embedding server.

use std::collections::HashMap;

use analytics_core::{ConversationSource, SourceError};
use analytics_types::{AttributeBag, Conversation, Message, MessageRole};
use async_trait::async_trait;

pub struct DemoSource {
    conversations: HashMap<String, Conversation>,
    messages: HashMap<String, Vec<Message>>,
}

impl Default for DemoSource {
    fn default() -> Self {
        let mut source = Self { conversations: HashMap::new(), messages: HashMap::new() };
        source.seed();
        source
    }
}

impl DemoSource {
    pub fn ids(&self) -> Vec<String> {
        self.conversations.keys().cloned().collect()
    }

    fn push(&mut self, id: &str, updated_at: i64, messages: Vec<(MessageRole, &str, i64)>) {
        self.conversations.insert(
            id.to_string(),
            Conversation { id: id.to_string(), created_at: 0, updated_at, title: None, attributes: AttributeBag::new() },
        );
        let rows = messages
            .into_iter()
            .enumerate()
            .map(|(i, (role, content, created_at))| Message {
                id: format!("{id}-{i}"),
                conversation_id: id.to_string(),
                role,
                content: content.to_string(),
                created_at,
            })
            .collect();
        self.messages.insert(id.to_string(), rows);
    }

    fn seed(&mut self) {
        self.push(
            "deploy-pipeline",
            3_600_000,
            vec![
                (MessageRole::User, "why does the deploy pipeline keep failing on staging?", 0),
                (MessageRole::Assistant, "the health check times out before the new pods finish warming up", 60_000),
                (MessageRole::User, "can we just raise the timeout?", 120_000),
                (MessageRole::Assistant, "we decided to go with a staged rollout instead because it reduces blast radius", 600_000),
            ],
        );
        self.push(
            "cache-ttl",
            7_200_000,
            vec![
                (MessageRole::User, "why does the cache invalidate constantly?", 0),
                (MessageRole::Assistant, "the ttl is set to 10 seconds, way shorter than the upstream refresh interval", 30_000),
                (MessageRole::User, "what's the right value then?", 90_000),
                (MessageRole::Assistant, "we decided to go with a 5 minute ttl because it reduces staleness without hammering upstream", 400_000),
            ],
        );
        self.push(
            "consistency-model",
            10_800_000,
            vec![
                (MessageRole::User, "what is the right consistency model for the order service?", 0),
                (MessageRole::Assistant, "strong consistency needs a distributed transaction across two services here", 45_000),
                (MessageRole::User, "not sure we want that cost on every write", 100_000),
                (MessageRole::Assistant, "we decided to go with eventual consistency and a reconciliation job for this service", 500_000),
            ],
        );
        self.push(
            "empty-thread",
            14_400_000,
            vec![],
        );
    }
}

#[async_trait]
impl ConversationSource for DemoSource {
    async fn get_conversation(&self, id: &str) -> Result<Option<Conversation>, SourceError> {
        Ok(self.conversations.get(id).cloned())
    }

    async fn get_messages(&self, conversation_id: &str) -> Result<Vec<Message>, SourceError> {
        Ok(self.messages.get(conversation_id).cloned().unwrap_or_default())
    }

    async fn conversations_updated_since(&self, since_ms: i64) -> Result<Vec<String>, SourceError> {
        Ok(self.conversations.values().filter(|c| c.updated_at >= since_ms).map(|c| c.id.clone()).collect())
    }
}
