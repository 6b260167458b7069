// crates/analytics-core/src/source.rs
//! The read-only external message store the engine analyzes. No
//! transport, authentication, or UI lives behind this trait — an
//! embedder supplies an adapter over its own storage.

use crate::error::SourceError;
use analytics_types::{Conversation, Message};
use async_trait::async_trait;

#[async_trait]
pub trait ConversationSource: Send + Sync {
    async fn get_conversation(&self, id: &str) -> Result<Option<Conversation>, SourceError>;
    async fn get_messages(&self, conversation_id: &str) -> Result<Vec<Message>, SourceError>;
    async fn conversations_updated_since(&self, since_ms: i64) -> Result<Vec<String>, SourceError>;
}
