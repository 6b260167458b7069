//! External, read-only entities: conversations and messages.
//!
//! These types mirror the base message-store schema that the analytics
//! core consumes but does not own. Nothing here is ever written back by
//! this crate.

use crate::attribute::AttributeBag;
use serde::{Deserialize, Serialize};

/// Milliseconds since the Unix epoch.
pub type TimestampMs = i64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    User,
    Assistant,
}

/// A single message in a conversation. Read-only to this crate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub conversation_id: String,
    pub role: MessageRole,
    pub content: String,
    pub created_at: TimestampMs,
}

/// A conversation owned by the external message store. Read-only to this
/// crate — the analytics engine never mutates these fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub created_at: TimestampMs,
    pub updated_at: TimestampMs,
    pub title: Option<String>,
    #[serde(default)]
    pub attributes: AttributeBag,
}

/// Optional coarse classification of a conversation, attached as a
/// convenience facet for report breakdowns. Additive only: it never
/// replaces any field in `ConversationAnalytics`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationKind {
    Technical,
    Planning,
    Creative,
    Support,
    Other,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversation_defaults_to_empty_attributes() {
        let json = r#"{"id":"c1","created_at":1,"updated_at":2,"title":null}"#;
        let conv: Conversation = serde_json::from_str(json).unwrap();
        assert_eq!(conv.attributes, AttributeBag::default());
    }
}
