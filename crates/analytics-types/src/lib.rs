// crates/analytics-types/src/lib.rs
//! Shared value types for the conversation analytics engine.
//!
//! Everything here is a plain data type: no I/O, no SQL, no analyzer
//! logic. Repositories (`analytics-db`) and analyzers (`analytics-core`)
//! both depend on this crate so that the wire shape of a metric is
//! defined exactly once.

pub mod analytics;
pub mod attribute;
pub mod conversation;
pub mod decision;
pub mod gap;
pub mod pattern;
pub mod time_range;

pub use analytics::ConversationAnalytics;
pub use attribute::{sequence_from_storage_text, sequence_to_storage_text, AttributeBag, AttributeValue};
pub use conversation::{Conversation, ConversationKind, Message, MessageRole, TimestampMs};
pub use decision::{DecisionLifecycle, DecisionStatus, DecisionTracking, DecisionType, Priority};
pub use gap::{normalize_content, GapType, KnowledgeGap};
pub use pattern::{ProductivityPattern, WindowType};
pub use time_range::TimeRange;
