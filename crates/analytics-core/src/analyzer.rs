// crates/analytics-core/src/analyzer.rs
//! The common seam implemented by the four pure analyzers. Small trait,
//! no inheritance: a conversation and its messages go in, a value-typed
//! metric record comes out.

use analytics_types::{Conversation, Message};

pub trait Analyzer {
    type Output;

    fn analyze(&self, conversation: &Conversation, messages: &[Message]) -> Self::Output;
}
