//! Data models module
//!
//! Defines the conversation turn event and result structures

pub mod conversation;

pub use conversation::{
    ContentBlock, ConversationTurnEvent, ConversationTurnResult, StopReason, ANONYMOUS_IDENTITY,
};
