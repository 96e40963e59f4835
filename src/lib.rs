//! Conversation Turn Gateway Library
//!
//! Guards a downstream conversation engine with per-identity rate limiting,
//! retry with exponential backoff, and user-safe error replies

pub mod config;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod utils;

// Re-export common types
pub use config::{GuardConfig, Settings};
pub use handlers::{create_router, create_router_with_handler, AppState};
pub use models::{ConversationTurnEvent, ConversationTurnResult};
pub use services::{ConversationEngine, ConversationHandler, HttpConversationEngine};
pub use utils::error::{AppError, AppResult, EngineError};

/// Library version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Library description
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

/// Get version information
pub fn version_info() -> String {
    format!("{} v{} - {}", NAME, VERSION, DESCRIPTION)
}
