//! Service layer module
//!
//! Admission control, retry, error classification, the downstream engine
//! and the handler tying them together

pub mod classifier;
pub mod engine;
pub mod handler;
pub mod rate_limiter;
pub mod retry;

pub use classifier::{classify, is_non_retryable, ErrorCategory};
pub use engine::{ConversationEngine, HttpConversationEngine};
pub use handler::{ConversationHandler, TurnOutcome, HIGH_DEMAND_MESSAGE};
pub use rate_limiter::{spawn_eviction_task, InMemoryRateLimiter, RateLimitStore, RateLimitWindow};
pub use retry::{RetryAttempt, RetryPolicy};
