//! Configuration management module
//!
//! Environment settings for the server and engine, plus the JSON guard policy file.

pub mod file;
pub mod settings;

pub use file::{GuardConfig, RateLimitConfig, RetryConfig};
pub use settings::Settings;
