//! Application configuration settings
//!
//! Environment-driven server, engine, security and logging settings

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Server configuration
    pub server: ServerConfig,
    /// Downstream conversation engine
    pub engine: EngineConfig,
    /// Security configuration
    pub security: SecurityConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen host
    pub host: String,
    /// Listen port
    pub port: u16,
}

/// Downstream conversation engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Engine base URL
    pub base_url: String,
    /// Bearer key sent to the engine (optional)
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    /// Request timeout in seconds
    pub timeout: u64,
}

/// Security configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    /// Key callers must present; authentication is off when unset
    #[serde(skip_serializing)]
    pub gateway_api_key: Option<String>,
    /// API key header name
    pub api_key_header: String,
    /// Whether CORS is enabled
    pub cors_enabled: bool,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    pub level: String,
    /// Log format (text/json)
    pub format: String,
}

impl Settings {
    /// Create a new configuration instance
    pub fn new() -> Result<Self> {
        // Load .env file if it exists
        dotenv::dotenv().ok();

        let settings = Self {
            server: ServerConfig {
                host: get_env_or_default("SERVER_HOST", "0.0.0.0"),
                port: get_env_or_default("SERVER_PORT", "8082")
                    .parse()
                    .context("Invalid port number")?,
            },
            engine: EngineConfig {
                base_url: std::env::var("ENGINE_BASE_URL")
                    .context("ENGINE_BASE_URL environment variable not set")?,
                api_key: get_env_optional("ENGINE_API_KEY"),
                timeout: get_env_or_default("ENGINE_TIMEOUT", "30")
                    .parse()
                    .context("Invalid engine timeout value")?,
            },
            security: SecurityConfig {
                gateway_api_key: get_env_optional("GATEWAY_API_KEY"),
                api_key_header: get_env_or_default("API_KEY_HEADER", "Authorization"),
                cors_enabled: get_env_or_default("CORS_ENABLED", "true")
                    .parse()
                    .context("Invalid CORS enabled flag")?,
            },
            logging: LoggingConfig {
                level: get_env_or_default("RUST_LOG", "info"),
                format: get_env_or_default("LOG_FORMAT", "text"),
            },
        };

        settings.validate()?;

        Ok(settings)
    }

    /// Validate configuration validity
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            anyhow::bail!("Port number cannot be 0");
        }

        if !self.engine.base_url.starts_with("http") {
            anyhow::bail!("Invalid engine base URL format, should start with 'http'");
        }

        if self.engine.timeout == 0 {
            anyhow::bail!("Timeout values cannot be 0");
        }

        if let Some(key) = &self.security.gateway_api_key {
            if key.len() < 8 || key.contains(char::is_whitespace) {
                anyhow::bail!("GATEWAY_API_KEY must be at least 8 characters with no whitespace");
            }
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            anyhow::bail!("Invalid log level: {}", self.logging.level);
        }

        let valid_formats = ["text", "json"];
        if !valid_formats.contains(&self.logging.format.as_str()) {
            anyhow::bail!("Invalid log format: {}", self.logging.format);
        }

        Ok(())
    }

    /// Whether callers must authenticate
    pub fn auth_enabled(&self) -> bool {
        self.security.gateway_api_key.is_some()
    }
}

/// Get environment variable or default value
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Get environment variable, treating empty values as unset
fn get_env_optional(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}
