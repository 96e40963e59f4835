//! File-based configuration loading
//!
//! Loads rate-limit and retry policy from a JSON file

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

/// Guard policy loaded from JSON file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GuardConfig {
    /// Admission control policy
    #[serde(rename = "rateLimit", default)]
    pub rate_limit: RateLimitConfig,

    /// Retry policy for downstream calls
    #[serde(default)]
    pub retry: RetryConfig,
}

/// Fixed-window rate limit configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Window length in seconds (default: 60)
    #[serde(rename = "windowSecs", default = "default_window_secs")]
    pub window_secs: u64,

    /// Turns admitted per identity per window (default: 20)
    #[serde(rename = "maxRequests", default = "default_max_requests")]
    pub max_requests: u32,

    /// How often expired windows are swept, in seconds. 0 disables sweeping.
    #[serde(rename = "evictionIntervalSecs", default = "default_eviction_interval_secs")]
    pub eviction_interval_secs: u64,
}

fn default_window_secs() -> u64 {
    60
}

fn default_max_requests() -> u32 {
    20
}

fn default_eviction_interval_secs() -> u64 {
    60
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window_secs: default_window_secs(),
            max_requests: default_max_requests(),
            eviction_interval_secs: default_eviction_interval_secs(),
        }
    }
}

impl RateLimitConfig {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }

    /// Sweep interval, `None` when sweeping is disabled
    pub fn eviction_interval(&self) -> Option<Duration> {
        (self.eviction_interval_secs > 0).then(|| Duration::from_secs(self.eviction_interval_secs))
    }
}

/// Retry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum retry attempts after the first call
    #[serde(rename = "maxRetries", default = "default_max_retries")]
    pub max_retries: u32,
    /// Base delay time (milliseconds)
    #[serde(rename = "baseDelayMs", default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    /// Maximum delay time (milliseconds)
    #[serde(rename = "maxDelayMs", default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// Growth factor applied per attempt
    #[serde(rename = "backoffMultiplier", default = "default_backoff_multiplier")]
    pub backoff_multiplier: u32,
    /// Upper bound (exclusive) of the random jitter added to each delay (milliseconds)
    #[serde(rename = "maxJitterMs", default = "default_max_jitter_ms")]
    pub max_jitter_ms: u64,
}

fn default_max_retries() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    1000
}

fn default_max_delay_ms() -> u64 {
    10000
}

fn default_backoff_multiplier() -> u32 {
    2
}

fn default_max_jitter_ms() -> u64 {
    1000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            backoff_multiplier: default_backoff_multiplier(),
            max_jitter_ms: default_max_jitter_ms(),
        }
    }
}

impl GuardConfig {
    /// Load configuration from JSON file
    pub fn load(path: &Path) -> Result<Self> {
        info!("Loading guard configuration from: {:?}", path);

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let config: GuardConfig = serde_json::from_str(&content)
            .with_context(|| "Failed to parse config JSON")?;

        config.validate()?;

        debug!(
            "Rate limit: {} turns per {}s, retry: {} retries",
            config.rate_limit.max_requests, config.rate_limit.window_secs, config.retry.max_retries
        );
        Ok(config)
    }

    /// Load configuration from default locations
    /// Searches in order:
    /// 1. ~/.config/turnguard/turnguard.json
    /// 2. ./turnguard.json
    ///
    /// Falls back to built-in defaults when neither file exists.
    pub fn load_default() -> Result<Self> {
        if let Some(home) = dirs::home_dir() {
            let config_path = home.join(".config").join("turnguard").join("turnguard.json");
            if config_path.exists() {
                return Self::load(&config_path);
            }
        }

        let local_path = Path::new("turnguard.json");
        if local_path.exists() {
            return Self::load(local_path);
        }

        info!("No guard configuration file found, using defaults");
        Ok(Self::default())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.rate_limit.window_secs == 0 {
            anyhow::bail!("Rate limit window cannot be 0");
        }

        if self.rate_limit.max_requests == 0 {
            anyhow::bail!("Rate limit maxRequests cannot be 0");
        }

        if self.retry.backoff_multiplier == 0 {
            anyhow::bail!("Retry backoffMultiplier must be at least 1");
        }

        if self.retry.base_delay_ms > self.retry.max_delay_ms {
            anyhow::bail!(
                "Retry baseDelayMs ({}) cannot exceed maxDelayMs ({})",
                self.retry.base_delay_ms,
                self.retry.max_delay_ms
            );
        }

        Ok(())
    }
}
