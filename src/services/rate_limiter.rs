//! Per-identity admission control
//!
//! Fixed-window counter keyed by identity. A burst of `max_requests` at the
//! end of one window followed by another burst right after the reset is
//! admitted; that coarseness is accepted.

use crate::config::RateLimitConfig;
use crate::utils::error::{AppError, AppResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Counter state for one identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitWindow {
    pub identity_key: String,
    pub count: u32,
    pub window_reset_at: DateTime<Utc>,
}

impl RateLimitWindow {
    fn open(identity_key: &str, now: DateTime<Utc>, window: chrono::Duration) -> Self {
        Self {
            identity_key: identity_key.to_string(),
            count: 1,
            window_reset_at: now + window,
        }
    }

    /// Whether `now` is past this window's reset time
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.window_reset_at
    }
}

/// Backing store for rate-limit windows.
///
/// `check_and_consume` must be atomic per key: two concurrent calls must
/// never both take the last free slot. An external store implements this
/// with an atomic increment-and-expire.
#[async_trait]
pub trait RateLimitStore: Send + Sync {
    /// Admit or reject one turn for `identity_key` at time `now`.
    /// Rejections leave the stored window untouched.
    async fn check_and_consume(&self, identity_key: &str, now: DateTime<Utc>) -> AppResult<bool>;

    /// Drop windows that expired before `now`. Returns how many were removed.
    async fn evict_expired(&self, now: DateTime<Utc>) -> AppResult<usize>;

    /// Number of identities currently tracked
    async fn tracked_identities(&self) -> AppResult<usize>;
}

/// Process-local window store
pub struct InMemoryRateLimiter {
    window: chrono::Duration,
    max_requests: u32,
    windows: Mutex<HashMap<String, RateLimitWindow>>,
}

impl InMemoryRateLimiter {
    /// Create a limiter admitting `max_requests` turns per `window`
    pub fn new(window: Duration, max_requests: u32) -> AppResult<Self> {
        if max_requests == 0 {
            return Err(AppError::Config(anyhow::anyhow!("Rate limit maxRequests cannot be 0")));
        }
        if window.is_zero() {
            return Err(AppError::Config(anyhow::anyhow!("Rate limit window cannot be 0")));
        }

        let window = chrono::Duration::from_std(window)
            .map_err(|e| AppError::Config(anyhow::anyhow!("Rate limit window out of range: {}", e)))?;

        Ok(Self {
            window,
            max_requests,
            windows: Mutex::new(HashMap::new()),
        })
    }

    pub fn from_config(config: &RateLimitConfig) -> AppResult<Self> {
        Self::new(config.window(), config.max_requests)
    }

    pub fn max_requests(&self) -> u32 {
        self.max_requests
    }

    /// Synchronous core of `check_and_consume`
    pub fn try_acquire(&self, identity_key: &str, now: DateTime<Utc>) -> bool {
        let mut windows = self.lock();

        if let Some(entry) = windows.get_mut(identity_key) {
            if !entry.is_expired(now) {
                if entry.count >= self.max_requests {
                    return false;
                }
                entry.count += 1;
                return true;
            }
        }

        windows.insert(
            identity_key.to_string(),
            RateLimitWindow::open(identity_key, now, self.window),
        );
        true
    }

    /// Snapshot of the window for `identity_key`
    pub fn window_for(&self, identity_key: &str) -> Option<RateLimitWindow> {
        self.lock().get(identity_key).cloned()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, RateLimitWindow>> {
        // No code path panics while holding the lock, a poisoned map is still consistent
        self.windows.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl RateLimitStore for InMemoryRateLimiter {
    async fn check_and_consume(&self, identity_key: &str, now: DateTime<Utc>) -> AppResult<bool> {
        Ok(self.try_acquire(identity_key, now))
    }

    async fn evict_expired(&self, now: DateTime<Utc>) -> AppResult<usize> {
        let mut windows = self.lock();
        let before = windows.len();
        windows.retain(|_, entry| !entry.is_expired(now));
        Ok(before - windows.len())
    }

    async fn tracked_identities(&self) -> AppResult<usize> {
        Ok(self.lock().len())
    }
}

/// Spawn a task that sweeps expired windows every `interval`.
///
/// The task runs until the returned handle is aborted or the runtime shuts down.
pub fn spawn_eviction_task(store: Arc<dyn RateLimitStore>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // first tick completes immediately
        ticker.tick().await;

        loop {
            ticker.tick().await;
            match store.evict_expired(Utc::now()).await {
                Ok(0) => {}
                Ok(removed) => debug!("Evicted {} expired rate limit windows", removed),
                Err(e) => warn!("Rate limit eviction failed: {}", e),
            }
        }
    })
}
