//! Conversation turn orchestration
//!
//! RECEIVED -> ADMITTED | REJECTED; ADMITTED -> SUCCEEDED | FAILED;
//! FAILED -> SHAPED_ERROR. Every terminal state yields a
//! `ConversationTurnResult`.

use crate::config::GuardConfig;
use crate::models::{ConversationTurnEvent, ConversationTurnResult};
use crate::services::classifier::{classify, ErrorCategory};
use crate::services::engine::ConversationEngine;
use crate::services::rate_limiter::{InMemoryRateLimiter, RateLimitStore};
use crate::services::retry::RetryPolicy;
use crate::utils::error::{AppResult, EngineError};
use crate::utils::logging::create_event_log_summary;
use chrono::{DateTime, Utc};
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, error, info, warn, Instrument};

/// Reply for turns rejected by admission control
pub const HIGH_DEMAND_MESSAGE: &str =
    "I am currently experiencing high demand. Please try again in a few moments.";

/// How a turn ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnOutcome {
    Rejected,
    Succeeded,
    ShapedError(ErrorCategory),
}

/// Wraps a conversation engine with admission control, retries and
/// error shaping
pub struct ConversationHandler {
    engine: Arc<dyn ConversationEngine>,
    limiter: Arc<dyn RateLimitStore>,
    retry: RetryPolicy,
}

impl ConversationHandler {
    pub fn new(engine: Arc<dyn ConversationEngine>, limiter: Arc<dyn RateLimitStore>, retry: RetryPolicy) -> Self {
        Self { engine, limiter, retry }
    }

    /// Build a handler with an in-memory limiter from the guard policy
    pub fn from_config(engine: Arc<dyn ConversationEngine>, config: &GuardConfig) -> AppResult<Self> {
        let limiter = Arc::new(InMemoryRateLimiter::from_config(&config.rate_limit)?);
        Ok(Self::new(engine, limiter, RetryPolicy::new(config.retry.clone())))
    }

    pub fn limiter(&self) -> &Arc<dyn RateLimitStore> {
        &self.limiter
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Handle one turn at the current time
    pub async fn handle(&self, event: ConversationTurnEvent) -> ConversationTurnResult {
        self.handle_at(event, Utc::now()).await.0
    }

    /// Handle one turn as of `now`, reporting how it ended
    pub async fn handle_at(
        &self,
        event: ConversationTurnEvent,
        now: DateTime<Utc>,
    ) -> (ConversationTurnResult, TurnOutcome) {
        let identity = event.identity_key().to_string();
        let span = tracing::info_span!("conversation_turn", identity = %identity, engine = %self.engine.name());

        async move {
            debug!("Turn event: {}", create_event_log_summary(&event));

            if !self.admit(&identity, now).await {
                info!("Rate limited identity: {}", identity);
                return (ConversationTurnResult::error(HIGH_DEMAND_MESSAGE), TurnOutcome::Rejected);
            }

            match self.invoke(&event).await {
                Ok(result) => {
                    debug!("Turn succeeded");
                    (result, TurnOutcome::Succeeded)
                }
                Err(err) => {
                    let category = classify(&err);
                    warn!(category = %category, "Conversation turn failed: {}", err);
                    (
                        ConversationTurnResult::error(category.user_message()),
                        TurnOutcome::ShapedError(category),
                    )
                }
            }
        }
        .instrument(span)
        .await
    }

    /// Admission check. A failing store admits the turn.
    async fn admit(&self, identity: &str, now: DateTime<Utc>) -> bool {
        match self.limiter.check_and_consume(identity, now).await {
            Ok(allowed) => allowed,
            Err(e) => {
                warn!("Rate limit store unavailable, admitting turn: {}", e);
                true
            }
        }
    }

    /// Engine call under the retry policy
    async fn invoke(&self, event: &ConversationTurnEvent) -> Result<ConversationTurnResult, EngineError> {
        self.retry.execute_with_retry(|| self.attempt(event)).await
    }

    /// One engine call. A panic becomes this attempt's failure.
    async fn attempt(&self, event: &ConversationTurnEvent) -> Result<ConversationTurnResult, EngineError> {
        match AssertUnwindSafe(self.engine.handle_turn(event)).catch_unwind().await {
            Ok(result) => result,
            Err(_) => {
                error!("Conversation engine panicked");
                Err(EngineError::default())
            }
        }
    }
}
