//! Turn pipeline tests
//!
//! Admission control, retry and error shaping against scripted engines

use async_trait::async_trait;
use chrono::Utc;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use turnguard::config::RetryConfig;
use turnguard::models::{ContentBlock, ConversationTurnEvent, ConversationTurnResult, StopReason};
use turnguard::services::{
    ConversationEngine, ConversationHandler, ErrorCategory, InMemoryRateLimiter, RateLimitStore,
    RetryPolicy, TurnOutcome, HIGH_DEMAND_MESSAGE,
};
use turnguard::EngineError;

/// Engine that replays a fixed script of outcomes, then repeats the last one
struct ScriptedEngine {
    script: Mutex<VecDeque<Result<ConversationTurnResult, EngineError>>>,
    last: Mutex<Option<Result<ConversationTurnResult, EngineError>>>,
    calls: AtomicU32,
}

impl ScriptedEngine {
    fn new(script: Vec<Result<ConversationTurnResult, EngineError>>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            last: Mutex::new(None),
            calls: AtomicU32::new(0),
        })
    }

    fn always(outcome: Result<ConversationTurnResult, EngineError>) -> Arc<Self> {
        Self::new(vec![outcome])
    }

    fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ConversationEngine for ScriptedEngine {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn handle_turn(&self, _event: &ConversationTurnEvent) -> Result<ConversationTurnResult, EngineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let next = self.script.lock().unwrap().pop_front();
        let mut last = self.last.lock().unwrap();
        if let Some(outcome) = next {
            *last = Some(outcome);
        }
        last.clone().expect("script must not be empty")
    }
}

fn reply(text: &str) -> ConversationTurnResult {
    ConversationTurnResult {
        content: vec![ContentBlock { text: text.to_string() }],
        conversation_id: "c1".to_string(),
        associated_user_message_id: "m1".to_string(),
        stop_reason: StopReason::Normal,
    }
}

fn fast_retry(max_retries: u32) -> RetryPolicy {
    RetryPolicy::new(RetryConfig {
        max_retries,
        base_delay_ms: 1,
        max_delay_ms: 5,
        backoff_multiplier: 2,
        max_jitter_ms: 0,
    })
}

fn handler_with(engine: Arc<ScriptedEngine>, max_requests: u32, retry: RetryPolicy) -> ConversationHandler {
    let limiter = Arc::new(InMemoryRateLimiter::new(Duration::from_secs(60), max_requests).unwrap());
    ConversationHandler::new(engine, limiter, retry)
}

fn event_for(conversation_id: &str) -> ConversationTurnEvent {
    ConversationTurnEvent {
        conversation_id: Some(conversation_id.to_string()),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_always_retryable_failure_exhausts_retries() {
    let engine = ScriptedEngine::always(Err(EngineError::new("ThrottlingException", "Rate exceeded")));
    let retry = fast_retry(3);

    let calls = engine.clone();
    let result: Result<ConversationTurnResult, _> = retry
        .execute_with_retry(|| {
            let engine = calls.clone();
            async move { engine.handle_turn(&ConversationTurnEvent::default()).await }
        })
        .await;

    let err = result.unwrap_err();
    assert_eq!(err.code.as_deref(), Some("ThrottlingException"));
    assert_eq!(engine.calls(), 4);
}

#[tokio::test]
async fn test_non_retryable_failure_calls_once() {
    let engine = ScriptedEngine::always(Err(EngineError::with_code("AccessDeniedException")));
    let handler = handler_with(engine.clone(), 20, fast_retry(3));

    let (result, outcome) = handler.handle_at(event_for("u1"), Utc::now()).await;

    assert_eq!(engine.calls(), 1);
    assert_eq!(outcome, TurnOutcome::ShapedError(ErrorCategory::Unknown));
    assert_eq!(result.stop_reason, StopReason::Error);
}

#[tokio::test]
async fn test_quota_message_is_not_retried() {
    let engine = ScriptedEngine::always(Err(EngineError::with_message("Service is over quota")));
    let handler = handler_with(engine.clone(), 20, fast_retry(3));

    let (result, outcome) = handler.handle_at(event_for("u1"), Utc::now()).await;

    assert_eq!(engine.calls(), 1);
    assert_eq!(outcome, TurnOutcome::ShapedError(ErrorCategory::QuotaExceeded));
    assert!(!result.text().to_lowercase().contains("quota"));
    assert_eq!(result.text(), ErrorCategory::QuotaExceeded.user_message());
}

#[tokio::test]
async fn test_two_failures_then_success() {
    let engine = ScriptedEngine::new(vec![
        Err(EngineError::with_code("ServiceUnavailableException")),
        Err(EngineError::with_message("connection reset")),
        Ok(reply("こんにちは")),
    ]);
    let handler = handler_with(engine.clone(), 20, fast_retry(3));

    let (result, outcome) = handler.handle_at(event_for("u1"), Utc::now()).await;

    assert_eq!(engine.calls(), 3);
    assert_eq!(outcome, TurnOutcome::Succeeded);
    assert_eq!(result, reply("こんにちは"));
}

#[tokio::test]
async fn test_exhausted_retries_are_shaped() {
    let engine = ScriptedEngine::always(Err(EngineError::new(
        "ServiceUnavailableException",
        "upstream pool drained at node 10.0.0.7",
    )));
    let handler = handler_with(engine.clone(), 20, fast_retry(2));

    let (result, outcome) = handler.handle_at(event_for("u1"), Utc::now()).await;

    assert_eq!(engine.calls(), 3);
    assert_eq!(outcome, TurnOutcome::ShapedError(ErrorCategory::ServiceUnavailable));
    assert_eq!(result.text(), ErrorCategory::ServiceUnavailable.user_message());
    assert!(!result.text().contains("10.0.0.7"));
    assert!(result.conversation_id.is_empty());
    assert!(result.associated_user_message_id.is_empty());
}

#[tokio::test]
async fn test_error_without_code_or_message_is_unknown() {
    let engine = ScriptedEngine::always(Err(EngineError::default()));
    let handler = handler_with(engine.clone(), 20, fast_retry(1));

    let (result, outcome) = handler.handle_at(event_for("u1"), Utc::now()).await;

    assert_eq!(engine.calls(), 2);
    assert_eq!(outcome, TurnOutcome::ShapedError(ErrorCategory::Unknown));
    assert_eq!(result.text(), ErrorCategory::Unknown.user_message());
}

#[tokio::test]
async fn test_twenty_first_turn_is_rejected() {
    let engine = ScriptedEngine::always(Ok(reply("ok")));
    let handler = handler_with(engine.clone(), 20, fast_retry(3));
    let now = Utc::now();

    for turn in 1..=20 {
        let at = now + chrono::Duration::seconds(turn);
        let (result, outcome) = handler.handle_at(event_for("u1"), at).await;
        assert_eq!(outcome, TurnOutcome::Succeeded, "turn {} should be admitted", turn);
        assert_eq!(result.stop_reason, StopReason::Normal);
    }

    let (result, outcome) = handler.handle_at(event_for("u1"), now + chrono::Duration::seconds(21)).await;

    assert_eq!(outcome, TurnOutcome::Rejected);
    assert_eq!(result.stop_reason, StopReason::Error);
    assert_eq!(result.text(), HIGH_DEMAND_MESSAGE);
    // rejection never reaches the engine
    assert_eq!(engine.calls(), 20);
}

#[tokio::test]
async fn test_new_window_admits_after_reset() {
    let engine = ScriptedEngine::always(Ok(reply("ok")));
    let handler = handler_with(engine.clone(), 2, fast_retry(0));
    let now = Utc::now();

    assert_eq!(handler.handle_at(event_for("u1"), now).await.1, TurnOutcome::Succeeded);
    assert_eq!(handler.handle_at(event_for("u1"), now).await.1, TurnOutcome::Succeeded);
    assert_eq!(handler.handle_at(event_for("u1"), now).await.1, TurnOutcome::Rejected);

    let next_window = now + chrono::Duration::seconds(61);
    assert_eq!(handler.handle_at(event_for("u1"), next_window).await.1, TurnOutcome::Succeeded);
}

#[tokio::test]
async fn test_anonymous_callers_share_a_bucket() {
    let engine = ScriptedEngine::always(Ok(reply("ok")));
    let handler = handler_with(engine, 1, fast_retry(0));
    let now = Utc::now();

    let (_, first) = handler.handle_at(ConversationTurnEvent::default(), now).await;
    let (_, second) = handler.handle_at(event_for(""), now).await;

    assert_eq!(first, TurnOutcome::Succeeded);
    assert_eq!(second, TurnOutcome::Rejected);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_concurrent_admission_never_over_admits() {
    let limiter = Arc::new(InMemoryRateLimiter::new(Duration::from_secs(60), 20).unwrap());
    let now = Utc::now();

    let mut tasks = Vec::new();
    for _ in 0..200 {
        let limiter = limiter.clone();
        tasks.push(tokio::spawn(async move {
            limiter.check_and_consume("u1", now).await.unwrap()
        }));
    }

    let mut admitted = 0;
    for task in tasks {
        if task.await.unwrap() {
            admitted += 1;
        }
    }

    assert_eq!(admitted, 20);
    assert_eq!(limiter.window_for("u1").unwrap().count, 20);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_turns_through_handler() {
    let engine = ScriptedEngine::always(Ok(reply("ok")));
    let handler = Arc::new(handler_with(engine.clone(), 5, fast_retry(0)));
    let now = Utc::now();

    let mut tasks = Vec::new();
    for _ in 0..25 {
        let handler = handler.clone();
        tasks.push(tokio::spawn(async move { handler.handle_at(event_for("shared"), now).await.1 }));
    }

    let mut outcomes = Vec::new();
    for task in tasks {
        outcomes.push(task.await.unwrap());
    }

    let succeeded = outcomes.iter().filter(|o| **o == TurnOutcome::Succeeded).count();
    let rejected = outcomes.iter().filter(|o| **o == TurnOutcome::Rejected).count();
    assert_eq!(succeeded, 5);
    assert_eq!(rejected, 20);
    assert_eq!(engine.calls(), 5);
}

#[tokio::test(start_paused = true)]
async fn test_backoff_does_not_block_other_identities() {
    // u1's engine call keeps failing and sits in backoff; u2 must not wait for it
    struct SelectiveEngine;

    #[async_trait]
    impl ConversationEngine for SelectiveEngine {
        fn name(&self) -> &str {
            "selective"
        }

        async fn handle_turn(&self, event: &ConversationTurnEvent) -> Result<ConversationTurnResult, EngineError> {
            if event.identity_key() == "u1" {
                Err(EngineError::with_code("ThrottlingException"))
            } else {
                Ok(reply("fast"))
            }
        }
    }

    let limiter = Arc::new(InMemoryRateLimiter::new(Duration::from_secs(60), 20).unwrap());
    let handler = Arc::new(ConversationHandler::new(Arc::new(SelectiveEngine), limiter, RetryPolicy::default()));

    let slow = {
        let handler = handler.clone();
        tokio::spawn(async move { handler.handle(event_for("u1")).await })
    };

    let start = tokio::time::Instant::now();
    let fast = handler.handle(event_for("u2")).await;
    assert_eq!(fast.text(), "fast");
    assert!(start.elapsed() < Duration::from_millis(1000));

    let slow = slow.await.unwrap();
    assert_eq!(slow.text(), ErrorCategory::RateLimit.user_message());
}
