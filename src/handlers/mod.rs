//! HTTP handlers module
//!
//! Contains all HTTP endpoint handling logic

pub mod conversation;
pub mod health;

use crate::config::{GuardConfig, Settings};
use crate::middleware::{auth::auth_middleware, logging::request_logging_middleware};
use crate::services::{spawn_eviction_task, ConversationHandler, HttpConversationEngine};
use anyhow::{Context, Result};
use axum::{middleware, routing::get, routing::post, Router};
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    trace::TraceLayer,
};
use tracing::info;

/// Largest accepted turn event body
pub const MAX_EVENT_BYTES: usize = 1024 * 1024;

/// Application state
#[derive(Clone)]
pub struct AppState {
    pub settings: Settings,
    pub handler: Arc<ConversationHandler>,
}

/// Create application router backed by the HTTP engine
///
/// Also starts the background sweep of expired rate-limit windows.
pub async fn create_router(settings: Settings, guard: GuardConfig) -> Result<Router> {
    let engine = Arc::new(HttpConversationEngine::new(&settings.engine)?);

    let handler = ConversationHandler::from_config(engine, &guard)
        .context("Failed to create conversation handler")?;
    let handler = Arc::new(handler);

    if let Some(interval) = guard.rate_limit.eviction_interval() {
        spawn_eviction_task(handler.limiter().clone(), interval);
        info!("Rate limit eviction every {}s", interval.as_secs());
    }

    Ok(create_router_with_handler(settings, handler))
}

/// Create application router around an existing handler
pub fn create_router_with_handler(settings: Settings, handler: Arc<ConversationHandler>) -> Router {
    let cors_enabled = settings.security.cors_enabled;
    let app_state = Arc::new(AppState { settings, handler });

    let turn_routes = Router::new()
        .route("/v1/conversation/turn", post(conversation::handle_turn))
        .route_layer(middleware::from_fn_with_state(app_state.clone(), auth_middleware));

    let mut router = Router::new()
        .merge(turn_routes)
        .route("/health", get(health::health_check))
        .route("/health/live", get(health::liveness_check))
        .route("/health/ready", get(health::readiness_check))
        .layer(middleware::from_fn_with_state(app_state.clone(), request_logging_middleware))
        .layer(RequestBodyLimitLayer::new(MAX_EVENT_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(app_state);

    if cors_enabled {
        router = router.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );
    }

    router
}
