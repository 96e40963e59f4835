//! Conversation turn handler
//!
//! POST /v1/conversation/turn

use crate::handlers::AppState;
use crate::models::{ConversationTurnEvent, ConversationTurnResult};
use axum::{extract::State, Json};
use std::sync::Arc;
use tracing::debug;

/// Handle one conversation turn
///
/// Always answers 200 with a `ConversationTurnResult`; rejections and
/// engine failures are carried in the body with `stopReason = error`.
pub async fn handle_turn(
    State(state): State<Arc<AppState>>,
    Json(event): Json<ConversationTurnEvent>,
) -> Json<ConversationTurnResult> {
    debug!("Received conversation turn for identity: {}", event.identity_key());

    let result = state.handler.handle(event).await;

    Json(result)
}
