//! Authentication middleware
//!
//! Checks the gateway API key on conversation routes

use crate::handlers::AppState;
use crate::utils::error::AppError;
use axum::{
    body::Body,
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use subtle::ConstantTimeEq;
use tracing::{debug, warn};

/// Authentication middleware
///
/// Passes every request through when no gateway key is configured.
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let Some(expected) = state.settings.security.gateway_api_key.as_deref() else {
        return Ok(next.run(request).await);
    };

    let header_name = &state.settings.security.api_key_header;
    let presented = headers.get(header_name).and_then(|h| h.to_str().ok());

    match presented {
        Some(value) if validate_api_key(value, expected) => {
            debug!("Authentication successful");
            Ok(next.run(request).await)
        }
        Some(_) => {
            warn!("Invalid API key");
            Err(AppError::Authentication("invalid API key".to_string()))
        }
        None => {
            warn!("Missing authentication header: {}", header_name);
            Err(AppError::Authentication(format!("missing {} header", header_name)))
        }
    }
}

/// Compare a presented header value against the expected key.
///
/// A `Bearer ` prefix on the presented value is ignored.
pub fn validate_api_key(presented: &str, expected: &str) -> bool {
    let token = presented.strip_prefix("Bearer ").unwrap_or(presented).trim();

    if token.is_empty() {
        return false;
    }

    token.as_bytes().ct_eq(expected.as_bytes()).into()
}
