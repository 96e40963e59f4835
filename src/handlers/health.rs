//! Health check handlers
//!
//! Provides application health status check endpoints

use crate::handlers::AppState;
use axum::{extract::State, http::StatusCode, response::Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

const SERVICE_NAME: &str = "turnguard";

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Service status
    pub status: String,
    /// Service name
    pub service: String,
    /// Version information
    pub version: String,
    /// Timestamp
    pub timestamp: String,
    /// Details (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<HealthDetails>,
}

/// Check result
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthDetails {
    /// Rate limiter status
    pub rate_limiter: String,
    /// Identities with a live window (when known)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tracked_identities: Option<usize>,
    /// Configuration status
    pub config: String,
    /// Uptime in seconds
    pub uptime_seconds: u64,
}

fn response(status: &str, details: HealthDetails) -> HealthResponse {
    HealthResponse {
        status: status.to_string(),
        service: SERVICE_NAME.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        details: Some(details),
    }
}

/// Basic health check
///
/// GET /health
pub async fn health_check(State(_state): State<Arc<AppState>>) -> Json<HealthResponse> {
    debug!("Executing health check");

    Json(response(
        "healthy",
        HealthDetails {
            rate_limiter: "not_checked".to_string(),
            tracked_identities: None,
            config: "valid".to_string(),
            uptime_seconds: get_uptime_seconds(),
        },
    ))
}

/// Readiness check
///
/// GET /health/ready
/// Ready when the rate-limit store answers
pub async fn readiness_check(State(state): State<Arc<AppState>>) -> Result<Json<HealthResponse>, StatusCode> {
    debug!("Executing readiness check");

    match state.handler.limiter().tracked_identities().await {
        Ok(count) => Ok(Json(response(
            "ready",
            HealthDetails {
                rate_limiter: "available".to_string(),
                tracked_identities: Some(count),
                config: "valid".to_string(),
                uptime_seconds: get_uptime_seconds(),
            },
        ))),
        Err(e) => {
            warn!("Readiness check failed: {}", e);
            Err(StatusCode::SERVICE_UNAVAILABLE)
        }
    }
}

/// Liveness check
///
/// GET /health/live
/// Does not check dependencies
pub async fn liveness_check(State(_state): State<Arc<AppState>>) -> Json<HealthResponse> {
    debug!("Executing liveness check");

    Json(response(
        "alive",
        HealthDetails {
            rate_limiter: "not_checked".to_string(),
            tracked_identities: None,
            config: "valid".to_string(),
            uptime_seconds: get_uptime_seconds(),
        },
    ))
}

/// Get service uptime in seconds
fn get_uptime_seconds() -> u64 {
    use std::sync::OnceLock;
    use std::time::Instant;

    static START_TIME: OnceLock<Instant> = OnceLock::new();

    START_TIME.get_or_init(Instant::now).elapsed().as_secs()
}
