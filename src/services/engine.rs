//! Downstream conversation engine
//!
//! Defines the engine trait and an HTTP implementation

use crate::config::settings::EngineConfig;
use crate::models::{ConversationTurnEvent, ConversationTurnResult};
use crate::utils::error::EngineError;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, error};

/// Engine that produces the reply for one conversation turn.
///
/// Treated as an opaque remote call that may succeed, fail, or be throttled.
#[async_trait]
pub trait ConversationEngine: Send + Sync {
    /// Engine name, for logs
    fn name(&self) -> &str;

    /// Handle one conversation turn
    async fn handle_turn(&self, event: &ConversationTurnEvent) -> Result<ConversationTurnResult, EngineError>;
}

/// Engine reached over HTTP
pub struct HttpConversationEngine {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

/// Failure body shapes engines commonly return
#[derive(Debug, Default, Deserialize)]
struct EngineErrorBody {
    #[serde(default)]
    code: Option<String>,
    #[serde(default, rename = "__type")]
    type_name: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default, alias = "Message")]
    message: Option<String>,
}

impl HttpConversationEngine {
    /// Create an engine client from configuration
    pub fn new(config: &EngineConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout))
            .user_agent(concat!("turnguard/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }

    /// Build the request URL
    fn build_url(&self) -> String {
        format!("{}/conversation/turn", self.base_url)
    }

    /// Map a transport failure
    fn transport_error(err: reqwest::Error) -> EngineError {
        if err.is_timeout() {
            EngineError::new("TimeoutError", err.to_string())
        } else if err.is_decode() {
            EngineError::new("InvalidResponse", err.to_string())
        } else {
            EngineError::new("NetworkError", err.to_string())
        }
    }

    /// Map a non-success response to an engine error.
    ///
    /// Codes in the body take priority; otherwise the status decides.
    pub(crate) fn status_error(status: StatusCode, body: &str) -> EngineError {
        let parsed: EngineErrorBody = serde_json::from_str(body).unwrap_or_default();

        let code = parsed
            .code
            .or(parsed.type_name)
            .or(parsed.name)
            .unwrap_or_else(|| status_code_name(status).to_string());

        let message = parsed
            .message
            .or_else(|| (!body.trim().is_empty()).then(|| body.trim().to_string()));

        EngineError {
            code: Some(code),
            message,
        }
    }
}

/// Exception name for an HTTP status without a body code
fn status_code_name(status: StatusCode) -> &'static str {
    match status {
        StatusCode::BAD_REQUEST => "ValidationException",
        StatusCode::UNAUTHORIZED => "UnauthorizedException",
        StatusCode::FORBIDDEN => "AccessDeniedException",
        StatusCode::TOO_MANY_REQUESTS => "ThrottlingException",
        StatusCode::SERVICE_UNAVAILABLE => "ServiceUnavailableException",
        s if s.is_server_error() => "InternalServerException",
        _ => "UnexpectedStatus",
    }
}

#[async_trait]
impl ConversationEngine for HttpConversationEngine {
    fn name(&self) -> &str {
        "http"
    }

    async fn handle_turn(&self, event: &ConversationTurnEvent) -> Result<ConversationTurnResult, EngineError> {
        let url = self.build_url();
        debug!("Sending conversation turn to engine: {}", url);

        let mut request = self.client.post(&url).json(event);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(Self::transport_error)?;
        let status = response.status();

        if status.is_success() {
            let result: ConversationTurnResult = response.json().await.map_err(Self::transport_error)?;
            debug!("Engine turn completed with stop reason {:?}", result.stop_reason);
            Ok(result)
        } else {
            let body = response.text().await.unwrap_or_default();
            error!("Engine request failed: {} - {}", status, body);
            Err(Self::status_error(status, &body))
        }
    }
}
