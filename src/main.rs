//! Conversation Turn Gateway Server
//!
//! HTTP front for a conversation engine with admission control, retries
//! and shaped error replies

use anyhow::{Context, Result};
use tracing::info;
use turnguard::config::{GuardConfig, Settings};
use turnguard::handlers::create_router;

#[tokio::main]
async fn main() -> Result<()> {
    // Environment settings decide the log format, so load them first
    let settings = Settings::new().context("Failed to load server settings")?;

    init_logging(&settings.logging.level, &settings.logging.format)?;
    info!("{}", turnguard::version_info());

    let guard = GuardConfig::load_default().context("Failed to load guard configuration")?;
    info!(
        "Rate limit: {} turns per {}s per identity; retries: {}",
        guard.rate_limit.max_requests, guard.rate_limit.window_secs, guard.retry.max_retries
    );

    if settings.auth_enabled() {
        info!("Gateway authentication enabled via {} header", settings.security.api_key_header);
    }

    let addr = format!("{}:{}", settings.server.host, settings.server.port);
    let app = create_router(settings, guard).await?;

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("🚀 Conversation gateway started!");
    info!("📝 Health check: http://{}/health", addr);
    info!("💬 Turn endpoint: http://{}/v1/conversation/turn", addr);

    axum::serve(listener, app)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to start server: {}", e))?;

    Ok(())
}

/// Initialize logging system
fn init_logging(level: &str, format: &str) -> Result<()> {
    let subscriber: Box<dyn tracing::Subscriber + Send + Sync> = if format == "json" {
        // JSON format logs (production environment)
        Box::new(tracing_subscriber::fmt()
            .with_env_filter(level)
            .json()
            .with_current_span(true)
            .with_span_list(false)
            .finish())
    } else {
        // Human readable format (development environment)
        Box::new(tracing_subscriber::fmt()
            .with_env_filter(level)
            .with_target(false)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .finish())
    };

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    Ok(())
}
