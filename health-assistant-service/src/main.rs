use std::sync::Arc;

use anyhow::Context;
use health_assistant_service::config::LogFormat;
use health_assistant_service::{Config, GroqGateway, create_app};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "health_assistant_service=debug,intake_flow=debug,tower_http=debug";

/// JSON lines carry the request span so every event has its correlation id.
fn init_tracing(format: LogFormat) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);

    match format {
        LogFormat::Pretty => subscriber.pretty().init(),
        LogFormat::Json => subscriber
            .json()
            .with_current_span(true)
            .with_span_list(false)
            .init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is fine; the process environment may already be set
    let _ = dotenvy::dotenv();
    let config = Config::from_env().context("invalid configuration")?;
    init_tracing(config.log_format);

    let port = config.port;
    let gateway = Arc::new(GroqGateway::new(&config.gateway));
    let backend_enabled = config.backend.is_some();

    let app = create_app(config, gateway);
    let listener = TcpListener::bind(format!("0.0.0.0:{port}"))
        .await
        .with_context(|| format!("failed to bind port {port}"))?;
    let addr = listener.local_addr()?;

    info!(%addr, backend_enabled, "Health Assistant Service listening");
    axum::serve(listener, app).await?;
    Ok(())
}
