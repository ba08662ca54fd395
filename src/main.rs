//! 密钥库服务端入口

use std::sync::Arc;

use anyhow::{Context, Result};
use upalcore::{api, app_state::AppState, config::Config, infrastructure::logging};

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = std::env::var("CONFIG_PATH").ok();
    let config = Config::from_env_and_file(config_path.as_deref())?;

    logging::init_logging(&config.logging)?;
    config.validate().context("Invalid configuration")?;

    let state = Arc::new(AppState::from_config(&config)?);
    let mut app = api::routes(state);
    if let Some(origin) = &config.server.allowed_origin {
        app = app.layer(api::cors_layer(origin)?);
    }

    let listener = tokio::net::TcpListener::bind(&config.server.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.server.bind_addr))?;
    tracing::info!(bind_addr = %config.server.bind_addr, "Keystore server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutdown signal received");
        })
        .await?;

    Ok(())
}
