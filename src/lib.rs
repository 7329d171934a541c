pub mod access_gate;
pub mod api;
pub mod clock;
pub mod config;
pub mod core_state;
pub mod db;
pub mod models;
pub mod profile;
pub mod registration;
pub mod sessions;
pub mod verification;

use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),
    #[error("Startup error: {0}")]
    Core(#[from] core_state::CoreError),
    #[error(transparent)]
    Server(#[from] api::ServerError),
}

/// Initialize tracing from `RUST_LOG`, falling back to the default filter.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();
}

/// Load config, open the database and serve until Ctrl-C.
pub async fn run() -> Result<(), RunError> {
    init_tracing();

    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);

    let app_config = config::AppConfig::from_env()?;
    if app_config.identity_secret.is_none() {
        tracing::warn!("RESETA_IDENTITY_SECRET is not set; doctor sign-in is disabled");
    }
    let bind_addr = app_config.bind_addr;

    let core = Arc::new(core_state::CoreState::open(app_config)?);
    if let Err(e) = core.housekeeping() {
        tracing::warn!("Startup housekeeping failed: {e}");
    }

    let server = api::start_api_server_on(core.clone(), bind_addr).await?;
    tracing::info!(addr = %server.info.server_addr, "Listening");

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl-C: {e}");
    }

    server.stop().await;
    if let Err(e) = core.flush_audit() {
        tracing::warn!("Final audit flush failed: {e}");
    }
    tracing::info!("{} stopped", config::APP_NAME);
    Ok(())
}
