pub mod api;
pub mod clock;
pub mod config;
pub mod core_state;
pub mod db;
pub mod email;
pub mod family;
pub mod medications;
pub mod models;
pub mod patients;
pub mod reminders;
pub mod scheduler;

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

/// Startup failures surfaced to `main`.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] config::ConfigError),
    #[error(transparent)]
    Core(#[from] core_state::CoreError),
    #[error("Cannot bind API server: {0}")]
    Bind(#[from] std::io::Error),
}

/// Run the service until Ctrl-C: HTTP API plus the reminder scheduler.
pub async fn run() -> Result<(), StartupError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();

    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);

    let config = config::AppConfig::from_env()?;
    tracing::info!(db = %config.db_path.display(), grace_minutes = config.grace_minutes, "Configuration loaded");

    let bind_addr = config.bind_addr;
    let core = Arc::new(core_state::CoreState::open(config)?);

    let scheduler = scheduler::start_scheduler(core.clone());
    let server = api::start_api_server(core, bind_addr).await?;

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Cannot listen for shutdown signal");
    }
    tracing::info!("Shutting down");

    server.stop().await;
    scheduler.stop().await;
    Ok(())
}
