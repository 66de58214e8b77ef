pub mod api;
pub mod appointment;
pub mod auth;
pub mod config;
pub mod core_state;
pub mod db;
pub mod error;
pub mod inbox;
pub mod models;
pub mod notify;
pub mod slots;
pub mod transition;

#[cfg(test)]
mod test_support;

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use crate::api::{ApiContext, ServerError};
use crate::config::{AppConfig, ConfigError, EmailSettings};
use crate::core_state::CoreState;
use crate::notify::{EmailTransport, HttpEmailTransport, LogTransport};

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("Database error: {0}")]
    Database(#[from] db::DatabaseError),
    #[error("Bootstrap admin failed: {0}")]
    Bootstrap(#[from] auth::AuthError),
    #[error("Email transport error: {0}")]
    Email(#[from] notify::DeliveryError),
    #[error("Runtime error: {0}")]
    Runtime(std::io::Error),
    #[error(transparent)]
    Server(#[from] ServerError),
}

/// Load configuration, prepare the database, then serve until Ctrl-C.
pub fn run() -> Result<(), StartupError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();

    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);

    let cfg = AppConfig::from_env()?;

    let conn = db::open_database(&cfg.database_path)?;
    tracing::info!(path = %cfg.database_path.display(), "Database ready");
    if let Some(admin) = &cfg.bootstrap_admin {
        if let Some(created) =
            auth::ensure_bootstrap_admin(&conn, &admin.name, &admin.email, &admin.password)?
        {
            tracing::info!(admin_id = %created.id, "Bootstrap admin created");
        }
    }
    drop(conn);

    // The blocking HTTP client must be built outside the tokio runtime.
    let transport = build_transport(&cfg.email)?;
    let dispatcher = notify::start_email_dispatcher(
        cfg.database_path.clone(),
        transport,
        cfg.email.retry_policy(),
        cfg.email.poll_interval(),
    );

    let core = Arc::new(
        CoreState::new(cfg.database_path.clone(), cfg.admin_recipients.clone())
            .with_email_waker(dispatcher.waker()),
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(StartupError::Runtime)?;

    let served = runtime.block_on(async {
        let ctx = ApiContext::new(core, cfg.session_ttl);
        let app = api::api_router(ctx, &cfg.cors_origins);
        let mut server = api::start_api_server(app, cfg.bind_addr).await?;

        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Cannot listen for shutdown signal");
        }
        tracing::info!("Shutdown requested");
        server.shutdown();
        server.stopped().await;
        Ok::<(), StartupError>(())
    });

    // Joins the dispatcher thread after its current pass.
    drop(dispatcher);
    tracing::info!("{} stopped", config::APP_NAME);
    served
}

fn build_transport(settings: &EmailSettings) -> Result<Box<dyn EmailTransport>, StartupError> {
    match &settings.endpoint {
        Some(endpoint) => {
            let transport = HttpEmailTransport::new(
                endpoint,
                settings.api_key.clone(),
                &settings.from,
                settings.timeout_secs,
            )?;
            Ok(Box::new(transport))
        }
        None => {
            tracing::warn!("No email endpoint configured; patient emails will only be logged");
            Ok(Box::new(LogTransport))
        }
    }
}
