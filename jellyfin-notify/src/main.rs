use std::sync::Arc;

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use jellyfin_notify::api::{ApiServer, ApiServerConfig, AppState};
use jellyfin_notify::config::AppConfig;
use jellyfin_notify::database::{
    self,
    repositories::{SqlxContentLedger, SqlxMutedSeriesRepository, SqlxSubscriberRepository},
};
use jellyfin_notify::i18n::RustI18nCatalog;
use jellyfin_notify::ingest::IngestionGate;
use jellyfin_notify::logging;
use jellyfin_notify::media::JellyfinClient;
use jellyfin_notify::notification::{BroadcastService, Broadcaster, TelegramTransport};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let config = AppConfig::from_env().context("Failed to load configuration")?;

    let (logging_config, _log_guard) =
        logging::init_logging(&config.logging).context("Failed to initialize logging")?;

    let shutdown = CancellationToken::new();
    logging_config.start_retention_cleanup(shutdown.child_token());

    info!(
        version = env!("CARGO_PKG_VERSION"),
        database = %config.database_path,
        "Starting jellyfin-notify"
    );

    // Initialize database
    let pool = database::init_pool(&config.database_url())
        .await
        .context("Failed to open database")?;
    database::run_migrations(&pool)
        .await
        .context("Failed to run database migrations")?;

    let subscribers = Arc::new(SqlxSubscriberRepository::new(pool.clone()));
    let mutes = Arc::new(SqlxMutedSeriesRepository::new(pool.clone()));
    let ledger = Arc::new(SqlxContentLedger::new(pool.clone()));

    let transport = Arc::new(TelegramTransport::new(&config.telegram)?);
    let media = Arc::new(JellyfinClient::new(&config.jellyfin)?);
    let catalog = Arc::new(RustI18nCatalog::new(&config.default_language));

    let broadcaster = Broadcaster::new(subscribers, mutes, transport, media, catalog)
        .with_selection(config.selection.clone())
        .with_send_interval(config.broadcast.send_interval)
        .with_default_language(&config.default_language);

    let broadcast_service =
        BroadcastService::start(Arc::new(broadcaster), &config.broadcast, shutdown.child_token());

    let gate = IngestionGate::new(ledger, broadcast_service.clone());
    let state = AppState::new(gate, pool.clone(), &config.webhook.secret);
    let server = ApiServer::new(
        ApiServerConfig::from(&config.webhook),
        state,
        shutdown.child_token(),
    );

    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        signal_token.cancel();
    });

    if let Err(e) = server.run().await {
        error!(error = %e, "API server failed");
        shutdown.cancel();
    }

    broadcast_service.shutdown().await;
    pool.close().await;

    info!("Shutdown complete");
    Ok(())
}

/// Wait for Ctrl-C or, on Unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl-C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received Ctrl-C, starting graceful shutdown"),
        () = terminate => info!("Received SIGTERM, starting graceful shutdown"),
    }
}
