mod bootstrap;
mod chat;
mod health;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::Router;
use poolchat_agent::Coordinator;
use poolchat_core::config::{AppConfig, LoadOptions};
use tokio::sync::watch;

const HOUSEKEEPING_INTERVAL: Duration = Duration::from_secs(60);

fn init_logging(config: &AppConfig) {
    use poolchat_core::config::LogFormat::*;
    use tracing_subscriber::EnvFilter;

    let filter =
        EnvFilter::try_new(&config.logging.level).unwrap_or_else(|_| EnvFilter::new("info"));

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_env_filter(filter).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_env_filter(filter).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_env_filter(filter).json().init();
        }
    }
}

fn router(coordinator: Arc<Coordinator>) -> Router {
    chat::router(coordinator).merge(health::router())
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config).await?;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let address = format!("{}:{}", app.config.server.bind_address, app.config.server.port);
    let listener = tokio::net::TcpListener::bind(&address).await?;
    tracing::info!(
        event_name = "system.server.listening",
        correlation_id = "bootstrap",
        bind_address = %address,
        "http endpoints started"
    );
    let http = tokio::spawn({
        let router = router(app.coordinator.clone());
        let mut shutdown = shutdown_rx.clone();
        async move {
            let signal = async move {
                let _ = shutdown.wait_for(|stop| *stop).await;
            };
            if let Err(error) = axum::serve(listener, router).with_graceful_shutdown(signal).await {
                tracing::error!(
                    event_name = "system.server.error",
                    correlation_id = "bootstrap",
                    error = %error,
                    "http server terminated unexpectedly"
                );
            }
        }
    });

    let housekeeping = tokio::spawn(housekeeping(app.coordinator.clone(), shutdown_rx));
    let messaging = app.messaging.map(|runner| {
        tokio::spawn(async move {
            if let Err(error) = runner.start().await {
                tracing::warn!(
                    event_name = "system.server.messaging_stopped",
                    correlation_id = "bootstrap",
                    error = %error,
                    "messaging runner stopped"
                );
            }
        })
    });

    tracing::info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        "poolchat-server started"
    );
    wait_for_shutdown().await?;
    tracing::info!(
        event_name = "system.server.stopping",
        correlation_id = "shutdown",
        "poolchat-server stopping"
    );

    let _ = shutdown_tx.send(true);
    if let Some(messaging) = messaging {
        messaging.abort();
    }
    let grace = Duration::from_secs(app.config.server.graceful_shutdown_secs);
    if tokio::time::timeout(grace, http).await.is_err() {
        tracing::warn!(
            event_name = "system.server.shutdown_timeout",
            correlation_id = "shutdown",
            grace_secs = grace.as_secs(),
            "in-flight requests did not finish before the grace period"
        );
    }
    let _ = housekeeping.await;

    Ok(())
}

/// Evicts expired cache entries and idle conversations.
async fn housekeeping(coordinator: Arc<Coordinator>, mut shutdown: watch::Receiver<bool>) {
    let mut ticker = tokio::time::interval(HOUSEKEEPING_INTERVAL);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let cache_entries = coordinator.cache().prune_expired();
                let sessions = coordinator.contexts().prune_expired();
                if cache_entries + sessions > 0 {
                    tracing::debug!(
                        event_name = "system.housekeeping.pruned",
                        cache_entries,
                        sessions,
                        "expired state pruned"
                    );
                }
            }
            _ = shutdown.changed() => return,
        }
    }
}

async fn wait_for_shutdown() -> Result<()> {
    tokio::signal::ctrl_c().await?;
    Ok(())
}
