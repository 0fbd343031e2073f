use std::sync::Arc;

use poolchat_agent::Coordinator;
use poolchat_api::{assemble, check_health, RestClient};
use poolchat_core::config::{AppConfig, ConfigError};
use poolchat_core::errors::ApplicationError;
use poolchat_messaging::{MessagingRunner, ReconnectPolicy, TelegramTransport, TransportError};
use thiserror::Error;
use tracing::{info, warn};

pub struct Application {
    pub config: AppConfig,
    pub coordinator: Arc<Coordinator>,
    pub rest: Arc<RestClient>,
    pub messaging: Option<MessagingRunner>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("assembly failed: {0}")]
    Assembly(#[from] ApplicationError),
    #[error("messaging transport could not be created: {0}")]
    Messaging(#[from] TransportError),
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let services = assemble(&config)?;
    probe_upstream(&services.rest).await;

    let coordinator = Arc::new(services.coordinator);
    let messaging = if config.telegram.enabled {
        let transport = TelegramTransport::new(&config.telegram)?;
        info!(
            event_name = "system.bootstrap.messaging_enabled",
            correlation_id = "bootstrap",
            transport = "telegram",
            "messaging transport configured"
        );
        Some(MessagingRunner::new(
            Arc::new(transport),
            coordinator.clone(),
            ReconnectPolicy::default(),
        ))
    } else {
        info!(
            event_name = "system.bootstrap.messaging_disabled",
            correlation_id = "bootstrap",
            "telegram disabled; serving http only"
        );
        None
    };

    Ok(Application { config, coordinator, rest: services.rest, messaging })
}

/// Startup continues when the upstream is down; specialists report failures per request.
async fn probe_upstream(rest: &RestClient) {
    match check_health(rest).await {
        Ok(report) if report.is_healthy() => info!(
            event_name = "system.bootstrap.upstream_healthy",
            correlation_id = "bootstrap",
            base_url = %rest.base_url(),
            "upstream api is healthy"
        ),
        Ok(report) => warn!(
            event_name = "system.bootstrap.upstream_degraded",
            correlation_id = "bootstrap",
            base_url = %rest.base_url(),
            status = %report.status,
            "upstream api reported a non-healthy status"
        ),
        Err(error) => warn!(
            event_name = "system.bootstrap.upstream_unreachable",
            correlation_id = "bootstrap",
            base_url = %rest.base_url(),
            error = %error,
            "upstream health check failed; continuing"
        ),
    }
}

#[cfg(test)]
mod tests {
    use poolchat_core::config::AppConfig;

    use super::bootstrap_with_config;

    #[tokio::test]
    async fn bootstraps_without_upstream_or_telegram() {
        let mut config = AppConfig::default();
        config.api.base_url = "http://127.0.0.1:9".to_owned();
        config.api.max_retries = 0;

        let app = bootstrap_with_config(config).await.expect("bootstrap tolerates a down upstream");

        assert!(app.messaging.is_none());
        assert_eq!(app.rest.base_url(), "http://127.0.0.1:9");
        assert!(app.coordinator.cache().is_empty());
    }
}
