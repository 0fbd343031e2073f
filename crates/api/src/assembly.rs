//! Wires the REST adapters and the model client into a ready coordinator.

use std::sync::Arc;

use poolchat_agent::llm::{DisabledLlmClient, LlmClient};
use poolchat_agent::specialists::store::LlmGeocoder;
use poolchat_agent::specialists::SpecialistRegistry;
use poolchat_agent::Coordinator;
use poolchat_core::config::{AppConfig, LlmConfig, LlmProvider};
use poolchat_core::errors::ApplicationError;

use crate::client::RestClient;
use crate::llm::ChatCompletionsClient;
use crate::services::{HttpPricingService, HttpProductCatalog, HttpStoreDirectory};

pub struct Services {
    pub coordinator: Coordinator,
    pub rest: Arc<RestClient>,
    pub llm_enabled: bool,
}

/// OpenAI needs a key; a local Ollama does not.
pub fn language_model(config: &LlmConfig) -> Result<Option<Arc<dyn LlmClient>>, ApplicationError> {
    if config.provider == LlmProvider::OpenAi && config.api_key.is_none() {
        return Ok(None);
    }
    let client = ChatCompletionsClient::new(config)
        .map_err(|error| ApplicationError::Configuration(error.to_string()))?;
    Ok(Some(Arc::new(client)))
}

pub fn assemble(config: &AppConfig) -> Result<Services, ApplicationError> {
    let rest = Arc::new(
        RestClient::new(&config.api)
            .map_err(|error| ApplicationError::Configuration(error.to_string()))?,
    );

    let (llm, llm_enabled): (Arc<dyn LlmClient>, bool) = match language_model(&config.llm)? {
        Some(client) => (client, true),
        None => {
            tracing::warn!(
                event_name = "system.bootstrap.llm_disabled",
                "no llm api key configured; advisory answers and geocoding are unavailable"
            );
            (Arc::new(DisabledLlmClient), false)
        }
    };

    let registry = SpecialistRegistry::standard(
        Arc::new(HttpProductCatalog::new(Arc::clone(&rest))),
        Arc::new(HttpPricingService::new(Arc::clone(&rest))),
        Arc::new(HttpStoreDirectory::new(Arc::clone(&rest))),
        Arc::new(LlmGeocoder::new(Arc::clone(&llm))),
        Arc::clone(&llm),
    );

    let coordinator = Coordinator::new(&config.orchestration, llm, registry)
        .map_err(|error| ApplicationError::Configuration(error.to_string()))?;

    tracing::info!(
        event_name = "system.bootstrap.coordinator_ready",
        api_base_url = %rest.base_url(),
        llm_enabled,
        "coordinator assembled"
    );
    Ok(Services { coordinator, rest, llm_enabled })
}
