//! OpenAI-compatible chat completions client. Ollama serves the same API under `/v1`.

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use poolchat_agent::llm::{LlmClient, PromptContext, Role};
use poolchat_core::config::{LlmConfig, LlmProvider};
use reqwest::header::{HeaderValue, AUTHORIZATION};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::client::RetryPolicy;

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const OLLAMA_BASE_URL: &str = "http://localhost:11434/v1";

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

pub struct ChatCompletionsClient {
    http: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: Option<SecretString>,
    retry: RetryPolicy,
}

impl ChatCompletionsClient {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let base_url = config.base_url.clone().unwrap_or_else(|| {
            match config.provider {
                LlmProvider::OpenAi => OPENAI_BASE_URL,
                LlmProvider::Ollama => OLLAMA_BASE_URL,
            }
            .to_string()
        });
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()
            .context("failed to build llm http client")?;

        Ok(Self {
            http,
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            model: config.model.clone(),
            api_key: config.api_key.clone(),
            retry: RetryPolicy::with_max_retries(config.max_retries),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn attempt(&self, body: &ChatRequest<'_>) -> Result<String, (bool, anyhow::Error)> {
        let mut request = self.http.post(&self.endpoint).json(body);
        if let Some(key) = &self.api_key {
            let value = HeaderValue::from_str(&format!("Bearer {}", key.expose_secret()))
                .map_err(|error| (false, anyhow!("invalid api key header: {error}")))?;
            request = request.header(AUTHORIZATION, value);
        }

        let response = request
            .send()
            .await
            .map_err(|error| (true, anyhow!("llm request failed: {error}")))?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let retryable = status.is_server_error() || status.as_u16() == 429;
            return Err((retryable, anyhow!("llm answered HTTP {status}: {text}")));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|error| (false, anyhow!("llm response was not valid JSON: {error}")))?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| (false, anyhow!("llm response had no choices")))
    }
}

#[async_trait]
impl LlmClient for ChatCompletionsClient {
    async fn complete(&self, prompt: &PromptContext) -> Result<String> {
        let body = ChatRequest {
            model: &self.model,
            messages: prompt
                .messages
                .iter()
                .map(|message| ChatMessage {
                    role: role_name(message.role),
                    content: &message.content,
                })
                .collect(),
            temperature: prompt.temperature,
            max_tokens: prompt.max_tokens,
        };

        let mut retry = 0;
        loop {
            match self.attempt(&body).await {
                Ok(content) => return Ok(content),
                Err((retryable, error)) if retryable && retry < self.retry.max_retries => {
                    let delay = self.retry.delay_for(retry);
                    tracing::debug!(
                        event_name = "llm.request.retrying",
                        retry = retry + 1,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %error,
                        "retrying llm request"
                    );
                    tokio::time::sleep(delay).await;
                    retry += 1;
                }
                Err((_, error)) => return Err(error),
            }
        }
    }
}

fn role_name(role: Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
    }
}

#[cfg(test)]
mod tests {
    use poolchat_core::config::{AppConfig, LlmProvider};

    use super::ChatCompletionsClient;

    #[test]
    fn endpoint_follows_provider_and_base_url() {
        let mut config = AppConfig::default().llm;
        let openai = ChatCompletionsClient::new(&config).expect("client builds");
        assert_eq!(openai.endpoint(), "https://api.openai.com/v1/chat/completions");

        config.provider = LlmProvider::Ollama;
        let ollama = ChatCompletionsClient::new(&config).expect("client builds");
        assert_eq!(ollama.endpoint(), "http://localhost:11434/v1/chat/completions");

        config.base_url = Some("http://gateway.internal/v1/".to_owned());
        let custom = ChatCompletionsClient::new(&config).expect("client builds");
        assert_eq!(custom.endpoint(), "http://gateway.internal/v1/chat/completions");
    }
}
