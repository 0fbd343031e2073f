//! Shared HTTP plumbing for the product, pricing and store services.

use std::time::Duration;

use poolchat_core::config::ApiConfig;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::ApiError;

pub const CUSTOMER_HEADER: &str = "x-customer-id";
pub const BRANCH_HEADER: &str = "x-branch-code";
pub const SHIP_TO_HEADER: &str = "x-ship-to-sequence";

/// Exponential backoff between attempts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    pub fn with_max_retries(max_retries: u32) -> Self {
        Self { max_retries, ..Self::default() }
    }

    /// Delay before retry number `retry` (zero based).
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = 2_u32.saturating_pow(retry);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

#[derive(Clone, Debug)]
pub struct RestClient {
    http: reqwest::Client,
    base_url: String,
    retry: RetryPolicy,
}

impl RestClient {
    pub fn new(config: &ApiConfig) -> Result<Self, ApiError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        for (name, value) in [
            (CUSTOMER_HEADER, &config.customer_id),
            (BRANCH_HEADER, &config.branch_code),
            (SHIP_TO_HEADER, &config.ship_to_sequence),
        ] {
            let value = HeaderValue::from_str(value).map_err(|error| {
                ApiError::Configuration(format!("header `{name}` is not valid: {error}"))
            })?;
            headers.insert(HeaderName::from_static(name), value);
        }

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .default_headers(headers)
            .build()
            .map_err(|error| ApiError::Configuration(error.to_string()))?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            retry: RetryPolicy::with_max_retries(config.max_retries),
        })
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    pub async fn get_json<T>(&self, path: &str, query: &[(&str, String)]) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
    {
        let url = self.url(path);
        let response = self
            .send_with_retry(&url, || self.http.request(Method::GET, &url).query(query))
            .await?;
        decode(&url, response).await
    }

    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.url(path);
        let response =
            self.send_with_retry(&url, || self.http.request(Method::POST, &url).json(body)).await?;
        decode(&url, response).await
    }

    async fn send_with_retry<F>(&self, url: &str, build: F) -> Result<Response, ApiError>
    where
        F: Fn() -> RequestBuilder,
    {
        let mut retry = 0;
        loop {
            let error = match build().send().await {
                Ok(response) if response.status().is_success() => return Ok(response),
                Ok(response) => status_error(url, response).await,
                Err(error) => ApiError::Transport {
                    url: url.to_string(),
                    message: error.to_string(),
                    timed_out: error.is_timeout(),
                },
            };

            if !error.is_retryable() || retry >= self.retry.max_retries {
                tracing::warn!(
                    event_name = "upstream.request.failed",
                    url,
                    attempts = retry + 1,
                    error = %error,
                    "upstream request failed"
                );
                return Err(error);
            }

            let delay = self.retry.delay_for(retry);
            tracing::debug!(
                event_name = "upstream.request.retrying",
                url,
                retry = retry + 1,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                error = %error,
                "retrying upstream request"
            );
            tokio::time::sleep(delay).await;
            retry += 1;
        }
    }
}

async fn status_error(url: &str, response: Response) -> ApiError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    let detail = serde_json::from_str::<Value>(&body)
        .ok()
        .and_then(|value| value.get("detail").map(detail_text))
        .unwrap_or(body);
    ApiError::Status { url: url.to_string(), status, detail }
}

fn detail_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

async fn decode<T>(url: &str, response: Response) -> Result<T, ApiError>
where
    T: DeserializeOwned,
{
    let body = response.text().await.map_err(|error| ApiError::Transport {
        url: url.to_string(),
        message: error.to_string(),
        timed_out: error.is_timeout(),
    })?;
    serde_json::from_str(&body)
        .map_err(|error| ApiError::Decode { url: url.to_string(), message: error.to_string() })
}
