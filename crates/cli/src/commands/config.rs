use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use poolchat_core::config::{AppConfig, LoadOptions};
use secrecy::ExposeSecret;
use toml::Value;

struct Field {
    key: &'static str,
    env_keys: &'static [&'static str],
    value: String,
}

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for field in fields(&config) {
        let source = field_source(
            field.key,
            field.env_keys,
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        );
        lines.push(format!("- {} = {} (source: {source})", field.key, field.value));
    }
    lines.join("\n")
}

fn fields(config: &AppConfig) -> Vec<Field> {
    let ttl = &config.orchestration.ttl;
    let llm_api_key = match &config.llm.api_key {
        Some(key) => redact_secret(key.expose_secret()),
        None => "<unset>".to_string(),
    };

    vec![
        Field {
            key: "api.base_url",
            env_keys: &["POOLCHAT_API_BASE_URL"],
            value: config.api.base_url.clone(),
        },
        Field {
            key: "api.customer_id",
            env_keys: &["POOLCHAT_API_CUSTOMER_ID"],
            value: config.api.customer_id.clone(),
        },
        Field {
            key: "api.branch_code",
            env_keys: &["POOLCHAT_API_BRANCH_CODE"],
            value: config.api.branch_code.clone(),
        },
        Field {
            key: "api.ship_to_sequence",
            env_keys: &["POOLCHAT_API_SHIP_TO_SEQUENCE"],
            value: config.api.ship_to_sequence.clone(),
        },
        Field {
            key: "api.timeout_secs",
            env_keys: &["POOLCHAT_API_TIMEOUT_SECS"],
            value: config.api.timeout_secs.to_string(),
        },
        Field {
            key: "api.max_retries",
            env_keys: &["POOLCHAT_API_MAX_RETRIES"],
            value: config.api.max_retries.to_string(),
        },
        Field {
            key: "llm.provider",
            env_keys: &["POOLCHAT_LLM_PROVIDER"],
            value: format!("{:?}", config.llm.provider),
        },
        Field {
            key: "llm.model",
            env_keys: &["POOLCHAT_LLM_MODEL"],
            value: config.llm.model.clone(),
        },
        Field {
            key: "llm.base_url",
            env_keys: &["POOLCHAT_LLM_BASE_URL"],
            value: config.llm.base_url.clone().unwrap_or_else(|| "<unset>".to_string()),
        },
        Field {
            key: "llm.api_key",
            env_keys: &["POOLCHAT_LLM_API_KEY", "OPENAI_API_KEY"],
            value: llm_api_key,
        },
        Field {
            key: "telegram.enabled",
            env_keys: &["POOLCHAT_TELEGRAM_ENABLED"],
            value: config.telegram.enabled.to_string(),
        },
        Field {
            key: "telegram.bot_token",
            env_keys: &["POOLCHAT_TELEGRAM_BOT_TOKEN", "TELEGRAM_BOT_TOKEN"],
            value: redact_secret(config.telegram.bot_token.expose_secret()),
        },
        Field {
            key: "telegram.poll_timeout_secs",
            env_keys: &["POOLCHAT_TELEGRAM_POLL_TIMEOUT_SECS"],
            value: config.telegram.poll_timeout_secs.to_string(),
        },
        Field {
            key: "server.bind_address",
            env_keys: &["POOLCHAT_SERVER_BIND_ADDRESS"],
            value: config.server.bind_address.clone(),
        },
        Field {
            key: "server.port",
            env_keys: &["POOLCHAT_SERVER_PORT"],
            value: config.server.port.to_string(),
        },
        Field {
            key: "orchestration.dispatch_timeout_ms",
            env_keys: &["POOLCHAT_ORCHESTRATION_DISPATCH_TIMEOUT_MS"],
            value: config.orchestration.dispatch_timeout_ms.to_string(),
        },
        Field {
            key: "orchestration.confidence_threshold",
            env_keys: &["POOLCHAT_ORCHESTRATION_CONFIDENCE_THRESHOLD"],
            value: config.orchestration.confidence_threshold.to_string(),
        },
        Field {
            key: "orchestration.cache_capacity",
            env_keys: &["POOLCHAT_ORCHESTRATION_CACHE_CAPACITY"],
            value: config.orchestration.cache_capacity.to_string(),
        },
        Field {
            key: "orchestration.ttl",
            env_keys: &[],
            value: format!(
                "pricing={}s product_search={}s product_detail={}s store_search={}s \
                 store_detail={}s advisory={}s",
                ttl.pricing_secs,
                ttl.product_search_secs,
                ttl.product_detail_secs,
                ttl.store_search_secs,
                ttl.store_detail_secs,
                ttl.advisory_secs
            ),
        },
        Field {
            key: "orchestration.llm_synthesis",
            env_keys: &["POOLCHAT_ORCHESTRATION_LLM_SYNTHESIS"],
            value: config.orchestration.llm_synthesis.to_string(),
        },
        Field {
            key: "logging.level",
            env_keys: &["POOLCHAT_LOGGING_LEVEL", "POOLCHAT_LOG_LEVEL"],
            value: config.logging.level.clone(),
        },
        Field {
            key: "logging.format",
            env_keys: &["POOLCHAT_LOGGING_FORMAT", "POOLCHAT_LOG_FORMAT"],
            value: format!("{:?}", config.logging.format),
        },
    ]
}

fn detect_config_path() -> Option<PathBuf> {
    [PathBuf::from("poolchat.toml"), PathBuf::from("config/poolchat.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

/// Keeps only the non-secret prefix: `sk-***` for API keys, `123456:***` for bot tokens.
fn redact_secret(secret: &str) -> String {
    let trimmed = secret.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    if let Some((prefix, _)) = trimmed.split_once(':') {
        return format!("{prefix}:***");
    }
    if let Some((prefix, _)) = trimmed.split_once('-') {
        return format!("{prefix}-***");
    }

    "<redacted>".to_string()
}

#[cfg(test)]
mod tests {
    use super::redact_secret;

    #[test]
    fn secrets_keep_only_their_prefix() {
        assert_eq!(redact_secret("sk-live-abcdef"), "sk-***");
        assert_eq!(redact_secret("123456789:AAH-secret"), "123456789:***");
        assert_eq!(redact_secret("opaque"), "<redacted>");
        assert_eq!(redact_secret("  "), "<empty>");
    }
}
