use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::intent::IntentKind;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub telegram: TelegramConfig,
    pub llm: LlmConfig,
    pub server: ServerConfig,
    pub orchestration: OrchestrationConfig,
    pub logging: LoggingConfig,
}

/// Connection settings for the product, pricing and store REST service.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    pub base_url: String,
    pub customer_id: String,
    pub branch_code: String,
    pub ship_to_sequence: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

#[derive(Clone, Debug)]
pub struct TelegramConfig {
    pub enabled: bool,
    pub bot_token: SecretString,
    pub api_base_url: String,
    pub poll_timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    pub api_key: Option<SecretString>,
    pub base_url: Option<String>,
    pub model: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct OrchestrationConfig {
    pub dispatch_timeout_ms: u64,
    pub confidence_threshold: f32,
    pub cache_capacity: usize,
    pub ttl: TtlConfig,
    pub context_max_turns: usize,
    pub context_idle_secs: u64,
    pub llm_synthesis: bool,
}

/// Cache lifetimes per intent, in seconds.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TtlConfig {
    pub product_search_secs: u64,
    pub product_detail_secs: u64,
    pub pricing_secs: u64,
    pub store_search_secs: u64,
    pub store_detail_secs: u64,
    pub advisory_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmProvider {
    #[serde(alias = "openai")]
    OpenAi,
    Ollama,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub api_base_url: Option<String>,
    pub log_level: Option<String>,
    pub llm_provider: Option<LlmProvider>,
    pub llm_model: Option<String>,
    pub llm_api_key: Option<String>,
    pub telegram_enabled: Option<bool>,
    pub telegram_bot_token: Option<String>,
    pub server_port: Option<u16>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api: ApiConfig {
                base_url: "http://localhost:8000".to_string(),
                customer_id: "HPTA".to_string(),
                branch_code: "BELHARR".to_string(),
                ship_to_sequence: "1".to_string(),
                timeout_secs: 10,
                max_retries: 3,
            },
            telegram: TelegramConfig {
                enabled: false,
                bot_token: String::new().into(),
                api_base_url: "https://api.telegram.org".to_string(),
                poll_timeout_secs: 30,
            },
            llm: LlmConfig {
                provider: LlmProvider::OpenAi,
                api_key: None,
                base_url: None,
                model: "gpt-4o".to_string(),
                timeout_secs: 30,
                max_retries: 2,
            },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 8080,
                graceful_shutdown_secs: 15,
            },
            orchestration: OrchestrationConfig {
                dispatch_timeout_ms: 8_000,
                confidence_threshold: 0.6,
                cache_capacity: 512,
                ttl: TtlConfig::default(),
                context_max_turns: 10,
                context_idle_secs: 1_800,
                llm_synthesis: true,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl Default for TtlConfig {
    fn default() -> Self {
        Self {
            product_search_secs: 1_800,
            product_detail_secs: 3_600,
            pricing_secs: 300,
            store_search_secs: 3_600,
            store_detail_secs: 86_400,
            advisory_secs: 900,
        }
    }
}

impl TtlConfig {
    /// Lifetime of a cached fragment for the given intent. `Unknown` is never cached.
    pub fn for_intent(&self, kind: IntentKind) -> Option<Duration> {
        let secs = match kind {
            IntentKind::ProductSearch => self.product_search_secs,
            IntentKind::ProductDetail => self.product_detail_secs,
            IntentKind::Pricing => self.pricing_secs,
            IntentKind::StoreSearch => self.store_search_secs,
            IntentKind::StoreDetail => self.store_detail_secs,
            IntentKind::Advisory => self.advisory_secs,
            IntentKind::Unknown => return None,
        };
        Some(Duration::from_secs(secs))
    }
}

impl OrchestrationConfig {
    pub fn dispatch_timeout(&self) -> Duration {
        Duration::from_millis(self.dispatch_timeout_ms)
    }

    pub fn context_idle(&self) -> Duration {
        Duration::from_secs(self.context_idle_secs)
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LlmProvider {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "openai" | "open_ai" => Ok(Self::OpenAi),
            "ollama" => Ok(Self::Ollama),
            other => Err(ConfigError::Validation(format!(
                "unsupported llm provider `{other}` (expected openai|ollama)"
            ))),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("poolchat.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(api) = patch.api {
            if let Some(base_url) = api.base_url {
                self.api.base_url = base_url;
            }
            if let Some(customer_id) = api.customer_id {
                self.api.customer_id = customer_id;
            }
            if let Some(branch_code) = api.branch_code {
                self.api.branch_code = branch_code;
            }
            if let Some(ship_to_sequence) = api.ship_to_sequence {
                self.api.ship_to_sequence = ship_to_sequence;
            }
            if let Some(timeout_secs) = api.timeout_secs {
                self.api.timeout_secs = timeout_secs;
            }
            if let Some(max_retries) = api.max_retries {
                self.api.max_retries = max_retries;
            }
        }

        if let Some(telegram) = patch.telegram {
            if let Some(enabled) = telegram.enabled {
                self.telegram.enabled = enabled;
            }
            if let Some(telegram_bot_token_value) = telegram.bot_token {
                self.telegram.bot_token = secret_value(telegram_bot_token_value);
            }
            if let Some(api_base_url) = telegram.api_base_url {
                self.telegram.api_base_url = api_base_url;
            }
            if let Some(poll_timeout_secs) = telegram.poll_timeout_secs {
                self.telegram.poll_timeout_secs = poll_timeout_secs;
            }
        }

        if let Some(llm) = patch.llm {
            if let Some(provider) = llm.provider {
                self.llm.provider = provider;
            }
            if let Some(llm_api_key_value) = llm.api_key {
                self.llm.api_key = Some(secret_value(llm_api_key_value));
            }
            if let Some(base_url) = llm.base_url {
                self.llm.base_url = Some(base_url);
            }
            if let Some(model) = llm.model {
                self.llm.model = model;
            }
            if let Some(timeout_secs) = llm.timeout_secs {
                self.llm.timeout_secs = timeout_secs;
            }
            if let Some(max_retries) = llm.max_retries {
                self.llm.max_retries = max_retries;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
        }

        if let Some(orchestration) = patch.orchestration {
            if let Some(dispatch_timeout_ms) = orchestration.dispatch_timeout_ms {
                self.orchestration.dispatch_timeout_ms = dispatch_timeout_ms;
            }
            if let Some(confidence_threshold) = orchestration.confidence_threshold {
                self.orchestration.confidence_threshold = confidence_threshold;
            }
            if let Some(cache_capacity) = orchestration.cache_capacity {
                self.orchestration.cache_capacity = cache_capacity;
            }
            if let Some(context_max_turns) = orchestration.context_max_turns {
                self.orchestration.context_max_turns = context_max_turns;
            }
            if let Some(context_idle_secs) = orchestration.context_idle_secs {
                self.orchestration.context_idle_secs = context_idle_secs;
            }
            if let Some(llm_synthesis) = orchestration.llm_synthesis {
                self.orchestration.llm_synthesis = llm_synthesis;
            }
            if let Some(ttl) = orchestration.ttl {
                let current = &mut self.orchestration.ttl;
                if let Some(value) = ttl.product_search_secs {
                    current.product_search_secs = value;
                }
                if let Some(value) = ttl.product_detail_secs {
                    current.product_detail_secs = value;
                }
                if let Some(value) = ttl.pricing_secs {
                    current.pricing_secs = value;
                }
                if let Some(value) = ttl.store_search_secs {
                    current.store_search_secs = value;
                }
                if let Some(value) = ttl.store_detail_secs {
                    current.store_detail_secs = value;
                }
                if let Some(value) = ttl.advisory_secs {
                    current.advisory_secs = value;
                }
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("POOLCHAT_API_BASE_URL") {
            self.api.base_url = value;
        }
        if let Some(value) = read_env("POOLCHAT_API_CUSTOMER_ID") {
            self.api.customer_id = value;
        }
        if let Some(value) = read_env("POOLCHAT_API_BRANCH_CODE") {
            self.api.branch_code = value;
        }
        if let Some(value) = read_env("POOLCHAT_API_SHIP_TO_SEQUENCE") {
            self.api.ship_to_sequence = value;
        }
        if let Some(value) = read_env("POOLCHAT_API_TIMEOUT_SECS") {
            self.api.timeout_secs = parse_u64("POOLCHAT_API_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("POOLCHAT_API_MAX_RETRIES") {
            self.api.max_retries = parse_u32("POOLCHAT_API_MAX_RETRIES", &value)?;
        }

        if let Some(value) = read_env("POOLCHAT_TELEGRAM_ENABLED") {
            self.telegram.enabled = parse_bool("POOLCHAT_TELEGRAM_ENABLED", &value)?;
        }
        let bot_token =
            read_env("POOLCHAT_TELEGRAM_BOT_TOKEN").or_else(|| read_env("TELEGRAM_BOT_TOKEN"));
        if let Some(value) = bot_token {
            self.telegram.bot_token = secret_value(value);
        }
        if let Some(value) = read_env("POOLCHAT_TELEGRAM_POLL_TIMEOUT_SECS") {
            self.telegram.poll_timeout_secs =
                parse_u64("POOLCHAT_TELEGRAM_POLL_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("POOLCHAT_LLM_PROVIDER") {
            self.llm.provider = value.parse()?;
        }
        let api_key = read_env("POOLCHAT_LLM_API_KEY").or_else(|| read_env("OPENAI_API_KEY"));
        if let Some(value) = api_key {
            self.llm.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("POOLCHAT_LLM_BASE_URL") {
            self.llm.base_url = Some(value);
        }
        if let Some(value) = read_env("POOLCHAT_LLM_MODEL") {
            self.llm.model = value;
        }
        if let Some(value) = read_env("POOLCHAT_LLM_TIMEOUT_SECS") {
            self.llm.timeout_secs = parse_u64("POOLCHAT_LLM_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("POOLCHAT_LLM_MAX_RETRIES") {
            self.llm.max_retries = parse_u32("POOLCHAT_LLM_MAX_RETRIES", &value)?;
        }

        if let Some(value) = read_env("POOLCHAT_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("POOLCHAT_SERVER_PORT") {
            self.server.port = parse_u16("POOLCHAT_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("POOLCHAT_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("POOLCHAT_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        if let Some(value) = read_env("POOLCHAT_ORCHESTRATION_DISPATCH_TIMEOUT_MS") {
            self.orchestration.dispatch_timeout_ms =
                parse_u64("POOLCHAT_ORCHESTRATION_DISPATCH_TIMEOUT_MS", &value)?;
        }
        if let Some(value) = read_env("POOLCHAT_ORCHESTRATION_CONFIDENCE_THRESHOLD") {
            self.orchestration.confidence_threshold =
                parse_f32("POOLCHAT_ORCHESTRATION_CONFIDENCE_THRESHOLD", &value)?;
        }
        if let Some(value) = read_env("POOLCHAT_ORCHESTRATION_CACHE_CAPACITY") {
            self.orchestration.cache_capacity =
                parse_usize("POOLCHAT_ORCHESTRATION_CACHE_CAPACITY", &value)?;
        }
        if let Some(value) = read_env("POOLCHAT_ORCHESTRATION_LLM_SYNTHESIS") {
            self.orchestration.llm_synthesis =
                parse_bool("POOLCHAT_ORCHESTRATION_LLM_SYNTHESIS", &value)?;
        }

        let log_level =
            read_env("POOLCHAT_LOGGING_LEVEL").or_else(|| read_env("POOLCHAT_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("POOLCHAT_LOGGING_FORMAT").or_else(|| read_env("POOLCHAT_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(api_base_url) = overrides.api_base_url {
            self.api.base_url = api_base_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(llm_provider) = overrides.llm_provider {
            self.llm.provider = llm_provider;
        }
        if let Some(llm_model) = overrides.llm_model {
            self.llm.model = llm_model;
        }
        if let Some(llm_api_key) = overrides.llm_api_key {
            self.llm.api_key = Some(secret_value(llm_api_key));
        }
        if let Some(enabled) = overrides.telegram_enabled {
            self.telegram.enabled = enabled;
        }
        if let Some(telegram_bot_token) = overrides.telegram_bot_token {
            self.telegram.bot_token = secret_value(telegram_bot_token);
        }
        if let Some(port) = overrides.server_port {
            self.server.port = port;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_api(&self.api)?;
        validate_telegram(&self.telegram)?;
        validate_llm(&self.llm)?;
        validate_server(&self.server)?;
        validate_orchestration(&self.orchestration)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("poolchat.toml"), PathBuf::from("config/poolchat.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_api(api: &ApiConfig) -> Result<(), ConfigError> {
    let base_url = api.base_url.trim();
    if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
        return Err(ConfigError::Validation(
            "api.base_url must start with http:// or https://".to_string(),
        ));
    }

    if api.customer_id.trim().is_empty() || api.branch_code.trim().is_empty() {
        return Err(ConfigError::Validation(
            "api.customer_id and api.branch_code are required for store-scoped requests"
                .to_string(),
        ));
    }

    if api.timeout_secs == 0 || api.timeout_secs > 120 {
        return Err(ConfigError::Validation("api.timeout_secs must be in range 1..=120".to_string()));
    }

    if api.max_retries > 10 {
        return Err(ConfigError::Validation("api.max_retries must be at most 10".to_string()));
    }

    Ok(())
}

fn validate_telegram(telegram: &TelegramConfig) -> Result<(), ConfigError> {
    if !telegram.enabled {
        return Ok(());
    }

    let bot_token = telegram.bot_token.expose_secret();
    if bot_token.trim().is_empty() {
        return Err(ConfigError::Validation(
            "telegram.bot_token is required when telegram.enabled is true. Get it from @BotFather"
                .to_string(),
        ));
    }
    if !bot_token.contains(':') {
        return Err(ConfigError::Validation(
            "telegram.bot_token must look like `<bot id>:<secret>` as issued by @BotFather"
                .to_string(),
        ));
    }

    if telegram.poll_timeout_secs == 0 || telegram.poll_timeout_secs > 60 {
        return Err(ConfigError::Validation(
            "telegram.poll_timeout_secs must be in range 1..=60".to_string(),
        ));
    }

    Ok(())
}

fn validate_llm(llm: &LlmConfig) -> Result<(), ConfigError> {
    if llm.timeout_secs == 0 || llm.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "llm.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    match llm.provider {
        LlmProvider::OpenAi => {
            let missing = llm
                .api_key
                .as_ref()
                .map(|value| value.expose_secret().trim().is_empty())
                .unwrap_or(true);
            if missing {
                return Err(ConfigError::Validation(
                    "llm.api_key is required for the openai provider".to_string(),
                ));
            }
        }
        LlmProvider::Ollama => {
            let missing =
                llm.base_url.as_ref().map(|value| value.trim().is_empty()).unwrap_or(true);
            if missing {
                return Err(ConfigError::Validation(
                    "llm.base_url is required for ollama provider".to_string(),
                ));
            }
        }
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_orchestration(orchestration: &OrchestrationConfig) -> Result<(), ConfigError> {
    if orchestration.dispatch_timeout_ms == 0 {
        return Err(ConfigError::Validation(
            "orchestration.dispatch_timeout_ms must be greater than zero".to_string(),
        ));
    }

    if !(0.0..=1.0).contains(&orchestration.confidence_threshold) {
        return Err(ConfigError::Validation(
            "orchestration.confidence_threshold must be in range 0.0..=1.0".to_string(),
        ));
    }

    if orchestration.cache_capacity == 0 {
        return Err(ConfigError::Validation(
            "orchestration.cache_capacity must be greater than zero".to_string(),
        ));
    }

    let ttl = &orchestration.ttl;
    let all_ttls = [
        ttl.product_search_secs,
        ttl.product_detail_secs,
        ttl.pricing_secs,
        ttl.store_search_secs,
        ttl.store_detail_secs,
        ttl.advisory_secs,
    ];
    if all_ttls.contains(&0) {
        return Err(ConfigError::Validation(
            "orchestration.ttl values must be greater than zero".to_string(),
        ));
    }
    if ttl.pricing_secs > ttl.product_detail_secs || ttl.pricing_secs > ttl.store_detail_secs {
        return Err(ConfigError::Validation(
            "orchestration.ttl.pricing_secs must not exceed product or store detail ttl"
                .to_string(),
        ));
    }

    if orchestration.context_max_turns == 0 {
        return Err(ConfigError::Validation(
            "orchestration.context_max_turns must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_usize(key: &str, value: &str) -> Result<usize, ConfigError> {
    value.parse::<usize>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_f32(key: &str, value: &str) -> Result<f32, ConfigError> {
    value.parse::<f32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    value.parse::<bool>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    api: Option<ApiPatch>,
    telegram: Option<TelegramPatch>,
    llm: Option<LlmPatch>,
    server: Option<ServerPatch>,
    orchestration: Option<OrchestrationPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct ApiPatch {
    base_url: Option<String>,
    customer_id: Option<String>,
    branch_code: Option<String>,
    ship_to_sequence: Option<String>,
    timeout_secs: Option<u64>,
    max_retries: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct TelegramPatch {
    enabled: Option<bool>,
    bot_token: Option<String>,
    api_base_url: Option<String>,
    poll_timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LlmPatch {
    provider: Option<LlmProvider>,
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    timeout_secs: Option<u64>,
    max_retries: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct OrchestrationPatch {
    dispatch_timeout_ms: Option<u64>,
    confidence_threshold: Option<f32>,
    cache_capacity: Option<usize>,
    context_max_turns: Option<usize>,
    context_idle_secs: Option<u64>,
    llm_synthesis: Option<bool>,
    ttl: Option<TtlPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct TtlPatch {
    product_search_secs: Option<u64>,
    product_detail_secs: Option<u64>,
    pricing_secs: Option<u64>,
    store_search_secs: Option<u64>,
    store_detail_secs: Option<u64>,
    advisory_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
