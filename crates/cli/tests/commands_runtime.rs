use std::env;
use std::sync::{Mutex, OnceLock};

use axum::routing::get;
use axum::{Json, Router};
use poolchat_cli::commands::{ask, config, doctor};
use poolchat_core::domain::fragment::REFUSAL_TEXT;
use serde_json::{json, Value};

const UNREACHABLE_API: &str = "http://127.0.0.1:9";

#[test]
fn config_redacts_secrets_and_reports_sources() {
    with_env(
        &[
            ("POOLCHAT_LLM_API_KEY", "sk-live-very-secret"),
            ("POOLCHAT_TELEGRAM_ENABLED", "true"),
            ("POOLCHAT_TELEGRAM_BOT_TOKEN", "123456:bot-secret"),
        ],
        || {
            let output = config::run();

            assert!(output.contains("- llm.api_key = sk-*** (source: env (POOLCHAT_LLM_API_KEY))"));
            assert!(output.contains("- telegram.bot_token = 123456:*** (source: env"));
            assert!(output.contains("- api.customer_id = HPTA (source: default)"));
            assert!(!output.contains("very-secret"));
            assert!(!output.contains("bot-secret"));
        },
    );
}

#[test]
fn config_reports_validation_failure_without_llm_key() {
    with_env(&[], || {
        let output = config::run();
        assert!(output.starts_with("config validation failed"), "got: {output}");
    });
}

#[test]
fn doctor_skips_checks_when_config_is_invalid() {
    with_env(&[], || {
        let result = doctor::run(true);
        assert_eq!(result.exit_code, 2);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["overall_status"], "fail");
        assert_eq!(payload["checks"][0]["name"], "config_validation");
        assert_eq!(payload["checks"][0]["status"], "fail");
        assert_eq!(payload["checks"][3]["status"], "skipped");
    });
}

#[test]
fn doctor_fails_when_upstream_is_unreachable() {
    with_env(
        &[
            ("POOLCHAT_LLM_API_KEY", "sk-test"),
            ("POOLCHAT_API_BASE_URL", UNREACHABLE_API),
            ("POOLCHAT_API_MAX_RETRIES", "0"),
        ],
        || {
            let result = doctor::run(true);
            let payload = parse_payload(&result.output);

            assert_eq!(payload["overall_status"], "fail");
            let upstream = check(&payload, "upstream_health");
            assert_eq!(upstream["status"], "fail");
            assert_eq!(check(&payload, "llm_readiness")["status"], "pass");
            assert_eq!(check(&payload, "telegram_readiness")["status"], "skipped");
        },
    );
}

#[test]
fn doctor_passes_against_a_healthy_upstream() {
    let runtime = tokio::runtime::Runtime::new().expect("runtime");
    let base_url = runtime.block_on(async {
        let health = || async { Json(json!({"status": "healthy"})) };
        let app = Router::new().route("/health", get(health));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let address = listener.local_addr().expect("local addr");
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("mock upstream");
        });
        format!("http://{address}")
    });

    with_env(&[("POOLCHAT_LLM_API_KEY", "sk-test"), ("POOLCHAT_API_BASE_URL", &base_url)], || {
        let result = doctor::run(false);

        assert_eq!(result.exit_code, 0, "got: {}", result.output);
        assert!(result.output.starts_with("doctor: all readiness checks passed"));
        assert!(result.output.contains("- [ok] upstream_health"));
    });
}

#[test]
fn ask_refuses_off_topic_questions_without_network() {
    with_env(
        &[
            ("POOLCHAT_LLM_API_KEY", "sk-test"),
            ("POOLCHAT_API_BASE_URL", UNREACHABLE_API),
            ("POOLCHAT_ORCHESTRATION_LLM_SYNTHESIS", "false"),
        ],
        || {
            let result = ask::run("what's the weather today", "cli-test");
            assert_eq!(result.exit_code, 0, "got: {}", result.output);

            let payload = parse_payload(&result.output);
            assert_eq!(payload["command"], "ask");
            assert_eq!(payload["status"], "ok");
            assert_eq!(payload["message"], REFUSAL_TEXT);
            assert_eq!(payload["data"]["scope"], "out_of_scope");
        },
    );
}

#[test]
fn ask_rejects_blank_questions() {
    let result = ask::run("   ", "cli-test");

    assert_eq!(result.exit_code, 2);
    assert_eq!(parse_payload(&result.output)["error_class"], "invalid_input");
}

fn check<'a>(payload: &'a Value, name: &str) -> &'a Value {
    payload["checks"]
        .as_array()
        .and_then(|checks| checks.iter().find(|check| check["name"] == name))
        .expect("check present")
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard = match ENV_LOCK.get_or_init(|| Mutex::new(())).lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };

    let keys = [
        "POOLCHAT_API_BASE_URL",
        "POOLCHAT_API_CUSTOMER_ID",
        "POOLCHAT_API_BRANCH_CODE",
        "POOLCHAT_API_SHIP_TO_SEQUENCE",
        "POOLCHAT_API_TIMEOUT_SECS",
        "POOLCHAT_API_MAX_RETRIES",
        "POOLCHAT_TELEGRAM_ENABLED",
        "POOLCHAT_TELEGRAM_BOT_TOKEN",
        "POOLCHAT_TELEGRAM_POLL_TIMEOUT_SECS",
        "TELEGRAM_BOT_TOKEN",
        "POOLCHAT_LLM_PROVIDER",
        "POOLCHAT_LLM_API_KEY",
        "OPENAI_API_KEY",
        "POOLCHAT_LLM_BASE_URL",
        "POOLCHAT_LLM_MODEL",
        "POOLCHAT_LLM_TIMEOUT_SECS",
        "POOLCHAT_LLM_MAX_RETRIES",
        "POOLCHAT_SERVER_BIND_ADDRESS",
        "POOLCHAT_SERVER_PORT",
        "POOLCHAT_SERVER_GRACEFUL_SHUTDOWN_SECS",
        "POOLCHAT_ORCHESTRATION_DISPATCH_TIMEOUT_MS",
        "POOLCHAT_ORCHESTRATION_CONFIDENCE_THRESHOLD",
        "POOLCHAT_ORCHESTRATION_CACHE_CAPACITY",
        "POOLCHAT_ORCHESTRATION_LLM_SYNTHESIS",
        "POOLCHAT_LOGGING_LEVEL",
        "POOLCHAT_LOGGING_FORMAT",
        "POOLCHAT_LOG_LEVEL",
        "POOLCHAT_LOG_FORMAT",
    ];

    let previous_values: Vec<(&str, Option<String>)> =
        keys.iter().map(|key| (*key, env::var(key).ok())).collect();

    for key in &keys {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, value) in previous_values {
        if let Some(value) = value {
            env::set_var(key, value);
        } else {
            env::remove_var(key);
        }
    }
}
