use poolchat_api::assembly::language_model;
use poolchat_api::{check_health, RestClient};
use poolchat_core::config::{AppConfig, LlmProvider, LoadOptions};
use serde::Serialize;

use super::{escape_json, CommandResult, EXIT_CONFIG};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

const CONFIG_CHECK: &str = "config_validation";
const LLM_CHECK: &str = "llm_readiness";
const TELEGRAM_CHECK: &str = "telegram_readiness";
const UPSTREAM_CHECK: &str = "upstream_health";

pub fn run(json_output: bool) -> CommandResult {
    let report = build_report();
    let exit_code = if report.overall_status == CheckStatus::Fail { EXIT_CONFIG } else { 0 };

    let output = if json_output {
        serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        })
    } else {
        render_human(&report)
    };
    CommandResult { exit_code, output }
}

fn build_report() -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: CONFIG_CHECK,
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            });
            checks.push(check_llm(&config));
            checks.push(check_telegram(&config));
            checks.push(check_upstream(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: CONFIG_CHECK,
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            for name in [LLM_CHECK, TELEGRAM_CHECK, UPSTREAM_CHECK] {
                checks.push(DoctorCheck {
                    name,
                    status: CheckStatus::Skipped,
                    details: "skipped because configuration did not load".to_string(),
                });
            }
        }
    }

    let any_failed = checks.iter().any(|check| check.status == CheckStatus::Fail);
    let overall_status = if any_failed { CheckStatus::Fail } else { CheckStatus::Pass };
    let summary = if any_failed {
        "doctor: one or more readiness checks failed".to_string()
    } else {
        "doctor: all readiness checks passed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

fn check_llm(config: &AppConfig) -> DoctorCheck {
    match language_model(&config.llm) {
        Ok(Some(_)) => {
            let provider = match config.llm.provider {
                LlmProvider::OpenAi => "openai",
                LlmProvider::Ollama => "ollama",
            };
            DoctorCheck {
                name: LLM_CHECK,
                status: CheckStatus::Pass,
                details: format!("{provider} client ready for model `{}`", config.llm.model),
            }
        }
        Ok(None) => DoctorCheck {
            name: LLM_CHECK,
            status: CheckStatus::Fail,
            details: "no api key configured; advisory answers and geocoding are disabled"
                .to_string(),
        },
        Err(error) => {
            DoctorCheck { name: LLM_CHECK, status: CheckStatus::Fail, details: error.to_string() }
        }
    }
}

fn check_telegram(config: &AppConfig) -> DoctorCheck {
    if !config.telegram.enabled {
        return DoctorCheck {
            name: TELEGRAM_CHECK,
            status: CheckStatus::Skipped,
            details: "telegram transport disabled".to_string(),
        };
    }
    DoctorCheck {
        name: TELEGRAM_CHECK,
        status: CheckStatus::Pass,
        details: "bot token format validated by config contract".to_string(),
    }
}

fn check_upstream(config: &AppConfig) -> DoctorCheck {
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return DoctorCheck {
                name: UPSTREAM_CHECK,
                status: CheckStatus::Fail,
                details: format!("failed to initialize async runtime: {error}"),
            };
        }
    };

    let result = runtime.block_on(async {
        let client = RestClient::new(&config.api).map_err(|error| error.to_string())?;
        check_health(&client).await.map_err(|error| error.to_string())
    });

    match result {
        Ok(report) if report.is_healthy() => DoctorCheck {
            name: UPSTREAM_CHECK,
            status: CheckStatus::Pass,
            details: format!("`{}/health` reported `{}`", config.api.base_url, report.status),
        },
        Ok(report) => DoctorCheck {
            name: UPSTREAM_CHECK,
            status: CheckStatus::Fail,
            details: format!("`{}/health` reported `{}`", config.api.base_url, report.status),
        },
        Err(error) => {
            DoctorCheck { name: UPSTREAM_CHECK, status: CheckStatus::Fail, details: error }
        }
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}
