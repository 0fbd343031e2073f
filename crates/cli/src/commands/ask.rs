use poolchat_api::assemble;
use poolchat_core::config::{AppConfig, LoadOptions};
use poolchat_core::domain::query::{Query, SessionId};
use serde_json::json;

use super::{CommandResult, EXIT_ASSEMBLY, EXIT_CONFIG, EXIT_RUNTIME};

const COMMAND: &str = "ask";

pub fn run(message: &str, session: &str) -> CommandResult {
    if message.trim().is_empty() {
        return CommandResult::failure(
            COMMAND,
            "invalid_input",
            "message is required",
            EXIT_CONFIG,
        );
    }

    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                COMMAND,
                "config_validation",
                error.to_string(),
                EXIT_CONFIG,
            )
        }
    };

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                COMMAND,
                "runtime",
                format!("failed to initialize async runtime: {error}"),
                EXIT_RUNTIME,
            )
        }
    };

    runtime.block_on(async {
        let services = match assemble(&config) {
            Ok(services) => services,
            Err(error) => {
                return CommandResult::failure(
                    COMMAND,
                    "assembly",
                    error.to_string(),
                    EXIT_ASSEMBLY,
                )
            }
        };

        let query = Query::new(SessionId::new(session), message);
        let reply = services.coordinator.handle(query).await;
        CommandResult::success_with(
            COMMAND,
            reply.text,
            Some(json!({
                "correlation_id": reply.correlation_id,
                "session_id": session,
                "intents": reply.plan.kinds(),
                "scope": reply.verdict.decision.as_str(),
            })),
        )
    })
}
