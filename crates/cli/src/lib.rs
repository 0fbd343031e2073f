pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "poolchat",
    about = "Poolchat operator CLI",
    long_about = "Inspect configuration, check readiness of the upstream services, and ask the \
                  assistant one-off questions.",
    after_help = "Examples:\n  poolchat doctor --json\n  poolchat config\n  \
                  poolchat ask \"price of LZA406103A\""
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, model readiness, Telegram token and upstream health")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Send one question through the live coordinator and print the reply")]
    Ask {
        #[arg(help = "The question, as a customer would type it")]
        message: String,
        #[arg(long, default_value = "cli", help = "Conversation session to use")]
        session: String,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => commands::doctor::run(json),
        Command::Ask { message, session } => commands::ask::run(&message, &session),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
