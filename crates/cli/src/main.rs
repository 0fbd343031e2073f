use std::process::ExitCode;

fn main() -> ExitCode {
    poolchat_cli::run()
}
