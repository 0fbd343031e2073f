pub const MAX_MESSAGE_CHARS: usize = 4096;

pub const WELCOME_TEXT: &str = "Hi! I'm your Pool Equipment Assistant.\n\n\
I can help you with:\n\
- Finding pool equipment products\n\
- Locating nearby stores\n\
- Checking product pricing\n\
- Providing technical advice\n\n\
Just ask me anything about pool equipment!";

pub const HELP_TEXT: &str = "How to use the Pool Equipment Assistant\n\n\
Example questions you can ask:\n\
- What pool pumps do you recommend?\n\
- Where is the nearest store to Atlanta, GA?\n\
- How much does a Hayward Super Pump cost?\n\
- How do I clean my pool filter?\n\
- What's the difference between sand and cartridge filters?\n\n\
Commands:\n\
/start - Start the bot\n\
/help - Show this help message\n\
/clear - Clear your conversation history";

pub const CLEARED_TEXT: &str = "Your conversation history has been cleared.";

pub const UNKNOWN_COMMAND_TEXT: &str =
    "I don't know that command. Send /help to see what I can do.";

pub const DEGRADED_REPLY: &str = "I'm sorry, I encountered an error while processing your \
request. Please try again later.";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BotCommand {
    Start,
    Help,
    Clear,
    Unknown(String),
}

/// Returns `None` for ordinary chat text. Group chats address bots as `/help@pool_bot`.
pub fn parse_command(text: &str) -> Option<BotCommand> {
    let first = text.trim_start().split_whitespace().next()?;
    let name = first.strip_prefix('/')?;
    let name = name.split('@').next().unwrap_or_default().to_ascii_lowercase();

    Some(match name.as_str() {
        "start" => BotCommand::Start,
        "help" => BotCommand::Help,
        "clear" => BotCommand::Clear,
        _ => BotCommand::Unknown(name),
    })
}

/// Caps the reply at `max_chars` characters, ending in `...` when cut.
pub fn truncate_message(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let keep = max_chars.saturating_sub(3);
    let mut truncated = text.chars().take(keep).collect::<String>();
    truncated.push_str("...");
    truncated
}

#[cfg(test)]
mod tests {
    use super::{parse_command, truncate_message, BotCommand, MAX_MESSAGE_CHARS};

    #[test]
    fn parses_known_commands_and_bot_mentions() {
        assert_eq!(parse_command("/start"), Some(BotCommand::Start));
        assert_eq!(parse_command("  /HELP please"), Some(BotCommand::Help));
        assert_eq!(parse_command("/clear@pool_bot"), Some(BotCommand::Clear));
        assert_eq!(parse_command("/quote"), Some(BotCommand::Unknown("quote".to_owned())));
        assert_eq!(parse_command("price of LZA406103A"), None);
        assert_eq!(parse_command(""), None);
    }

    #[test]
    fn long_replies_are_cut_with_an_ellipsis() {
        let long = "a".repeat(MAX_MESSAGE_CHARS + 50);
        let truncated = truncate_message(&long, MAX_MESSAGE_CHARS);

        assert_eq!(truncated.chars().count(), MAX_MESSAGE_CHARS);
        assert!(truncated.ends_with("..."));
        assert_eq!(truncate_message("short", MAX_MESSAGE_CHARS), "short");
    }

    #[test]
    fn truncation_counts_characters_not_bytes() {
        let text = "é".repeat(10);
        let truncated = truncate_message(&text, 6);
        assert_eq!(truncated, "ééé...");
    }
}
