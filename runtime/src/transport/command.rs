//! Operator commands recognized in inbound chat messages.

use super::ChatId;
use regex::Regex;
use std::sync::OnceLock;

/// Commands the bot responds to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Run a cycle now and reply with the results.
    Repeat,
    /// Show usage text.
    Help,
}

impl Command {
    /// Recognize a command at the start of a message. Accepts the
    /// `/cmd@botname` form Telegram uses in group chats.
    pub fn parse(text: &str) -> Option<Self> {
        static PATTERN: OnceLock<Regex> = OnceLock::new();
        let re = PATTERN.get_or_init(|| {
            Regex::new(r"^/(repeat|help)(?:@\w+)?(?:\s|$)").expect("static command pattern")
        });
        let caps = re.captures(text.trim_start())?;
        match &caps[1] {
            "repeat" => Some(Self::Repeat),
            "help" => Some(Self::Help),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Repeat => "repeat",
            Self::Help => "help",
        }
    }
}

/// One inbound command event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandReceived {
    pub command: Command,
    /// Chat the command was sent in; replies go here.
    pub chat: ChatId,
    pub user_id: Option<i64>,
    pub message_id: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!(Command::parse("/repeat"), Some(Command::Repeat));
        assert_eq!(Command::parse("/help"), Some(Command::Help));
        assert_eq!(Command::parse("/repeat@maker_bot"), Some(Command::Repeat));
        assert_eq!(Command::parse("  /repeat now please"), Some(Command::Repeat));
    }

    #[test]
    fn test_parse_rejects_other_text() {
        assert_eq!(Command::parse("repeat"), None);
        assert_eq!(Command::parse("/repeated"), None);
        assert_eq!(Command::parse("/start"), None);
        assert_eq!(Command::parse("please /repeat"), None);
        assert_eq!(Command::parse(""), None);
    }
}
