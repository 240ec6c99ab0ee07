use spooky_common::{Direction, ObjectId};
use std::fmt;
use std::str::FromStr;

/// A high-level request a client session can make.
///
/// Transports decode their wire format into commands; the server only ever
/// sees commands, never raw input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Turn toward, or step in, a direction.
    Move(Direction),
    /// Act on the tile being faced.
    Action,
    /// Drop a held item onto the tile being faced.
    Drop(ObjectId),
    /// Say something on the shared log.
    Chat(String),
    Leave,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseCommandError {
    #[error("empty command")]
    Empty,
    #[error("unknown command {0:?}")]
    Unknown(String),
    #[error("{0} needs an argument")]
    MissingArgument(&'static str),
}

impl FromStr for Command {
    type Err = ParseCommandError;

    /// Parse the line protocol: `NORTH`, `ACTION`, `DROP <item>`,
    /// `CHAT <text>` or `LEAVE`. Keywords are case-insensitive.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (word, rest) = match s.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (s, ""),
        };
        if word.is_empty() {
            return Err(ParseCommandError::Empty);
        }
        if let Ok(direction) = word.parse::<Direction>() {
            return Ok(Command::Move(direction));
        }
        match word.to_ascii_uppercase().as_str() {
            "ACTION" => Ok(Command::Action),
            "LEAVE" => Ok(Command::Leave),
            "DROP" if rest.is_empty() => Err(ParseCommandError::MissingArgument("DROP")),
            "DROP" => Ok(Command::Drop(ObjectId::from(rest))),
            "CHAT" if rest.is_empty() => Err(ParseCommandError::MissingArgument("CHAT")),
            "CHAT" => Ok(Command::Chat(rest.to_string())),
            _ => Err(ParseCommandError::Unknown(word.to_string())),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Move(direction) => write!(f, "{direction}"),
            Command::Action => f.write_str("ACTION"),
            Command::Drop(item) => write!(f, "DROP {item}"),
            Command::Chat(text) => write!(f, "CHAT {text}"),
            Command::Leave => f.write_str("LEAVE"),
        }
    }
}
