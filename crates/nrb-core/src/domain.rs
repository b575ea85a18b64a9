use std::fmt;

use crate::{errors::Error, Result};

/// Telegram user id (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct UserId(pub i64);

/// Telegram chat id (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ChatId(pub i64);

/// Telegram message id (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MessageId(pub i32);

/// A stable reference to a Telegram message. Used as the editable status handle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MessageRef {
    pub chat_id: ChatId,
    pub message_id: MessageId,
}

/// Broadcast target for rewritten posts.
///
/// Telegram accepts either a numeric chat id (`-100…` for channels) or a public
/// channel username (`@name`).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Destination {
    Chat(ChatId),
    Username(String),
}

impl Destination {
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(Error::Config("broadcast destination is empty".to_string()));
        }
        if let Ok(id) = raw.parse::<i64>() {
            return Ok(Destination::Chat(ChatId(id)));
        }
        let name = raw.trim_start_matches('@');
        if name.is_empty() || name.chars().any(char::is_whitespace) {
            return Err(Error::Config(format!(
                "invalid broadcast destination: {raw}"
            )));
        }
        Ok(Destination::Username(format!("@{name}")))
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Destination::Chat(id) => write!(f, "{}", id.0),
            Destination::Username(name) => f.write_str(name),
        }
    }
}
