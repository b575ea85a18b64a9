use crate::domain::{ChatId, UserId};

/// Messenger-agnostic incoming update.
///
/// Telegram-specific fields stay in the Telegram adapter.
#[derive(Clone, Debug)]
pub enum Inbound {
    Start(StartCommand),
    Message(InboundMessage),
}

#[derive(Clone, Debug)]
pub struct StartCommand {
    pub chat_id: ChatId,
    pub user_id: Option<UserId>,
    pub username: Option<String>,
}

/// One message event as delivered by the transport.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InboundMessage {
    pub chat_id: ChatId,
    pub user_id: Option<UserId>,
    pub username: Option<String>,
    pub text: Option<String>,
    pub caption: Option<String>,
    pub forwarded: bool,
}

impl Inbound {
    pub fn chat_id(&self) -> ChatId {
        match self {
            Inbound::Start(c) => c.chat_id,
            Inbound::Message(m) => m.chat_id,
        }
    }

    pub fn user_id(&self) -> Option<UserId> {
        match self {
            Inbound::Start(c) => c.user_id,
            Inbound::Message(m) => m.user_id,
        }
    }
}
