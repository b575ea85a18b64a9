//! Telegram adapter (teloxide).
//!
//! Implements the `nrb-core` MessagingPort over the Telegram Bot API and runs
//! the update dispatcher.

use async_trait::async_trait;

use teloxide::{
    prelude::*,
    types::{ParseMode, Recipient},
    RequestError,
};

use tokio::time::sleep;

pub mod handlers;
pub mod router;

use nrb_core::{
    domain::{ChatId, Destination, MessageId, MessageRef},
    errors::Error,
    messaging::port::MessagingPort,
    Result,
};

#[derive(Clone)]
pub struct TelegramMessenger {
    bot: Bot,
}

impl TelegramMessenger {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }

    fn tg_chat(chat_id: ChatId) -> teloxide::types::ChatId {
        teloxide::types::ChatId(chat_id.0)
    }

    fn tg_msg_id(message_id: MessageId) -> teloxide::types::MessageId {
        teloxide::types::MessageId(message_id.0)
    }

    fn recipient(destination: &Destination) -> Recipient {
        match destination {
            Destination::Chat(id) => Recipient::Id(Self::tg_chat(*id)),
            Destination::Username(name) => Recipient::ChannelUsername(name.clone()),
        }
    }

    fn map_err(e: RequestError) -> Error {
        Error::External(format!("telegram error: {e}"))
    }

    async fn with_retry<T, Fut>(&self, mut op: impl FnMut() -> Fut) -> Result<T>
    where
        Fut: std::future::IntoFuture<Output = std::result::Result<T, RequestError>>,
        Fut::IntoFuture: Send,
    {
        const MAX_RETRIES: usize = 1;
        let mut attempts = 0usize;
        loop {
            match op().await {
                Ok(v) => return Ok(v),
                Err(e) => match e {
                    RequestError::RetryAfter(d) if attempts < MAX_RETRIES => {
                        attempts += 1;
                        tracing::warn!("telegram flood wait, retrying after {d:?}");
                        sleep(d).await;
                        continue;
                    }
                    other => return Err(Self::map_err(other)),
                },
            }
        }
    }
}

/// Classify a Telegram failure that happened while bootstrapping.
///
/// Network and I/O failures are transient and restartable; API errors such as
/// a revoked token are not. A non-JSON body is what a 502/504 gateway page
/// from Telegram's front end turns into, so it counts as network trouble too.
pub fn startup_error(e: RequestError) -> Error {
    let network = matches!(
        e,
        RequestError::Network(_) | RequestError::Io(_) | RequestError::InvalidJson { .. }
    );
    Error::Transport {
        message: format!("telegram error: {e}"),
        network,
    }
}

#[async_trait]
impl MessagingPort for TelegramMessenger {
    async fn send_text(&self, chat_id: ChatId, text: &str) -> Result<MessageRef> {
        let msg = self
            .with_retry(|| {
                self.bot
                    .send_message(Self::tg_chat(chat_id), text.to_string())
            })
            .await?;

        Ok(MessageRef {
            chat_id,
            message_id: MessageId(msg.id.0),
        })
    }

    async fn edit_text(&self, msg: MessageRef, text: &str) -> Result<()> {
        self.with_retry(|| {
            self.bot.edit_message_text(
                Self::tg_chat(msg.chat_id),
                Self::tg_msg_id(msg.message_id),
                text.to_string(),
            )
        })
        .await?;
        Ok(())
    }

    async fn publish_html(&self, destination: &Destination, html: &str) -> Result<MessageRef> {
        let msg = self
            .with_retry(|| {
                self.bot
                    .send_message(Self::recipient(destination), html.to_string())
                    .parse_mode(ParseMode::Html)
            })
            .await
            .map_err(|e| Error::Publish(e.cause()))?;

        Ok(MessageRef {
            chat_id: ChatId(msg.chat.id.0),
            message_id: MessageId(msg.id.0),
        })
    }
}
