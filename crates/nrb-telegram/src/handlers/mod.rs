//! Telegram update handlers.
//!
//! Each update is converted to the messenger-agnostic `Inbound` model and
//! handed to the relay pipeline, which does authorization, classification
//! and all operator feedback.

use std::sync::Arc;

use teloxide::{prelude::*, types::Message};

use nrb_core::{
    domain::{ChatId, UserId},
    messaging::types::{Inbound, InboundMessage, StartCommand},
};

use crate::router::AppState;

mod commands;

pub use commands::{is_start, parse_command};

pub async fn handle_message(msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let inbound = inbound_from_message(&msg);
    let outcome = state.pipeline.handle(inbound).await;
    tracing::debug!(chat_id = msg.chat.id.0, "update handled: {outcome:?}");
    Ok(())
}

pub fn inbound_from_message(msg: &Message) -> Inbound {
    let chat_id = ChatId(msg.chat.id.0);
    let user = msg.from();
    let user_id = user.map(|u| UserId(u.id.0 as i64));
    let username = user.and_then(|u| u.username.clone());
    let forwarded = msg.forward_date().is_some();

    if !forwarded && msg.text().map(is_start).unwrap_or(false) {
        return Inbound::Start(StartCommand {
            chat_id,
            user_id,
            username,
        });
    }

    Inbound::Message(InboundMessage {
        chat_id,
        user_id,
        username,
        text: msg.text().map(str::to_string),
        caption: msg.caption().map(str::to_string),
        forwarded,
    })
}
