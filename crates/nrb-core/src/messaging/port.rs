use async_trait::async_trait;

use crate::{
    domain::{ChatId, Destination, MessageRef},
    Result,
};

/// Outbound messenger port.
///
/// Replies and status edits are plain text; broadcast posts are rendered as HTML.
#[async_trait]
pub trait MessagingPort: Send + Sync {
    async fn send_text(&self, chat_id: ChatId, text: &str) -> Result<MessageRef>;
    async fn edit_text(&self, msg: MessageRef, text: &str) -> Result<()>;

    async fn publish_html(&self, destination: &Destination, html: &str) -> Result<MessageRef>;
}
