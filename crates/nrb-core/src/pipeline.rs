//! Per-event relay pipeline.
//!
//! Received → authorized → classified → acknowledged → generated → published,
//! with every terminal state reported back to the operator through a reply or
//! an edit of the acknowledgment message.

use std::sync::Arc;

use crate::{
    domain::{ChatId, Destination, MessageRef},
    messaging::{
        port::MessagingPort,
        types::{Inbound, InboundMessage},
    },
    rewrite::Rewriter,
    security::{AuthGate, UNAUTHORIZED_REPLY},
    utils::truncate_text,
};

pub const START_REPLY: &str = "Бот запущено! Пересилайте мені новини, і я перетворю їх на інсайдерські пости для вашого телеграм-каналу.";
pub const PROCESSING_REPLY: &str = "Обробка вашого запиту...";
pub const PUBLISHED_REPLY: &str = "✅ Повідомлення було переписано та опубліковано у каналі!";

const MAX_CAUSE_LEN: usize = 200;
const LOG_PREVIEW_LEN: usize = 50;

pub fn generation_error_reply(cause: &str) -> String {
    format!("❌ Помилка обробки повідомлення: {cause}")
}

pub fn publish_error_reply(cause: &str) -> String {
    format!("❌ Помилка публікації у телеграм: {cause}")
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Rejection {
    ForwardedWithoutText,
    NoText,
}

impl Rejection {
    pub fn reply(self) -> &'static str {
        match self {
            Rejection::ForwardedWithoutText => "У пересланому повідомленні не знайдено тексту.",
            Rejection::NoText => "Немає тексту для обробки.",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Classification {
    Extracted(String),
    Rejected(Rejection),
}

/// Decide whether a message carries usable text.
///
/// Forwarded messages only count their body; direct messages fall back to the
/// caption. Blank strings count as absent.
pub fn classify(msg: &InboundMessage) -> Classification {
    let body = non_blank(msg.text.as_deref());

    if msg.forwarded {
        return match body {
            Some(text) => Classification::Extracted(text.to_string()),
            None => Classification::Rejected(Rejection::ForwardedWithoutText),
        };
    }

    match body.or_else(|| non_blank(msg.caption.as_deref())) {
        Some(text) => Classification::Extracted(text.to_string()),
        None => Classification::Rejected(Rejection::NoText),
    }
}

fn non_blank(s: Option<&str>) -> Option<&str> {
    s.filter(|s| !s.trim().is_empty())
}

/// Terminal state of one inbound event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    Unauthorized,
    Started,
    Rejected(Rejection),
    /// The acknowledgment could not be sent; nothing else was attempted.
    AckFailed,
    GenerationFailed {
        status: MessageRef,
        cause: String,
    },
    PublishFailed {
        status: MessageRef,
        cause: String,
    },
    Published {
        status: MessageRef,
        post: MessageRef,
    },
}

pub struct RelayPipeline {
    gate: AuthGate,
    rewriter: Arc<dyn Rewriter>,
    messenger: Arc<dyn MessagingPort>,
    destination: Destination,
}

impl RelayPipeline {
    pub fn new(
        gate: AuthGate,
        rewriter: Arc<dyn Rewriter>,
        messenger: Arc<dyn MessagingPort>,
        destination: Destination,
    ) -> Self {
        Self {
            gate,
            rewriter,
            messenger,
            destination,
        }
    }

    /// Handle one inbound event end to end. Never fails: every error is
    /// turned into operator-visible feedback and reported in the outcome.
    pub async fn handle(&self, update: Inbound) -> Outcome {
        let chat_id = update.chat_id();
        let user_id = update.user_id();

        if !self.gate.is_allowed(user_id) {
            tracing::warn!(
                user_id = ?user_id.map(|u| u.0),
                "Unauthorized access denied"
            );
            self.reply(chat_id, UNAUTHORIZED_REPLY).await;
            return Outcome::Unauthorized;
        }

        match update {
            Inbound::Start(cmd) => {
                tracing::info!(
                    user_id = ?cmd.user_id.map(|u| u.0),
                    username = cmd.username.as_deref().unwrap_or("unknown"),
                    "User started the bot"
                );
                self.reply(chat_id, START_REPLY).await;
                Outcome::Started
            }
            Inbound::Message(msg) => self.process(&msg).await,
        }
    }

    async fn process(&self, msg: &InboundMessage) -> Outcome {
        let text = match classify(msg) {
            Classification::Extracted(text) => text,
            Classification::Rejected(rejection) => {
                tracing::info!(
                    chat_id = msg.chat_id.0,
                    forwarded = msg.forwarded,
                    "Rejected message without usable text: {rejection:?}"
                );
                self.reply(msg.chat_id, rejection.reply()).await;
                return Outcome::Rejected(rejection);
            }
        };

        let kind = if msg.forwarded { "forwarded" } else { "direct" };
        tracing::info!(
            "Received {kind} message: {}",
            truncate_text(&text, LOG_PREVIEW_LEN)
        );

        let status = match self
            .messenger
            .send_text(msg.chat_id, PROCESSING_REPLY)
            .await
        {
            Ok(status) => status,
            Err(e) => {
                tracing::error!(
                    chat_id = msg.chat_id.0,
                    "Failed to send status message: {e}"
                );
                return Outcome::AckFailed;
            }
        };

        let rewritten = match self.rewriter.rewrite(&text).await {
            Ok(rewritten) => rewritten,
            Err(e) => {
                let cause = truncate_text(&e.cause(), MAX_CAUSE_LEN);
                tracing::error!("Error processing message: {e}");
                self.edit(status, &generation_error_reply(&cause)).await;
                return Outcome::GenerationFailed { status, cause };
            }
        };

        tracing::info!("Posting rewritten message to {}", self.destination);
        match self
            .messenger
            .publish_html(&self.destination, &rewritten)
            .await
        {
            Ok(post) => {
                tracing::info!("Published rewritten message to {}", self.destination);
                self.edit(status, PUBLISHED_REPLY).await;
                Outcome::Published { status, post }
            }
            Err(e) => {
                let cause = truncate_text(&e.cause(), MAX_CAUSE_LEN);
                tracing::error!("Error publishing to {}: {e}", self.destination);
                self.edit(status, &publish_error_reply(&cause)).await;
                Outcome::PublishFailed { status, cause }
            }
        }
    }

    async fn reply(&self, chat_id: ChatId, text: &str) {
        if let Err(e) = self.messenger.send_text(chat_id, text).await {
            tracing::warn!(chat_id = chat_id.0, "Failed to send reply: {e}");
        }
    }

    async fn edit(&self, status: MessageRef, text: &str) {
        if let Err(e) = self.messenger.edit_text(status, text).await {
            tracing::warn!(
                chat_id = status.chat_id.0,
                message_id = status.message_id.0,
                "Failed to update status message: {e}"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::domain::{MessageId, UserId};
    use crate::errors::Error;
    use crate::messaging::types::StartCommand;
    use crate::Result;

    const OPERATOR: i64 = 111;
    const OPERATOR_CHAT: ChatId = ChatId(111);

    #[derive(Default)]
    struct FakeMessenger {
        next_id: Mutex<i32>,
        sends: Mutex<Vec<(ChatId, String)>>,
        edits: Mutex<Vec<(MessageRef, String)>>,
        posts: Mutex<Vec<(Destination, String)>>,
        fail_send: AtomicBool,
        fail_edit: AtomicBool,
        fail_publish: AtomicBool,
    }

    impl FakeMessenger {
        fn alloc(&self, chat_id: ChatId) -> MessageRef {
            let mut guard = self.next_id.lock().unwrap();
            *guard += 1;
            MessageRef {
                chat_id,
                message_id: MessageId(*guard),
            }
        }

        fn sent(&self) -> Vec<(ChatId, String)> {
            self.sends.lock().unwrap().clone()
        }

        fn edited(&self) -> Vec<(MessageRef, String)> {
            self.edits.lock().unwrap().clone()
        }

        fn posted(&self) -> Vec<(Destination, String)> {
            self.posts.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl MessagingPort for FakeMessenger {
        async fn send_text(&self, chat_id: ChatId, text: &str) -> Result<MessageRef> {
            if self.fail_send.load(Ordering::SeqCst) {
                return Err(Error::External("telegram error: network down".to_string()));
            }
            self.sends.lock().unwrap().push((chat_id, text.to_string()));
            Ok(self.alloc(chat_id))
        }

        async fn edit_text(&self, msg: MessageRef, text: &str) -> Result<()> {
            if self.fail_edit.load(Ordering::SeqCst) {
                return Err(Error::External(
                    "telegram error: message not found".to_string(),
                ));
            }
            self.edits.lock().unwrap().push((msg, text.to_string()));
            Ok(())
        }

        async fn publish_html(&self, destination: &Destination, html: &str) -> Result<MessageRef> {
            if self.fail_publish.load(Ordering::SeqCst) {
                return Err(Error::Publish(
                    "Forbidden: bot is not a member of the channel chat".to_string(),
                ));
            }
            self.posts
                .lock()
                .unwrap()
                .push((destination.clone(), html.to_string()));
            Ok(self.alloc(ChatId(-1001)))
        }
    }

    struct FakeRewriter {
        calls: AtomicUsize,
        inputs: Mutex<Vec<String>>,
        fail_with: Option<String>,
    }

    impl FakeRewriter {
        fn ok() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                inputs: Mutex::new(Vec::new()),
                fail_with: None,
            }
        }

        fn failing(cause: &str) -> Self {
            Self {
                fail_with: Some(cause.to_string()),
                ..Self::ok()
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Rewriter for FakeRewriter {
        async fn rewrite(&self, text: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inputs.lock().unwrap().push(text.to_string());
            match &self.fail_with {
                Some(cause) => Err(Error::Generation(cause.clone())),
                None => Ok("Мені вдалося з'ясувати...".to_string()),
            }
        }
    }

    fn destination() -> Destination {
        Destination::Username("@insider_news".to_string())
    }

    fn pipeline(
        allowed: &[i64],
        rewriter: Arc<FakeRewriter>,
        messenger: Arc<FakeMessenger>,
    ) -> RelayPipeline {
        RelayPipeline::new(
            AuthGate::new(allowed.iter().copied()),
            rewriter,
            messenger,
            destination(),
        )
    }

    fn message(
        user: i64,
        text: Option<&str>,
        caption: Option<&str>,
        forwarded: bool,
    ) -> InboundMessage {
        InboundMessage {
            chat_id: ChatId(user),
            user_id: Some(UserId(user)),
            username: Some("operator".to_string()),
            text: text.map(str::to_string),
            caption: caption.map(str::to_string),
            forwarded,
        }
    }

    #[test]
    fn classify_forwarded_ignores_caption() {
        let msg = message(OPERATOR, None, Some("caption"), true);
        assert_eq!(
            classify(&msg),
            Classification::Rejected(Rejection::ForwardedWithoutText)
        );
    }

    #[test]
    fn classify_direct_falls_back_to_caption() {
        let msg = message(OPERATOR, None, Some("photo caption"), false);
        assert_eq!(
            classify(&msg),
            Classification::Extracted("photo caption".to_string())
        );

        let msg = message(OPERATOR, Some("body"), Some("caption"), false);
        assert_eq!(classify(&msg), Classification::Extracted("body".to_string()));
    }

    #[test]
    fn classify_blank_text_counts_as_absent() {
        let msg = message(OPERATOR, Some("   "), None, false);
        assert_eq!(classify(&msg), Classification::Rejected(Rejection::NoText));

        let msg = message(OPERATOR, Some("\n"), None, true);
        assert_eq!(
            classify(&msg),
            Classification::Rejected(Rejection::ForwardedWithoutText)
        );
    }

    #[test]
    fn classify_is_stable_for_the_same_message() {
        let samples = [
            message(OPERATOR, Some("text"), None, true),
            message(OPERATOR, None, Some("caption"), true),
            message(OPERATOR, None, Some("caption"), false),
            message(OPERATOR, None, None, false),
        ];
        for msg in &samples {
            assert_eq!(classify(msg), classify(msg));
        }
    }

    #[tokio::test]
    async fn unauthorized_sender_gets_fixed_reply_only() {
        let rewriter = Arc::new(FakeRewriter::ok());
        let messenger = Arc::new(FakeMessenger::default());
        let p = pipeline(&[OPERATOR], rewriter.clone(), messenger.clone());

        let out = p
            .handle(Inbound::Message(message(999, Some("news"), None, true)))
            .await;

        assert_eq!(out, Outcome::Unauthorized);
        assert_eq!(
            messenger.sent(),
            vec![(ChatId(999), UNAUTHORIZED_REPLY.to_string())]
        );
        assert_eq!(rewriter.calls(), 0);
        assert!(messenger.posted().is_empty());
        assert!(messenger.edited().is_empty());
    }

    #[tokio::test]
    async fn unauthorized_start_is_rejected() {
        let rewriter = Arc::new(FakeRewriter::ok());
        let messenger = Arc::new(FakeMessenger::default());
        let p = pipeline(&[], rewriter.clone(), messenger.clone());

        let out = p
            .handle(Inbound::Start(StartCommand {
                chat_id: OPERATOR_CHAT,
                user_id: Some(UserId(OPERATOR)),
                username: None,
            }))
            .await;

        assert_eq!(out, Outcome::Unauthorized);
        assert_eq!(
            messenger.sent(),
            vec![(OPERATOR_CHAT, UNAUTHORIZED_REPLY.to_string())]
        );
    }

    #[tokio::test]
    async fn missing_sender_is_unauthorized() {
        let rewriter = Arc::new(FakeRewriter::ok());
        let messenger = Arc::new(FakeMessenger::default());
        let p = pipeline(&[OPERATOR], rewriter.clone(), messenger.clone());

        let mut msg = message(OPERATOR, Some("news"), None, true);
        msg.user_id = None;

        assert_eq!(p.handle(Inbound::Message(msg)).await, Outcome::Unauthorized);
        assert_eq!(rewriter.calls(), 0);
    }

    #[tokio::test]
    async fn authorized_start_gets_greeting() {
        let rewriter = Arc::new(FakeRewriter::ok());
        let messenger = Arc::new(FakeMessenger::default());
        let p = pipeline(&[OPERATOR], rewriter.clone(), messenger.clone());

        let out = p
            .handle(Inbound::Start(StartCommand {
                chat_id: OPERATOR_CHAT,
                user_id: Some(UserId(OPERATOR)),
                username: Some("operator".to_string()),
            }))
            .await;

        assert_eq!(out, Outcome::Started);
        assert_eq!(messenger.sent(), vec![(OPERATOR_CHAT, START_REPLY.to_string())]);
        assert_eq!(rewriter.calls(), 0);
    }

    #[tokio::test]
    async fn forwarded_without_text_is_rejected() {
        let rewriter = Arc::new(FakeRewriter::ok());
        let messenger = Arc::new(FakeMessenger::default());
        let p = pipeline(&[OPERATOR], rewriter.clone(), messenger.clone());

        let out = p
            .handle(Inbound::Message(message(OPERATOR, None, None, true)))
            .await;

        assert_eq!(out, Outcome::Rejected(Rejection::ForwardedWithoutText));
        assert_eq!(
            messenger.sent(),
            vec![(
                OPERATOR_CHAT,
                Rejection::ForwardedWithoutText.reply().to_string()
            )]
        );
        assert_eq!(rewriter.calls(), 0);
        assert!(messenger.posted().is_empty());
    }

    #[tokio::test]
    async fn direct_message_without_text_is_rejected() {
        let rewriter = Arc::new(FakeRewriter::ok());
        let messenger = Arc::new(FakeMessenger::default());
        let p = pipeline(&[OPERATOR], rewriter.clone(), messenger.clone());

        let out = p
            .handle(Inbound::Message(message(OPERATOR, None, None, false)))
            .await;

        assert_eq!(out, Outcome::Rejected(Rejection::NoText));
        assert_eq!(
            messenger.sent(),
            vec![(OPERATOR_CHAT, Rejection::NoText.reply().to_string())]
        );
        assert_eq!(rewriter.calls(), 0);
        assert!(messenger.posted().is_empty());
    }

    #[tokio::test]
    async fn forwarded_news_is_rewritten_and_published() {
        let rewriter = Arc::new(FakeRewriter::ok());
        let messenger = Arc::new(FakeMessenger::default());
        let p = pipeline(&[OPERATOR], rewriter.clone(), messenger.clone());

        let out = p
            .handle(Inbound::Message(message(
                OPERATOR,
                Some("Уряд ухвалив рішення."),
                None,
                true,
            )))
            .await;

        let Outcome::Published { status, .. } = out else {
            panic!("unexpected outcome: {out:?}");
        };
        assert_eq!(
            messenger.sent(),
            vec![(OPERATOR_CHAT, PROCESSING_REPLY.to_string())]
        );
        assert_eq!(
            rewriter.inputs.lock().unwrap().clone(),
            vec!["Уряд ухвалив рішення.".to_string()]
        );
        assert_eq!(
            messenger.posted(),
            vec![(destination(), "Мені вдалося з'ясувати...".to_string())]
        );
        assert_eq!(
            messenger.edited(),
            vec![(status, PUBLISHED_REPLY.to_string())]
        );
    }

    #[tokio::test]
    async fn caption_of_direct_message_is_processed() {
        let rewriter = Arc::new(FakeRewriter::ok());
        let messenger = Arc::new(FakeMessenger::default());
        let p = pipeline(&[OPERATOR], rewriter.clone(), messenger.clone());

        let out = p
            .handle(Inbound::Message(message(
                OPERATOR,
                None,
                Some("Підпис до фото"),
                false,
            )))
            .await;

        assert!(matches!(out, Outcome::Published { .. }));
        assert_eq!(
            rewriter.inputs.lock().unwrap().clone(),
            vec!["Підпис до фото".to_string()]
        );
    }

    #[tokio::test]
    async fn generation_failure_edits_status_and_skips_publish() {
        let rewriter = Arc::new(FakeRewriter::failing("quota exceeded"));
        let messenger = Arc::new(FakeMessenger::default());
        let p = pipeline(&[OPERATOR], rewriter.clone(), messenger.clone());

        let out = p
            .handle(Inbound::Message(message(OPERATOR, Some("news"), None, true)))
            .await;

        let Outcome::GenerationFailed { status, cause } = out else {
            panic!("unexpected outcome: {out:?}");
        };
        assert_eq!(cause, "quota exceeded");
        assert!(messenger.posted().is_empty());

        let edits = messenger.edited();
        assert_eq!(edits.len(), 1);
        assert_eq!(edits[0].0, status);
        assert_eq!(edits[0].1, generation_error_reply("quota exceeded"));
        assert!(!edits[0].1.contains("Generation("));
    }

    #[tokio::test]
    async fn publish_failure_gets_its_own_status() {
        let rewriter = Arc::new(FakeRewriter::ok());
        let messenger = Arc::new(FakeMessenger::default());
        messenger.fail_publish.store(true, Ordering::SeqCst);
        let p = pipeline(&[OPERATOR], rewriter.clone(), messenger.clone());

        let out = p
            .handle(Inbound::Message(message(OPERATOR, Some("news"), None, true)))
            .await;

        let Outcome::PublishFailed { status, cause } = out else {
            panic!("unexpected outcome: {out:?}");
        };
        assert!(cause.contains("not a member"));
        assert_eq!(rewriter.calls(), 1);

        let edits = messenger.edited();
        assert_eq!(edits, vec![(status, publish_error_reply(&cause))]);
        assert_ne!(publish_error_reply(&cause), generation_error_reply(&cause));
    }

    #[tokio::test]
    async fn long_failure_cause_is_truncated() {
        let long = "x".repeat(500);
        let rewriter = Arc::new(FakeRewriter::failing(&long));
        let messenger = Arc::new(FakeMessenger::default());
        let p = pipeline(&[OPERATOR], rewriter, messenger.clone());

        let out = p
            .handle(Inbound::Message(message(OPERATOR, Some("news"), None, false)))
            .await;

        let Outcome::GenerationFailed { cause, .. } = out else {
            panic!("unexpected outcome: {out:?}");
        };
        assert_eq!(cause.chars().count(), MAX_CAUSE_LEN + 3);
        assert!(cause.ends_with("..."));
    }

    #[tokio::test]
    async fn ack_failure_stops_before_generation() {
        let rewriter = Arc::new(FakeRewriter::ok());
        let messenger = Arc::new(FakeMessenger::default());
        messenger.fail_send.store(true, Ordering::SeqCst);
        let p = pipeline(&[OPERATOR], rewriter.clone(), messenger.clone());

        let out = p
            .handle(Inbound::Message(message(OPERATOR, Some("news"), None, true)))
            .await;

        assert_eq!(out, Outcome::AckFailed);
        assert_eq!(rewriter.calls(), 0);
        assert!(messenger.posted().is_empty());
    }

    #[tokio::test]
    async fn failed_status_edit_does_not_change_outcome() {
        let rewriter = Arc::new(FakeRewriter::ok());
        let messenger = Arc::new(FakeMessenger::default());
        messenger.fail_edit.store(true, Ordering::SeqCst);
        let p = pipeline(&[OPERATOR], rewriter, messenger.clone());

        let out = p
            .handle(Inbound::Message(message(OPERATOR, Some("news"), None, true)))
            .await;

        assert!(matches!(out, Outcome::Published { .. }));
        assert_eq!(messenger.posted().len(), 1);
    }
}
