//! Rewrite generation: persona-driven chat completion behind a rate limit.

use std::sync::Arc;

use async_trait::async_trait;

use crate::{errors::Error, rate_limit::MinIntervalGate, utils::truncate_text, Result};

/// Sampling temperature for every rewrite request.
pub const REWRITE_TEMPERATURE: f32 = 0.7;

pub const DEFAULT_MODEL: &str = "gpt-4o";

/// Ukrainian "anonymous insider" style instruction sent as the system message.
pub const DEFAULT_PERSONA: &str = "Ти — анонімний інсайдер. Тобі надходять дані з неофіційних джерел, і ти перетворюєш офіційні новини на короткі розповіді від першої особи. Пиши у три стислі абзаци:

У першому абзаці одразу викладай головний факт, посилаючись на «мої джерела» або «мені вдалося з’ясувати».
У другому — коротко пояснюй, у чому суть і чому це може бути важливим, уникаючи згадок про офіційні видання чи цитати.
У третьому — додай кілька спостережень чи можливих наслідків, але нічого не обіцяй і не згадуй про майбутні публікації.
Використовуй тільки «я» чи «мені». Не посилайся на офіційні джерела й не надмірно нагнітай конспірологію. Текст має звучати впевнено й правдоподібно, ніби ти насправді отримуєш внутрішню інформацію.";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    System,
    User,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ChatTurn {
    pub role: Role,
    pub content: String,
}

/// Provider-agnostic single-shot completion request.
#[derive(Clone, Debug, PartialEq)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<ChatTurn>,
    pub temperature: f32,
}

/// Port for the external generation service.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, req: CompletionRequest) -> Result<String>;
}

/// Anything that turns operator text into a publishable rewrite.
#[async_trait]
pub trait Rewriter: Send + Sync {
    async fn rewrite(&self, text: &str) -> Result<String>;
}

/// Persona + client. Pure request/response, no retries.
pub struct RewriteGenerator {
    client: Arc<dyn CompletionClient>,
    persona: String,
    model: String,
    temperature: f32,
}

impl RewriteGenerator {
    pub fn new(
        client: Arc<dyn CompletionClient>,
        persona: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            client,
            persona: persona.into(),
            model: model.into(),
            temperature: REWRITE_TEMPERATURE,
        }
    }

    pub fn build_request(&self, text: &str) -> CompletionRequest {
        CompletionRequest {
            model: self.model.clone(),
            messages: vec![
                ChatTurn {
                    role: Role::System,
                    content: self.persona.clone(),
                },
                ChatTurn {
                    role: Role::User,
                    content: text.to_string(),
                },
            ],
            temperature: self.temperature,
        }
    }
}

#[async_trait]
impl Rewriter for RewriteGenerator {
    async fn rewrite(&self, text: &str) -> Result<String> {
        if text.trim().is_empty() {
            return Err(Error::Generation("input text is empty".to_string()));
        }

        tracing::info!(model = %self.model, "Sending request to generation service");
        let out = match self.client.complete(self.build_request(text)).await {
            Ok(s) => s,
            Err(e) => {
                tracing::error!("Error generating rewrite: {e}");
                return Err(match e {
                    Error::Generation(_) => e,
                    other => Error::Generation(other.to_string()),
                });
            }
        };

        if out.trim().is_empty() {
            tracing::error!("Generation service returned empty text");
            return Err(Error::Generation(
                "generation service returned empty text".to_string(),
            ));
        }

        tracing::info!(
            chars = out.chars().count(),
            "Received rewrite: {}",
            truncate_text(&out, 50)
        );
        Ok(out)
    }
}

/// Rewriter decorator that enforces the shared minimum spacing between calls.
pub struct RateLimitedRewriter {
    inner: Arc<dyn Rewriter>,
    gate: Arc<MinIntervalGate>,
}

impl RateLimitedRewriter {
    pub fn new(inner: Arc<dyn Rewriter>, gate: Arc<MinIntervalGate>) -> Self {
        Self { inner, gate }
    }
}

#[async_trait]
impl Rewriter for RateLimitedRewriter {
    async fn rewrite(&self, text: &str) -> Result<String> {
        self.gate.acquire().await;
        self.inner.rewrite(text).await
    }
}
