//! Medical chat assistant.
//!
//! Answers are produced by an external language model when one is configured
//! and by fixed text otherwise. Failures on this path are absorbed into a
//! valid answer; callers always receive a string.

pub mod gemini;
pub mod prompt;
pub mod responder;

use async_trait::async_trait;

pub use responder::{AssistantResponder, ChatExchange};

#[derive(Debug, thiserror::Error)]
pub enum AssistantError {
    #[error("language model client is not configured")]
    Unavailable,
    #[error("language model call failed: {0}")]
    Call(String),
}

#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Sends `prompt` as a single user turn with no prior history.
    async fn generate(&self, prompt: &str) -> Result<String, AssistantError>;

    fn model_name(&self) -> &str;
}
