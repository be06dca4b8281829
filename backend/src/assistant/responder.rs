use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::{error, warn};
use shared::ChatResponse;

use super::prompt::{OFFLINE_FALLBACK, SERVICE_APOLOGY, build_prompt, ensure_disclaimer};
use super::{AssistantError, LanguageModel};

/// One stateless question/answer pair. Nothing from earlier exchanges is
/// carried into the next one.
#[derive(Debug, Clone)]
pub struct ChatExchange {
    pub message: String,
    pub context: String,
    pub response: String,
    pub timestamp: DateTime<Utc>,
}

impl ChatExchange {
    pub fn into_response(self) -> ChatResponse {
        ChatResponse {
            response: self.response,
            timestamp: self.timestamp.to_rfc3339(),
        }
    }
}

#[derive(Clone, Default)]
pub struct AssistantResponder {
    client: Option<Arc<dyn LanguageModel>>,
}

impl AssistantResponder {
    pub fn new(client: Option<Arc<dyn LanguageModel>>) -> Self {
        Self { client }
    }

    pub fn offline() -> Self {
        Self { client: None }
    }

    pub fn is_available(&self) -> bool {
        self.client.is_some()
    }

    fn client(&self) -> Result<&dyn LanguageModel, AssistantError> {
        self.client.as_deref().ok_or(AssistantError::Unavailable)
    }

    /// Always returns an answer carrying the AI disclaimer.
    pub async fn respond(&self, message: &str, context: &str) -> String {
        let client = match self.client() {
            Ok(client) => client,
            Err(err) => {
                warn!("{}; answering with offline fallback", err);
                return OFFLINE_FALLBACK.to_string();
            }
        };

        let prompt = build_prompt(message, context);
        match client.generate(&prompt).await {
            Ok(answer) => ensure_disclaimer(&answer),
            Err(err) => {
                error!(
                    "Error generating chatbot response with {}: {}",
                    client.model_name(),
                    err
                );
                SERVICE_APOLOGY.to_string()
            }
        }
    }

    pub async fn exchange(&self, message: String, context: String) -> ChatExchange {
        let response = self.respond(&message, &context).await;
        ChatExchange {
            message,
            context,
            response,
            timestamp: Utc::now(),
        }
    }
}
