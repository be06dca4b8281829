use async_trait::async_trait;
use reqwest::Client as HttpClient;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use super::{AssistantError, LanguageModel};
use crate::config::GeminiConfig;

const GENERATE_CONTENT: &str = "generateContent";

#[derive(Error, Debug)]
pub enum GeminiError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),
    #[error("URL parsing failed: {0}")]
    UrlError(#[from] url::ParseError),
    #[error("Gemini API returned {status}: {body}")]
    ApiError { status: u16, body: String },
    #[error("prompt blocked: {0}")]
    Blocked(String),
    #[error("response contained no text")]
    EmptyResponse,
}

impl From<GeminiError> for AssistantError {
    fn from(err: GeminiError) -> Self {
        AssistantError::Call(err.to_string())
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
pub struct GenerateContentRequest {
    pub contents: Vec<Content>,
}

impl GenerateContentRequest {
    /// A fresh conversation holding only `prompt`.
    pub fn single_turn(prompt: &str) -> Self {
        Self {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: vec![Part {
                    text: Some(prompt.to_string()),
                }],
            }],
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub content: Option<Content>,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptFeedback {
    pub block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    pub prompt_feedback: Option<PromptFeedback>,
}

impl GenerateContentResponse {
    /// Concatenated text of the first candidate.
    pub fn into_text(self) -> Result<String, GeminiError> {
        if let Some(reason) = self.prompt_feedback.and_then(|feedback| feedback.block_reason) {
            return Err(GeminiError::Blocked(reason));
        }
        let candidate = self
            .candidates
            .into_iter()
            .next()
            .ok_or(GeminiError::EmptyResponse)?;
        let finish_reason = candidate.finish_reason;
        let text: String = candidate
            .content
            .map(|content| content.parts.into_iter().filter_map(|part| part.text).collect())
            .unwrap_or_default();

        if text.trim().is_empty() {
            if let Some(reason) = finish_reason.filter(|reason| reason != "STOP") {
                return Err(GeminiError::Blocked(reason));
            }
            return Err(GeminiError::EmptyResponse);
        }
        Ok(text)
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ModelDescriptor {
    pub name: String,
    pub display_name: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub supported_generation_methods: Vec<String>,
}

impl ModelDescriptor {
    pub fn supports_generation(&self) -> bool {
        self.supported_generation_methods
            .iter()
            .any(|method| method == GENERATE_CONTENT)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListModelsResponse {
    #[serde(default)]
    models: Vec<ModelDescriptor>,
    next_page_token: Option<String>,
}

/// Client for the Google Generative Language REST API.
#[derive(Clone)]
pub struct GeminiClient {
    http_client: HttpClient,
    api_key: String,
    model: String,
    base_url: Url,
}

impl GeminiClient {
    pub fn new(config: &GeminiConfig) -> Result<Self, GeminiError> {
        let http_client = HttpClient::builder().timeout(config.timeout).build()?;
        let mut base = config.base_url.clone();
        if !base.ends_with('/') {
            base.push('/');
        }
        Ok(Self {
            http_client,
            api_key: config.api_key.clone(),
            model: normalize_model(&config.model).to_string(),
            base_url: Url::parse(&base)?,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self, path: &str) -> Result<Url, GeminiError> {
        Ok(self.base_url.join(path)?)
    }

    pub async fn generate_content(&self, prompt: &str) -> Result<String, GeminiError> {
        let url = self.endpoint(&format!(
            "v1beta/models/{}:{}",
            self.model, GENERATE_CONTENT
        ))?;
        log::debug!("Sending {} character prompt to {}", prompt.len(), self.model);

        let response = self
            .http_client
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .json(&GenerateContentRequest::single_turn(prompt))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(GeminiError::ApiError { status, body });
        }

        let parsed: GenerateContentResponse = response.json().await?;
        parsed.into_text()
    }

    /// Every model visible to the configured key, following pagination.
    pub async fn list_models(&self) -> Result<Vec<ModelDescriptor>, GeminiError> {
        let mut models = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut url = self.endpoint("v1beta/models")?;
            url.query_pairs_mut().append_pair("pageSize", "100");
            if let Some(token) = &page_token {
                url.query_pairs_mut().append_pair("pageToken", token);
            }

            let response = self
                .http_client
                .get(url)
                .header("x-goog-api-key", &self.api_key)
                .send()
                .await?;
            if !response.status().is_success() {
                let status = response.status().as_u16();
                let body = response.text().await.unwrap_or_default();
                return Err(GeminiError::ApiError { status, body });
            }

            let page: ListModelsResponse = response.json().await?;
            models.extend(page.models);
            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }
        Ok(models)
    }
}

#[async_trait]
impl LanguageModel for GeminiClient {
    async fn generate(&self, prompt: &str) -> Result<String, AssistantError> {
        Ok(self.generate_content(prompt).await?)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

fn normalize_model(model: &str) -> &str {
    model.strip_prefix("models/").unwrap_or(model)
}
