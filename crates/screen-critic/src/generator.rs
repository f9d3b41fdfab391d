//! Text generation through a hosted chat-completion API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::http::{build_client, ensure_success, transport_error, DEFAULT_TIMEOUT};
use crate::types::{CritiqueError, CritiqueResult, ReviewText, Service};

/// Default hosted API endpoint.
pub const DEFAULT_OPENAI_URL: &str = "https://api.openai.com";

/// Default chat model.
pub const DEFAULT_CHAT_MODEL: &str = "gpt-3.5-turbo";

/// Turns a prompt into generated text.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> CritiqueResult<ReviewText>;
}

/// A role-tagged chat message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    n: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Generator backed by an OpenAI-compatible `/v1/chat/completions` endpoint.
pub struct OpenAiChatGenerator {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAiChatGenerator {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> CritiqueResult<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(CritiqueError::auth(Service::Generator, "missing API key"));
        }
        Ok(Self {
            client: build_client(DEFAULT_TIMEOUT),
            base_url: DEFAULT_OPENAI_URL.to_string(),
            api_key,
            model: model.into(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.client = build_client(timeout);
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl TextGenerator for OpenAiChatGenerator {
    async fn generate(&self, prompt: &str) -> CritiqueResult<ReviewText> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        let body = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage::user(prompt)],
            n: 1,
        };
        tracing::debug!("Requesting completion from {} at {url}", self.model);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error(Service::Generator, e))?;
        let response = ensure_success(Service::Generator, response).await?;
        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| transport_error(Service::Generator, e))?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| {
                CritiqueError::remote(Service::Generator, "response contained no completion")
            })?;
        ReviewText::new(content)
    }
}
