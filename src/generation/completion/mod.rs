
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::config::CompletionConfig;

const DEFAULT_TIMEOUT_SECONDS: u64 = 30;

/// One role-tagged message in a chat completion request.
#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: &'static str,
    pub content: String,
}

impl ChatMessage {
    #[inline]
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: "system", content: content.into() }
    }

    #[inline]
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: "user", content: content.into() }
    }
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

/// Client for an OpenAI-compatible chat completion endpoint.
#[derive(Debug, Clone)]
pub struct CompletionClient {
    base_url: Url,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
    http: reqwest::Client,
}

impl CompletionClient {
    #[inline]
    pub fn new(config: &CompletionConfig) -> Result<Self> {
        let base_url =
            Url::parse(&config.url).context("Failed to parse completion service URL")?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECONDS))
            .build()
            .context("Failed to build completion HTTP client")?;

        Ok(Self {
            base_url,
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            http,
        })
    }

    /// Send a message list and return the first choice's text, trimmed.
    #[inline]
    pub async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        let url = completion_url(&self.base_url)?;

        debug!("Requesting completion with {} messages", messages.len());

        let request = CompletionRequest {
            model: &self.model,
            messages,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };

        let response = self
            .http
            .post(url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .context("Completion request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Completion service returned {status}: {body}");
        }

        let parsed: CompletionResponse = response
            .json()
            .await
            .context("Failed to parse completion response")?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .context("Completion response contained no choices")?;

        Ok(content.trim().to_string())
    }
}

// Joining with a relative path keeps any base path prefix intact.
fn completion_url(base: &Url) -> Result<Url> {
    let base_str = base.as_str();
    let joined = if base_str.ends_with('/') {
        format!("{base_str}chat/completions")
    } else {
        format!("{base_str}/chat/completions")
    };
    Url::parse(&joined).context("Failed to build completion URL")
}
