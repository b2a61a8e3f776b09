#[cfg(test)]
mod tests;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::config::EmbeddingConfig;

const DEFAULT_TIMEOUT_SECONDS: u64 = 30;

/// Whether a text is embedded as corpus content or as a search query. Some
/// embedding models produce different vectors for the two roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbeddingInput {
    Document,
    Query,
}

impl EmbeddingInput {
    fn as_str(self) -> &'static str {
        match self {
            Self::Document => "search_document",
            Self::Query => "search_query",
        }
    }
}

/// Client for the external embedding service. Texts go in, fixed-length
/// vectors come out; batches are split to respect the service limit.
#[derive(Debug, Clone)]
pub struct EmbeddingClient {
    base_url: Url,
    api_key: String,
    model: String,
    dimension: usize,
    batch_size: usize,
    http: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    texts: &'a [String],
    input_type: &'static str,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

impl EmbeddingClient {
    #[inline]
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let base_url =
            Url::parse(&config.url).context("Failed to parse embedding service URL")?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECONDS))
            .build()
            .context("Failed to build embedding HTTP client")?;

        Ok(Self {
            base_url,
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            dimension: config.dimension as usize,
            batch_size: config.batch_size as usize,
            http,
        })
    }

    /// Vector length produced by the configured model.
    #[inline]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Embed a single query string.
    #[inline]
    pub async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        debug!("Generating query embedding for text (length: {})", text.len());

        let texts = [text.to_string()];
        let mut embeddings = self.embed_single_batch(&texts, EmbeddingInput::Query).await?;

        embeddings
            .pop()
            .context("Embedding service returned no vectors for query")
    }

    /// Embed corpus texts, splitting into service-sized batches. Returns one
    /// vector per input text, in input order.
    #[inline]
    pub async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!("Generating embeddings for {} texts", texts.len());

        let mut results = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            let batch_results = self
                .embed_single_batch(batch, EmbeddingInput::Document)
                .await
                .with_context(|| format!("Failed to embed batch of {} texts", batch.len()))?;
            results.extend(batch_results);
        }

        debug!("Generated {} embeddings total", results.len());
        Ok(results)
    }

    async fn embed_single_batch(
        &self,
        texts: &[String],
        input: EmbeddingInput,
    ) -> Result<Vec<Vec<f32>>> {
        let url = self
            .base_url
            .join("/v1/embed")
            .context("Failed to build embedding URL")?;

        let request = EmbedRequest {
            model: &self.model,
            texts,
            input_type: input.as_str(),
        };

        let response: EmbedResponse = self
            .http
            .post(url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .context("Embedding request failed")?
            .error_for_status()
            .context("Embedding service returned an error status")?
            .json()
            .await
            .context("Failed to parse embedding response")?;

        if response.embeddings.len() != texts.len() {
            anyhow::bail!(
                "Mismatch between request and response counts: {} vs {}",
                texts.len(),
                response.embeddings.len()
            );
        }

        for embedding in &response.embeddings {
            if embedding.len() != self.dimension {
                anyhow::bail!(
                    "Embedding dimension mismatch: expected {}, got {}",
                    self.dimension,
                    embedding.len()
                );
            }
        }

        Ok(response.embeddings)
    }
}
