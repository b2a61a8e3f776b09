#[cfg(test)]
mod tests;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;
use thiserror::Error;
use url::Url;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub embedding: EmbeddingConfig,
    pub vector_store: VectorStoreConfig,
    pub completion: CompletionConfig,
    pub retrieval: RetrievalConfig,
    pub session: SessionConfig,
    pub cache: CacheConfig,
    pub server: ServerConfig,
}

/// Embedding service connection settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub url: String,
    pub api_key: String,
    pub model: String,
    pub dimension: u32,
    pub batch_size: u32,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            url: "https://api.cohere.ai".to_string(),
            api_key: String::new(),
            model: "embed-multilingual-v3.0".to_string(),
            dimension: 1024,
            batch_size: 96,
        }
    }
}

/// Vector search service connection settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct VectorStoreConfig {
    pub url: String,
    pub api_key: String,
    pub collection: String,
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:6333".to_string(),
            api_key: String::new(),
            collection: "textbook_chunks".to_string(),
        }
    }
}

/// Completion service connection settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CompletionConfig {
    pub url: String,
    pub api_key: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            url: "https://generativelanguage.googleapis.com/v1beta/openai".to_string(),
            api_key: String::new(),
            model: "gemini-2.0-flash".to_string(),
            temperature: 0.1,
            max_tokens: 1000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetrievalConfig {
    pub default_top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self { default_top_k: 5 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SessionConfig {
    pub timeout_minutes: u64,
    pub context_turns: usize,
    pub sweep_interval_seconds: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            timeout_minutes: 30,
            context_turns: 5,
            sweep_interval_seconds: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CacheConfig {
    pub ttl_seconds: u64,
    pub capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: 300,
            capacity: 512,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub answer_timeout_seconds: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            answer_timeout_seconds: 9,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid URL format: {0}")]
    InvalidUrl(String),
    #[error("Invalid port: {0} (must be between 1 and 65535)")]
    InvalidPort(u16),
    #[error("Invalid embedding batch size: {0} (must be between 1 and 96)")]
    InvalidBatchSize(u32),
    #[error("Invalid embedding dimension: {0} (must be between 64 and 4096)")]
    InvalidEmbeddingDimension(u32),
    #[error("Invalid model name: {0} (cannot be empty)")]
    InvalidModel(String),
    #[error("Invalid collection name (cannot be empty)")]
    InvalidCollection,
    #[error("Invalid top_k: {0} (must be between 1 and 50)")]
    InvalidTopK(usize),
    #[error("Invalid temperature: {0} (must be between 0.0 and 1.0)")]
    InvalidTemperature(f32),
    #[error("Invalid max tokens: {0} (must be greater than 0)")]
    InvalidMaxTokens(u32),
    #[error("Invalid session timeout: {0} minutes (must be greater than 0)")]
    InvalidSessionTimeout(u64),
    #[error("Invalid cache capacity: {0} (must be greater than 0)")]
    InvalidCacheCapacity(usize),
    #[error("Invalid answer timeout: {0} seconds (must be between 1 and 300)")]
    InvalidAnswerTimeout(u64),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),
}

impl Config {
    /// Load configuration from a TOML file, falling back to defaults when the
    /// file does not exist. API keys can be overridden via the
    /// `EMBEDDING_API_KEY`, `VECTOR_STORE_API_KEY`, and `COMPLETION_API_KEY`
    /// environment variables.
    #[inline]
    pub fn load<P: AsRef<Path>>(config_path: P) -> Result<Self> {
        let config_path = config_path.as_ref();

        let mut config = if config_path.exists() {
            let content = fs::read_to_string(config_path).with_context(|| {
                format!("Failed to read config file: {}", config_path.display())
            })?;
            toml::from_str(&content).with_context(|| {
                format!("Failed to parse config file: {}", config_path.display())
            })?
        } else {
            Self::default()
        };

        config.apply_env_overrides();

        config
            .validate()
            .context("Configuration validation failed")?;

        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(key) = env::var("EMBEDDING_API_KEY") {
            self.embedding.api_key = key;
        }
        if let Ok(key) = env::var("VECTOR_STORE_API_KEY") {
            self.vector_store.api_key = key;
        }
        if let Ok(key) = env::var("COMPLETION_API_KEY") {
            self.completion.api_key = key;
        }
    }

    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        for url in [
            &self.embedding.url,
            &self.vector_store.url,
            &self.completion.url,
        ] {
            Url::parse(url).map_err(|_| ConfigError::InvalidUrl(url.clone()))?;
        }

        if self.embedding.model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(self.embedding.model.clone()));
        }

        if self.completion.model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(self.completion.model.clone()));
        }

        if self.vector_store.collection.trim().is_empty() {
            return Err(ConfigError::InvalidCollection);
        }

        if self.embedding.batch_size == 0 || self.embedding.batch_size > 96 {
            return Err(ConfigError::InvalidBatchSize(self.embedding.batch_size));
        }

        if !(64..=4096).contains(&self.embedding.dimension) {
            return Err(ConfigError::InvalidEmbeddingDimension(
                self.embedding.dimension,
            ));
        }

        if !(1..=50).contains(&self.retrieval.default_top_k) {
            return Err(ConfigError::InvalidTopK(self.retrieval.default_top_k));
        }

        if !(0.0..=1.0).contains(&self.completion.temperature) {
            return Err(ConfigError::InvalidTemperature(self.completion.temperature));
        }

        if self.completion.max_tokens == 0 {
            return Err(ConfigError::InvalidMaxTokens(self.completion.max_tokens));
        }

        if self.session.timeout_minutes == 0 {
            return Err(ConfigError::InvalidSessionTimeout(
                self.session.timeout_minutes,
            ));
        }

        if self.cache.capacity == 0 {
            return Err(ConfigError::InvalidCacheCapacity(self.cache.capacity));
        }

        if self.server.port == 0 {
            return Err(ConfigError::InvalidPort(self.server.port));
        }

        if !(1..=300).contains(&self.server.answer_timeout_seconds) {
            return Err(ConfigError::InvalidAnswerTimeout(
                self.server.answer_timeout_seconds,
            ));
        }

        Ok(())
    }
}
