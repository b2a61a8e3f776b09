
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

use crate::config::VectorStoreConfig;
use crate::{RagError, Result};

const DEFAULT_TIMEOUT_SECONDS: u64 = 30;

fn default_chapter() -> String {
    "Unknown Chapter".to_string()
}

fn default_section() -> String {
    "Unknown Section".to_string()
}

/// Metadata stored alongside each vector. Missing or empty chapter and
/// section fields normalize to placeholder labels on the way out.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChunkPayload {
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub url: String,
    #[serde(default = "default_chapter")]
    pub chapter: String,
    #[serde(default = "default_section")]
    pub section: String,
    #[serde(default)]
    pub heading_hierarchy: Vec<String>,
}

impl ChunkPayload {
    fn normalize(mut self) -> Self {
        if self.chapter.trim().is_empty() {
            self.chapter = default_chapter();
        }
        if self.section.trim().is_empty() {
            self.section = default_section();
        }
        self
    }
}

/// A vector with its payload, ready for upsert.
#[derive(Debug, Clone, Serialize)]
pub struct PointRecord {
    pub id: String,
    pub vector: Vec<f32>,
    pub payload: ChunkPayload,
}

/// A search hit with its raw cosine similarity score.
#[derive(Debug, Clone)]
pub struct ScoredPoint {
    pub id: String,
    pub score: f32,
    pub payload: ChunkPayload,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    result: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    id: serde_json::Value,
    score: f32,
    #[serde(default)]
    payload: Option<ChunkPayload>,
}

/// HTTP client for the vector search service.
#[derive(Debug, Clone)]
pub struct VectorStoreClient {
    base_url: Url,
    api_key: String,
    collection: String,
    http: reqwest::Client,
}

impl VectorStoreClient {
    #[inline]
    pub fn new(config: &VectorStoreConfig) -> Result<Self> {
        let base_url = Url::parse(&config.url)
            .map_err(|e| RagError::Config(format!("Invalid vector store URL: {e}")))?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECONDS))
            .build()
            .map_err(|e| {
                RagError::VectorStore(format!("Failed to build HTTP client: {e}"))
            })?;

        Ok(Self {
            base_url,
            api_key: config.api_key.clone(),
            collection: config.collection.clone(),
            http,
        })
    }

    // Concatenating onto the base keeps any base path prefix intact.
    fn collection_url(&self, suffix: &str) -> Result<Url> {
        let base = self.base_url.as_str();
        let joined = if base.ends_with('/') {
            format!("{base}collections/{}{suffix}", self.collection)
        } else {
            format!("{base}/collections/{}{suffix}", self.collection)
        };
        Url::parse(&joined)
            .map_err(|e| RagError::VectorStore(format!("Failed to build collection URL: {e}")))
    }

    fn request(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if self.api_key.is_empty() {
            builder
        } else {
            builder.header("api-key", &self.api_key)
        }
    }

    /// Create the collection if it does not already exist. Safe to call on
    /// every startup.
    #[inline]
    pub async fn ensure_collection(&self, dimension: usize) -> Result<()> {
        let url = self.collection_url("")?;

        let response = self
            .request(self.http.get(url.clone()))
            .send()
            .await
            .map_err(|e| RagError::VectorStore(format!("Failed to query collection: {e}")))?;

        if response.status().is_success() {
            debug!("Collection {} already exists", self.collection);
            return Ok(());
        }

        info!("Creating collection {} ({} dimensions)", self.collection, dimension);

        self.request(self.http.put(url))
            .json(&serde_json::json!({
                "vectors": { "size": dimension, "distance": "Cosine" }
            }))
            .send()
            .await
            .map_err(|e| RagError::VectorStore(format!("Failed to create collection: {e}")))?
            .error_for_status()
            .map_err(|e| {
                RagError::VectorStore(format!("Collection creation failed: {e}"))
            })?;

        Ok(())
    }

    /// Upsert a batch of points into the collection.
    #[inline]
    pub async fn upsert_points(&self, points: &[PointRecord]) -> Result<()> {
        if points.is_empty() {
            return Ok(());
        }

        let url = self.collection_url("/points")?;

        self.request(self.http.put(url))
            .json(&serde_json::json!({ "points": points }))
            .send()
            .await
            .map_err(|e| RagError::VectorStore(format!("Failed to upsert points: {e}")))?
            .error_for_status()
            .map_err(|e| RagError::VectorStore(format!("Point upsert failed: {e}")))?;

        debug!("Upserted {} points into {}", points.len(), self.collection);
        Ok(())
    }

    /// Similarity search returning up to `limit` scored hits, best first.
    #[inline]
    pub async fn search(&self, vector: &[f32], limit: usize) -> Result<Vec<ScoredPoint>> {
        let url = self.collection_url("/points/search")?;

        let response: SearchResponse = self
            .request(self.http.post(url))
            .json(&serde_json::json!({
                "vector": vector,
                "limit": limit,
                "with_payload": true
            }))
            .send()
            .await
            .map_err(|e| RagError::VectorStore(format!("Search request failed: {e}")))?
            .error_for_status()
            .map_err(|e| RagError::VectorStore(format!("Search failed: {e}")))?
            .json()
            .await
            .map_err(|e| RagError::VectorStore(format!("Failed to parse search response: {e}")))?;

        let points = response
            .result
            .into_iter()
            .map(|hit| ScoredPoint {
                id: id_to_string(&hit.id),
                score: hit.score,
                payload: hit.payload.unwrap_or_else(empty_payload).normalize(),
            })
            .collect();

        Ok(points)
    }
}

fn empty_payload() -> ChunkPayload {
    ChunkPayload {
        content: String::new(),
        url: String::new(),
        chapter: default_chapter(),
        section: default_section(),
        heading_hierarchy: Vec::new(),
    }
}

fn id_to_string(id: &serde_json::Value) -> String {
    match id {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
