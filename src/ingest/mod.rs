//! Corpus ingestion.
//!
//! Reads crawled pages as JSON lines of `{url, text}`, chunks each page,
//! embeds the chunk contents in batches, and upserts vectors with their
//! payloads. Failures are isolated per page so one bad document never aborts
//! the batch.

#[cfg(test)]
mod tests;

pub mod chunker;

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::embeddings::EmbeddingClient;
use crate::vector_store::{ChunkPayload, PointRecord, VectorStoreClient};
use chunker::{chunk_text, Chunk, ChunkerConfig};

/// One crawled page, as produced by the upstream crawler.
#[derive(Debug, Deserialize)]
pub struct PageRecord {
    pub url: String,
    pub text: String,
}

/// Counters accumulated over one ingestion run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IngestionStats {
    pub pages_processed: usize,
    pub chunks_created: usize,
    pub chunks_stored: usize,
    pub errors_encountered: usize,
}

/// Chunk, embed, and upsert pages into the vector store.
#[derive(Debug)]
pub struct IngestionPipeline {
    embeddings: EmbeddingClient,
    store: VectorStoreClient,
    chunker: ChunkerConfig,
    dimension: usize,
}

impl IngestionPipeline {
    #[inline]
    pub fn new(embeddings: EmbeddingClient, store: VectorStoreClient) -> Self {
        Self {
            dimension: embeddings.dimension(),
            embeddings,
            store,
            chunker: ChunkerConfig::default(),
        }
    }

    /// Ingest a JSONL file of crawled pages. The collection is created on
    /// first use; per-page failures are counted and skipped.
    #[inline]
    pub async fn ingest_file<P: AsRef<Path>>(&self, input: P) -> Result<IngestionStats> {
        let input = input.as_ref();
        let file = File::open(input)
            .with_context(|| format!("Failed to open input file: {}", input.display()))?;

        self.store
            .ensure_collection(self.dimension)
            .await
            .context("Failed to prepare vector collection")?;

        let mut stats = IngestionStats::default();

        for (line_number, line) in BufReader::new(file).lines().enumerate() {
            let line = line.with_context(|| {
                format!("Failed to read line {} of {}", line_number + 1, input.display())
            })?;
            if line.trim().is_empty() {
                continue;
            }

            let page: PageRecord = match serde_json::from_str(&line) {
                Ok(page) => page,
                Err(err) => {
                    warn!("Skipping malformed record on line {}: {err}", line_number + 1);
                    stats.errors_encountered += 1;
                    continue;
                }
            };

            match self.ingest_page(&page).await {
                Ok((created, stored)) => {
                    stats.pages_processed += 1;
                    stats.chunks_created += created;
                    stats.chunks_stored += stored;
                }
                Err(err) => {
                    error!("Failed to ingest {}: {err:#}", page.url);
                    stats.errors_encountered += 1;
                }
            }
        }

        info!(
            "Ingestion complete: {} pages, {} chunks created, {} stored, {} errors",
            stats.pages_processed,
            stats.chunks_created,
            stats.chunks_stored,
            stats.errors_encountered
        );
        Ok(stats)
    }

    /// Chunk and store one page, returning (chunks created, chunks stored).
    #[inline]
    pub async fn ingest_page(&self, page: &PageRecord) -> Result<(usize, usize)> {
        let chunks = chunk_text(&page.text, &page.url, &self.chunker);
        if chunks.is_empty() {
            warn!("No chunks produced for {}", page.url);
            return Ok((0, 0));
        }

        let texts: Vec<String> = chunks.iter().map(|chunk| chunk.content.clone()).collect();
        let vectors = self
            .embeddings
            .embed_documents(&texts)
            .await
            .with_context(|| format!("Failed to embed chunks for {}", page.url))?;

        let points: Vec<PointRecord> = chunks
            .iter()
            .zip(vectors)
            .map(|(chunk, vector)| PointRecord {
                id: Uuid::new_v4().to_string(),
                vector,
                payload: payload_for(chunk),
            })
            .collect();

        self.store
            .upsert_points(&points)
            .await
            .with_context(|| format!("Failed to upsert chunks for {}", page.url))?;

        info!("Ingested {} chunks from {}", points.len(), page.url);
        Ok((chunks.len(), points.len()))
    }
}

fn payload_for(chunk: &Chunk) -> ChunkPayload {
    ChunkPayload {
        content: chunk.content.clone(),
        url: chunk.source_url.clone(),
        chapter: chunk.chapter.clone(),
        section: chunk.section.clone(),
        heading_hierarchy: chunk.heading_hierarchy.clone(),
    }
}
