//! Semantic retrieval over the textbook corpus.
//!
//! Queries are embedded, searched against the vector store with an oversized
//! candidate pool, then deduplicated and rescored by content quality before
//! the final top-k selection. Every failure path degrades to an empty result
//! so the caller can still answer from general knowledge.


pub mod quality;

use std::collections::HashSet;
use tracing::{error, info, warn};

use crate::embeddings::EmbeddingClient;
use crate::vector_store::{ScoredPoint, VectorStoreClient};

/// Raw similarity below which the query is retried with expansion terms.
const EXPANSION_THRESHOLD: f32 = 0.5;

/// Query substrings that trigger expansion regardless of similarity.
const EXPANSION_TRIGGERS: &[&str] = &[
    "vision-language-action",
    "humanoid control",
    "vla",
    "robotics",
    "physical ai",
    "embodied ai",
    "machine learning",
    "deep learning",
    "neural networks",
    "computer vision",
    "nlp",
];

/// Concept expansions appended to the query when the concept appears in it.
const CONCEPT_EXPANSIONS: &[(&str, &[&str])] = &[
    (
        "physical ai",
        &[
            "embodied ai",
            "robotics",
            "real-world ai",
            "robot intelligence",
            "physical artificial intelligence",
        ],
    ),
    (
        "humanoid robotics",
        &[
            "humanoid robot",
            "bipedal robot",
            "human-like robot",
            "walking robot",
            "humanoid robot control",
        ],
    ),
    (
        "vision-language-action",
        &[
            "vla",
            "multimodal models",
            "vision language action models",
            "vlm",
            "multimodal ai",
        ],
    ),
    (
        "humanoid control",
        &[
            "locomotion",
            "balance control",
            "gait control",
            "bipedal control",
            "humanoid locomotion",
            "walking control",
        ],
    ),
    (
        "robotics",
        &[
            "robot",
            "automation",
            "control systems",
            "mechatronics",
            "robot control",
        ],
    ),
    (
        "ai",
        &[
            "artificial intelligence",
            "machine learning",
            "neural networks",
            "deep learning",
        ],
    ),
    (
        "vla models",
        &[
            "vision language action models",
            "multimodal models",
            "vision-language-action",
            "vlm",
        ],
    ),
    (
        "embodied ai",
        &[
            "embodied artificial intelligence",
            "physical ai",
            "robotics",
            "embodied intelligence",
        ],
    ),
];

/// Synonyms appended for generic technical terms found in the query.
const TECHNICAL_EXPANSIONS: &[(&str, &[&str])] = &[
    (
        "control",
        &["control system", "controller", "control theory", "feedback control"],
    ),
    (
        "learning",
        &[
            "machine learning",
            "deep learning",
            "reinforcement learning",
            "supervised learning",
        ],
    ),
    ("model", &["models", "neural network", "algorithm", "architecture"]),
    ("vision", &["computer vision", "visual perception", "image processing"]),
    ("language", &["natural language processing", "nlp", "text processing"]),
    (
        "action",
        &["action planning", "motion planning", "robot action", "manipulation"],
    ),
];

/// A deduplicated, quality-rescored retrieval hit.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievedContext {
    pub id: String,
    pub content: String,
    pub url: String,
    pub chapter: String,
    pub section: String,
    pub heading_hierarchy: Vec<String>,
    /// Quality-adjusted similarity, clamped to `[0.0, 1.0]`.
    pub similarity_score: f32,
}

/// Embedding plus vector search, composed into the retrieval pipeline.
#[derive(Debug, Clone)]
pub struct RetrievalEngine {
    embeddings: EmbeddingClient,
    store: VectorStoreClient,
}

impl RetrievalEngine {
    #[inline]
    pub fn new(embeddings: EmbeddingClient, store: VectorStoreClient) -> Self {
        Self { embeddings, store }
    }

    /// Retrieve up to `top_k` unique contexts for the query. Any failure in
    /// embedding or search logs an error and returns an empty list.
    #[inline]
    pub async fn retrieve(&self, query: &str, top_k: usize) -> Vec<RetrievedContext> {
        info!("Retrieving context for query: {}", truncate_for_log(query, 50));

        let hits = match self.search_raw(query, top_k * 3).await {
            Ok(hits) => hits,
            Err(err) => {
                error!("Error retrieving context: {err:#}");
                return Vec::new();
            }
        };

        let contexts = select_contexts(&hits, top_k);
        info!("Retrieved {} unique context chunks after deduplication", contexts.len());
        contexts
    }

    /// Retrieve with automatic query expansion. When the initial search comes
    /// back with weak similarity, or the query mentions a known technical
    /// concept, the query is retried with appended expansion terms and both
    /// result sets are merged through the same deduplicating selection.
    #[inline]
    pub async fn retrieve_with_expansion(
        &self,
        query: &str,
        top_k: usize,
    ) -> Vec<RetrievedContext> {
        info!("Retrieving context for query: {}", truncate_for_log(query, 50));

        let original_hits = match self.search_raw(query, top_k * 2).await {
            Ok(hits) => hits,
            Err(err) => {
                error!("Error retrieving context: {err:#}");
                return Vec::new();
            }
        };

        let avg_similarity = mean_score(&original_hits);
        let query_lower = query.to_lowercase();
        let has_technical_terms =
            EXPANSION_TRIGGERS.iter().any(|term| query_lower.contains(term));

        if avg_similarity < EXPANSION_THRESHOLD || has_technical_terms {
            let expanded = expand_query(query);
            info!(
                "Low similarity detected ({avg_similarity:.3}), expanding query to: {}",
                truncate_for_log(&expanded, 100)
            );

            match self.search_raw(&expanded, top_k * 2).await {
                Ok(expanded_hits) => {
                    let mut combined = original_hits.clone();
                    combined.extend(expanded_hits);
                    let contexts = select_contexts(&combined, top_k);
                    info!(
                        "Retrieved {} unique context chunks for expanded query",
                        contexts.len()
                    );
                    return contexts;
                }
                Err(err) => {
                    warn!("Query expansion failed: {err:#}, falling back to original results");
                }
            }
        }

        select_contexts(&original_hits, top_k)
    }

    async fn search_raw(&self, query: &str, limit: usize) -> anyhow::Result<Vec<ScoredPoint>> {
        let embedding = self.embeddings.embed_query(query).await?;
        Ok(self.store.search(&embedding, limit).await?)
    }
}

/// Append related terms for each known concept or technical term found in
/// the query. The original query text always comes first.
#[inline]
pub fn expand_query(query: &str) -> String {
    let query_lower = query.to_lowercase();
    let mut expanded = query.to_string();

    for (concept, expansions) in CONCEPT_EXPANSIONS {
        if query_lower.contains(concept) {
            expanded.push(' ');
            expanded.push_str(&expansions.join(" "));
        }
    }

    for (term, expansions) in TECHNICAL_EXPANSIONS {
        if query_lower.contains(term) {
            expanded.push(' ');
            expanded.push_str(&expansions.join(" "));
        }
    }

    expanded
}

/// Deduplicate hits by content prefix and source URL, rescore by content
/// quality, and keep the best `top_k` in descending score order.
fn select_contexts(hits: &[ScoredPoint], top_k: usize) -> Vec<RetrievedContext> {
    let mut contexts = Vec::with_capacity(top_k);
    let mut seen_content: HashSet<String> = HashSet::new();
    let mut seen_urls: HashSet<String> = HashSet::new();

    for hit in hits {
        let content = hit.payload.content.trim();
        if content.is_empty() {
            continue;
        }

        let content_key = quality::content_prefix_key(content);
        let url = hit.payload.url.clone();

        if seen_content.contains(&content_key) || (!url.is_empty() && seen_urls.contains(&url)) {
            continue;
        }
        seen_content.insert(content_key);
        if !url.is_empty() {
            seen_urls.insert(url.clone());
        }

        contexts.push(RetrievedContext {
            id: hit.id.clone(),
            content: hit.payload.content.clone(),
            url,
            chapter: hit.payload.chapter.clone(),
            section: hit.payload.section.clone(),
            heading_hierarchy: hit.payload.heading_hierarchy.clone(),
            similarity_score: quality::adjust_score(hit.score, &hit.payload.content),
        });

        if contexts.len() >= top_k {
            break;
        }
    }

    contexts.sort_by(|a, b| b.similarity_score.total_cmp(&a.similarity_score));
    contexts
}

fn mean_score(hits: &[ScoredPoint]) -> f32 {
    if hits.is_empty() {
        return 0.0;
    }
    hits.iter().map(|hit| hit.score).sum::<f32>() / hits.len() as f32
}

fn truncate_for_log(text: &str, max_chars: usize) -> String {
    let truncated: String = text.chars().take(max_chars).collect();
    if truncated.chars().count() < text.chars().count() {
        format!("{truncated}...")
    } else {
        truncated
    }
}
