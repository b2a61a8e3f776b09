//! Request orchestration.
//!
//! One call runs the whole per-question pipeline: cache lookup, session
//! context, retrieval with expansion, generation, advisory validation,
//! citation extraction, session update, cache fill. An outer wrapper bounds
//! the wall-clock budget and drives an explicit attempt state machine, so a
//! caller always gets a well-formed response no matter what fails
//! underneath.


use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::cache::ResponseCache;
use crate::config::Config;
use crate::generation::prompt::UserPreferences;
use crate::generation::AnswerGenerator;
use crate::retrieval::RetrievalEngine;
use crate::session::SessionStore;
use crate::validation::{
    self, extract_citations, validate_citation_quality, validate_citations, Citation,
};

/// Retries before the degraded attempt. Backoff delays are 0.5s then 1s.
const MAX_RETRIES: u32 = 2;

const TIMEOUT_MESSAGE: &str = "I'm sorry, but I'm taking too long to process your question. \
     Please try rephrasing or ask a more specific question.";

/// The response returned for every chat request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub response: String,
    pub session_id: String,
    pub citations: Vec<Citation>,
    pub retrieved_context_count: usize,
    pub response_time: f64,
}

/// Per-component health snapshot for the service health endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct ComponentHealth {
    pub status: String,
    pub detail: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ServiceHealthReport {
    pub service: String,
    pub status: String,
    pub components: HashMap<String, ComponentHealth>,
    pub overall_response_time: f64,
}

/// Attempt progression for one request. Each state makes at most one full
/// pipeline attempt; the degraded attempt drops user preferences.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AttemptState {
    Attempt,
    Retry { attempt: u32 },
    Degraded,
    Failed,
}

/// Owns every pipeline component for the lifetime of the process.
#[derive(Debug)]
pub struct RagService {
    retrieval: RetrievalEngine,
    generator: AnswerGenerator,
    sessions: Arc<SessionStore>,
    cache: ResponseCache,
    config: Config,
}

impl RagService {
    #[inline]
    pub fn new(
        retrieval: RetrievalEngine,
        generator: AnswerGenerator,
        sessions: Arc<SessionStore>,
        cache: ResponseCache,
        config: Config,
    ) -> Self {
        Self { retrieval, generator, sessions, cache, config }
    }

    #[inline]
    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    /// Process one chat request under the wall-clock budget. The budget
    /// bounds the whole attempt loop, backoff sleeps included; failed
    /// attempts are retried with backoff, then once with preferences
    /// stripped, and whatever is still running at the deadline is cut off
    /// with a canned response. This never returns an error.
    #[inline]
    pub async fn process_request(
        &self,
        question: &str,
        session_id: Option<&str>,
        preferences: UserPreferences,
    ) -> ChatResponse {
        let request_id = Uuid::new_v4().simple().to_string();
        let start = Instant::now();
        let budget = Duration::from_secs(self.config.server.answer_timeout_seconds);
        let deadline = start + budget;

        info!(
            "[{request_id}] Processing chat request: {}",
            truncate_for_log(question, 50)
        );

        let mut state = AttemptState::Attempt;
        loop {
            let (attempt_preferences, label) = match state {
                AttemptState::Attempt => (preferences, "initial"),
                AttemptState::Retry { attempt } => {
                    let delay = Duration::from_millis(500 * (1 << attempt));
                    if delay >= deadline.saturating_duration_since(Instant::now()) {
                        state = AttemptState::Failed;
                        continue;
                    }
                    info!("[{request_id}] Waiting {delay:?} before retry");
                    tokio::time::sleep(delay).await;
                    (preferences, "retry")
                }
                AttemptState::Degraded => (UserPreferences::default(), "degraded"),
                AttemptState::Failed => {
                    warn!("[{request_id}] Answer budget exhausted, returning timeout response");
                    return ChatResponse {
                        response: TIMEOUT_MESSAGE.to_string(),
                        session_id: session_id.unwrap_or("unknown").to_string(),
                        citations: Vec::new(),
                        retrieved_context_count: 0,
                        response_time: start.elapsed().as_secs_f64(),
                    };
                }
            };

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                state = AttemptState::Failed;
                continue;
            }

            let outcome = tokio::time::timeout(
                remaining,
                self.answer_question(question, session_id, attempt_preferences, &request_id),
            )
            .await;

            match outcome {
                Ok(mut response) => {
                    response.response_time = start.elapsed().as_secs_f64();
                    info!(
                        "[{request_id}] Processed request in {:.2}s with {} citations",
                        response.response_time,
                        response.citations.len()
                    );
                    return response;
                }
                Err(_) => {
                    warn!("[{request_id}] {label} attempt hit the {budget:?} answer budget");
                    state = match state {
                        AttemptState::Attempt => AttemptState::Retry { attempt: 0 },
                        AttemptState::Retry { attempt } if attempt + 1 < MAX_RETRIES => {
                            AttemptState::Retry { attempt: attempt + 1 }
                        }
                        AttemptState::Retry { .. } => AttemptState::Degraded,
                        _ => AttemptState::Failed,
                    };
                }
            }
        }
    }

    /// The core per-question pipeline. Degradation happens inside each
    /// component; this function always produces an answer.
    async fn answer_question(
        &self,
        question: &str,
        session_id: Option<&str>,
        preferences: UserPreferences,
        request_id: &str,
    ) -> ChatResponse {
        let start = Instant::now();

        let cache_key = ResponseCache::key(question, session_id, preferences);
        if let Some(cached) = self.cache.get(cache_key) {
            info!("[{request_id}] Returning cached response");
            // Cached answers still count as conversation turns
            self.record_turn(session_id, question, &cached.response, request_id);
            return cached;
        }

        let history = match session_id {
            Some(id) => self.sessions.get_context(id, self.config.session.context_turns),
            None => Vec::new(),
        };
        debug!("[{request_id}] Retrieved {} conversation turns", history.len());

        let contexts = self
            .retrieval
            .retrieve_with_expansion(question, self.config.retrieval.default_top_k)
            .await;

        let generated = self
            .generator
            .generate(question, &contexts, &history, preferences)
            .await;

        let grounding = validation::validate_grounding(&generated.answer, &generated.used_contexts);
        if !generated.used_contexts.is_empty() && !grounding.grounded {
            warn!(
                "[{request_id}] Answer may not be grounded: {}/{} sentences supported",
                grounding.supported_sentences, grounding.checked_sentences
            );
        }

        let citations = extract_citations(&generated.used_contexts);
        let citation_report = validate_citations(&citations, &generated.used_contexts);
        if !citation_report.valid && !generated.used_contexts.is_empty() {
            warn!(
                "[{request_id}] Citation validation issues: {:?}",
                citation_report.details
            );
        }
        let quality_report =
            validate_citation_quality(&citations, validation::DEFAULT_MIN_CONFIDENCE);
        if !quality_report.valid && !citations.is_empty() {
            warn!(
                "[{request_id}] Citation quality below threshold: completeness {:.2}, {}/{} above confidence floor",
                quality_report.completeness_score,
                quality_report.citations_above_threshold,
                quality_report.total_citations
            );
        }

        let response = ChatResponse {
            response: generated.answer,
            session_id: session_id.unwrap_or("unknown").to_string(),
            retrieved_context_count: generated.used_contexts.len(),
            citations,
            response_time: start.elapsed().as_secs_f64(),
        };

        self.record_turn(session_id, question, &response.response, request_id);

        self.cache.put(cache_key, response.clone());
        response
    }

    fn record_turn(
        &self,
        session_id: Option<&str>,
        question: &str,
        response: &str,
        request_id: &str,
    ) {
        if let Some(id) = session_id {
            if self.sessions.add_turn(id, question, response) {
                debug!("[{request_id}] Conversation history updated");
            } else {
                warn!("[{request_id}] Session {id} not found, turn not recorded");
            }
        }
    }

    /// Component round-trip checks for the service health endpoint.
    #[inline]
    pub fn validate_service_health(&self) -> ServiceHealthReport {
        let start = Instant::now();
        let mut components = HashMap::new();

        let test_session = self.sessions.create_session(HashMap::new());
        let session_ok = self.sessions.end_session(&test_session.id);
        components.insert(
            "session_store".to_string(),
            ComponentHealth {
                status: if session_ok { "healthy" } else { "unhealthy" }.to_string(),
                detail: format!("{} active sessions", self.sessions.session_count()),
            },
        );

        components.insert(
            "response_cache".to_string(),
            ComponentHealth {
                status: "healthy".to_string(),
                detail: format!("{} cached responses", self.cache.len()),
            },
        );

        components.insert(
            "retrieval".to_string(),
            ComponentHealth {
                status: "healthy".to_string(),
                detail: format!("collection {}", self.config.vector_store.collection),
            },
        );

        components.insert(
            "generation".to_string(),
            ComponentHealth {
                status: "healthy".to_string(),
                detail: format!("model {}", self.config.completion.model),
            },
        );

        let status = if components.values().all(|c| c.status == "healthy") {
            "healthy"
        } else {
            "unhealthy"
        };

        ServiceHealthReport {
            service: "textbook-rag".to_string(),
            status: status.to_string(),
            components,
            overall_response_time: start.elapsed().as_secs_f64(),
        }
    }
}

fn truncate_for_log(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}
