//! HTTP front end.
//!
//! A thin JSON layer over [`RagService`]: question answering, session
//! lifecycle, and health checks. Pipeline degradation happens below this
//! layer, so handlers only reject malformed input; everything else returns
//! 200 with a well-formed body.
//!
//! | Method   | Path                  | Description                          |
//! |----------|-----------------------|--------------------------------------|
//! | `POST`   | `/chat`               | Answer a question                    |
//! | `POST`   | `/session`            | Create a conversation session        |
//! | `GET`    | `/session/{id}`       | Fetch a session                      |
//! | `DELETE` | `/session/{id}`       | End a session                        |
//! | `GET`    | `/health`             | Liveness check                       |
//! | `GET`    | `/health/service`     | Component health report              |

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::cache::ResponseCache;
use crate::config::Config;
use crate::embeddings::EmbeddingClient;
use crate::generation::completion::CompletionClient;
use crate::generation::prompt::UserPreferences;
use crate::generation::AnswerGenerator;
use crate::retrieval::RetrievalEngine;
use crate::service::{ChatResponse, RagService, ServiceHealthReport};
use crate::session::{ConversationSession, SessionStore};
use crate::vector_store::VectorStoreClient;

#[derive(Clone)]
struct AppState {
    service: Arc<RagService>,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub question: String,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub user_preferences: Option<UserPreferences>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CreateSessionRequest {
    #[serde(default)]
    pub metadata: Option<HashMap<String, Value>>,
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail { code: self.code, message: self.message },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found".to_string(),
        message: message.into(),
    }
}

/// Build the service from configuration and run the HTTP server until the
/// process is terminated. Spawns the periodic session sweep alongside.
#[inline]
pub async fn run_server(config: Config) -> anyhow::Result<()> {
    let service = Arc::new(build_service(&config)?);

    let sweep_sessions = Arc::clone(service.sessions());
    let sweep_interval = Duration::from_secs(config.session.sweep_interval_seconds);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(sweep_interval);
        interval.tick().await;
        loop {
            interval.tick().await;
            sweep_sessions.sweep_expired();
        }
    });

    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let app = router(service);

    info!("Listening on http://{bind_addr}");
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Wire up all pipeline components from validated configuration.
#[inline]
pub fn build_service(config: &Config) -> anyhow::Result<RagService> {
    let embeddings = EmbeddingClient::new(&config.embedding)?;
    let store = VectorStoreClient::new(&config.vector_store)?;
    let completion = CompletionClient::new(&config.completion)?;

    Ok(RagService::new(
        RetrievalEngine::new(embeddings, store),
        AnswerGenerator::new(completion),
        Arc::new(SessionStore::new(&config.session)),
        ResponseCache::new(&config.cache),
        config.clone(),
    ))
}

/// The route table over shared service state.
#[inline]
pub fn router(service: Arc<RagService>) -> Router {
    let state = AppState { service };

    Router::new()
        .route("/chat", post(handle_chat))
        .route("/session", post(handle_create_session))
        .route("/session/{id}", get(handle_get_session).delete(handle_end_session))
        .route("/health", get(handle_health))
        .route("/health/service", get(handle_service_health))
        .with_state(state)
}

async fn handle_chat(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, AppError> {
    if request.question.trim().is_empty() {
        return Err(bad_request("question must not be empty"));
    }

    let response = state
        .service
        .process_request(
            &request.question,
            request.session_id.as_deref(),
            request.user_preferences.unwrap_or_default(),
        )
        .await;

    Ok(Json(response))
}

async fn handle_create_session(
    State(state): State<AppState>,
    request: Option<Json<CreateSessionRequest>>,
) -> Json<ConversationSession> {
    let metadata = request
        .and_then(|Json(body)| body.metadata)
        .unwrap_or_default();
    Json(state.service.sessions().create_session(metadata))
}

async fn handle_get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ConversationSession>, AppError> {
    state
        .service
        .sessions()
        .get_session(&id)
        .map(Json)
        .ok_or_else(|| not_found(format!("no session with id: {id}")))
}

async fn handle_end_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    if state.service.sessions().end_session(&id) {
        Ok(Json(serde_json::json!({ "ended": true, "session_id": id })))
    } else {
        Err(not_found(format!("no session with id: {id}")))
    }
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

async fn handle_service_health(State(state): State<AppState>) -> Json<ServiceHealthReport> {
    Json(state.service.validate_service_health())
}
