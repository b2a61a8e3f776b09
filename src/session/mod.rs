//! In-memory conversation sessions.
//!
//! The store is constructed at startup and shared behind an `Arc`; it does
//! not survive a restart. A periodic sweep evicts sessions idle past the
//! configured timeout.

#[cfg(test)]
mod tests;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::SessionConfig;

/// Hard cap on stored turns per session; oldest are dropped first.
const MAX_HISTORY_TURNS: usize = 50;

/// One question/response exchange.
#[derive(Debug, Clone, Serialize)]
pub struct ConversationTurn {
    pub question: String,
    pub response: String,
    pub timestamp: DateTime<Utc>,
}

/// A conversation session with its bounded history.
#[derive(Debug, Clone, Serialize)]
pub struct ConversationSession {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub conversation_history: Vec<ConversationTurn>,
    pub active: bool,
    pub metadata: HashMap<String, Value>,
}

/// Fields a caller may change on an existing session.
#[derive(Debug, Clone, Default)]
pub struct SessionUpdate {
    pub metadata: Option<HashMap<String, Value>>,
    pub active: Option<bool>,
}

/// Thread-safe map of session id to session state. Every read-modify-write
/// happens under one mutex acquisition; no lock is held across await points.
#[derive(Debug)]
pub struct SessionStore {
    sessions: Mutex<HashMap<String, ConversationSession>>,
    timeout: Duration,
}

impl SessionStore {
    #[inline]
    pub fn new(config: &SessionConfig) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            timeout: Duration::minutes(config.timeout_minutes as i64),
        }
    }

    /// Create and register a new session, returning a snapshot of it.
    #[inline]
    pub fn create_session(&self, metadata: HashMap<String, Value>) -> ConversationSession {
        let now = Utc::now();
        let session = ConversationSession {
            id: Uuid::new_v4().to_string(),
            created_at: now,
            last_activity: now,
            conversation_history: Vec::new(),
            active: true,
            metadata,
        };

        info!("Created new session: {}", session.id);
        self.lock().insert(session.id.clone(), session.clone());
        session
    }

    /// Fetch a snapshot of a session, touching its last-activity time.
    #[inline]
    pub fn get_session(&self, session_id: &str) -> Option<ConversationSession> {
        let mut sessions = self.lock();
        let session = sessions.get_mut(session_id)?;
        session.last_activity = Utc::now();
        Some(session.clone())
    }

    /// Append a turn, trimming history to the most recent entries. Returns
    /// false when the session does not exist.
    #[inline]
    pub fn add_turn(&self, session_id: &str, question: &str, response: &str) -> bool {
        let mut sessions = self.lock();
        let Some(session) = sessions.get_mut(session_id) else {
            return false;
        };

        session.conversation_history.push(ConversationTurn {
            question: question.to_string(),
            response: response.to_string(),
            timestamp: Utc::now(),
        });

        if session.conversation_history.len() > MAX_HISTORY_TURNS {
            let excess = session.conversation_history.len() - MAX_HISTORY_TURNS;
            session.conversation_history.drain(..excess);
        }

        session.last_activity = Utc::now();
        debug!(
            "Added conversation turn to session {session_id}, history now has {} items",
            session.conversation_history.len()
        );
        true
    }

    /// The most recent `max_turns` exchanges as (question, response) pairs,
    /// oldest first. Missing sessions yield an empty history.
    #[inline]
    pub fn get_context(&self, session_id: &str, max_turns: usize) -> Vec<(String, String)> {
        let mut sessions = self.lock();
        let Some(session) = sessions.get_mut(session_id) else {
            return Vec::new();
        };
        session.last_activity = Utc::now();

        let history = &session.conversation_history;
        let start = history.len().saturating_sub(max_turns);
        history[start..]
            .iter()
            .map(|turn| (turn.question.clone(), turn.response.clone()))
            .collect()
    }

    /// Apply metadata/active changes. Returns false when the session does
    /// not exist.
    #[inline]
    pub fn update_session(&self, session_id: &str, update: SessionUpdate) -> bool {
        let mut sessions = self.lock();
        let Some(session) = sessions.get_mut(session_id) else {
            return false;
        };

        if let Some(metadata) = update.metadata {
            session.metadata.extend(metadata);
        }
        if let Some(active) = update.active {
            session.active = active;
        }
        session.last_activity = Utc::now();
        true
    }

    /// Remove a session entirely. Returns false when it was not present.
    #[inline]
    pub fn end_session(&self, session_id: &str) -> bool {
        let removed = self.lock().remove(session_id).is_some();
        if removed {
            info!("Ended session: {session_id}");
        }
        removed
    }

    /// Evict sessions idle past the timeout, returning how many were
    /// removed.
    #[inline]
    pub fn sweep_expired(&self) -> usize {
        let now = Utc::now();
        let mut sessions = self.lock();
        let before = sessions.len();
        sessions.retain(|_, session| now - session.last_activity <= self.timeout);
        let removed = before - sessions.len();
        if removed > 0 {
            info!("Cleaned up {removed} expired sessions");
        }
        removed
    }

    /// Number of currently stored sessions.
    #[inline]
    pub fn session_count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, ConversationSession>> {
        self.sessions
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}
