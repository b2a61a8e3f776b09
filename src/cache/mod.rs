//! Bounded response cache.
//!
//! Keys hash the normalized question together with the session id and answer
//! preferences, so a follow-up in a different session or with different
//! preferences never collides. Entries expire lazily on read after the TTL
//! and the least recently used entry is evicted when the cache is full.


use std::collections::HashMap;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::config::CacheConfig;
use crate::generation::prompt::UserPreferences;
use crate::service::ChatResponse;

#[derive(Debug, Clone)]
struct CacheEntry {
    response: ChatResponse,
    inserted_at: Instant,
    last_used: Instant,
}

/// LRU response cache with per-entry TTL.
#[derive(Debug)]
pub struct ResponseCache {
    entries: Mutex<HashMap<u64, CacheEntry>>,
    capacity: usize,
    ttl: Duration,
}

impl ResponseCache {
    #[inline]
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            capacity: config.capacity,
            ttl: Duration::from_secs(config.ttl_seconds),
        }
    }

    /// Cache key for one request. The question is trimmed and lowercased so
    /// trivial rephrasings of whitespace and case still hit.
    #[inline]
    pub fn key(
        question: &str,
        session_id: Option<&str>,
        preferences: UserPreferences,
    ) -> u64 {
        let mut hasher = DefaultHasher::new();
        question.trim().to_lowercase().hash(&mut hasher);
        session_id.hash(&mut hasher);
        preferences.hash(&mut hasher);
        hasher.finish()
    }

    /// Look up a cached response, refreshing its LRU position. Expired
    /// entries are dropped on the way out.
    #[inline]
    pub fn get(&self, key: u64) -> Option<ChatResponse> {
        let mut entries = self.lock();
        let now = Instant::now();

        if let Some(entry) = entries.get_mut(&key) {
            if now.duration_since(entry.inserted_at) <= self.ttl {
                entry.last_used = now;
                debug!("Cache hit for key {key}");
                return Some(entry.response.clone());
            }
            entries.remove(&key);
            debug!("Cache entry for key {key} expired");
        }

        None
    }

    /// Store a response, evicting the least recently used entry when full.
    #[inline]
    pub fn put(&self, key: u64, response: ChatResponse) {
        let mut entries = self.lock();
        let now = Instant::now();

        if entries.len() >= self.capacity && !entries.contains_key(&key) {
            if let Some(oldest) = entries
                .iter()
                .min_by_key(|(_, entry)| entry.last_used)
                .map(|(k, _)| *k)
            {
                entries.remove(&oldest);
                debug!("Evicted least recently used cache entry {oldest}");
            }
        }

        entries.insert(
            key,
            CacheEntry { response, inserted_at: now, last_used: now },
        );
    }

    /// Number of live entries, counting not-yet-collected expired ones.
    #[inline]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<u64, CacheEntry>> {
        self.entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}
