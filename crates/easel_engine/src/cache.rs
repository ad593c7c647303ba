//! Content-addressed response cache.
//!
//! The cache key is a deterministic digest of the normalized message and
//! the skill level - the only context fields that influence output.
//! Volatile fields (session ids, timestamps) are excluded by
//! construction, so identical questions under identical conditions
//! always hit. Expiry is logical: expired entries are never served but
//! are left for the LRU to evict.
//!
//! Store unavailability degrades to "always miss" and is logged; it can
//! never fail an orchestration call.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use easel_common::{FinalResponse, SkillLevel};
use lru::LruCache;
use sha2::{Digest, Sha256};
use std::num::NonZeroUsize;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Failure inside the backing key-value store.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache store unavailable: {0}")]
    Unavailable(String),
}

/// One cached acceptance. Only the hit counter and last-accessed stamp
/// are ever updated in place.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CacheEntry {
    pub response: FinalResponse,
    pub provider: String,
    pub expires_at: DateTime<Utc>,
    pub hits: u64,
    pub last_accessed: DateTime<Utc>,
}

/// External key-value store boundary. Assumed to provide atomic get/put.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<CacheEntry>, CacheError>;
    async fn put(&self, key: &str, entry: CacheEntry) -> Result<(), CacheError>;
}

/// Default in-process store: bounded LRU behind an async mutex.
pub struct InMemoryCacheStore {
    entries: Mutex<LruCache<String, CacheEntry>>,
}

impl InMemoryCacheStore {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    /// Drop entries whose expiry has passed. Optional maintenance hook;
    /// correctness never depends on it.
    pub async fn prune_expired(&self) {
        let mut entries = self.entries.lock().await;
        let now = Utc::now();
        let expired: Vec<String> = entries
            .iter()
            .filter(|(_, entry)| entry.expires_at <= now)
            .map(|(key, _)| key.clone())
            .collect();
        for key in expired {
            entries.pop(&key);
        }
    }
}

#[async_trait]
impl CacheStore for InMemoryCacheStore {
    async fn get(&self, key: &str) -> Result<Option<CacheEntry>, CacheError> {
        Ok(self.entries.lock().await.get(key).cloned())
    }

    async fn put(&self, key: &str, entry: CacheEntry) -> Result<(), CacheError> {
        self.entries.lock().await.put(key.to_string(), entry);
        Ok(())
    }
}

/// TTL-aware cache facade used by the orchestrator.
pub struct ResponseCache {
    store: Arc<dyn CacheStore>,
    ttl_secs: u64,
}

impl ResponseCache {
    pub fn new(store: Arc<dyn CacheStore>, ttl_secs: u64) -> Self {
        Self { store, ttl_secs }
    }

    pub fn in_memory(capacity: usize, ttl_secs: u64) -> Self {
        Self::new(Arc::new(InMemoryCacheStore::new(capacity)), ttl_secs)
    }

    /// Deterministic key: sha256 of the normalized message plus the
    /// skill level.
    pub fn cache_key(message: &str, skill_level: SkillLevel) -> String {
        let normalized = normalize_message(message);
        let mut hasher = Sha256::new();
        hasher.update(normalized.as_bytes());
        hasher.update(b"|");
        hasher.update(skill_level.as_str().as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Lookup. Misses on absence, expiry, or store failure; bumps the
    /// hit counter as a side effect of a hit.
    pub async fn get(&self, key: &str) -> Option<FinalResponse> {
        let mut entry = match self.store.get(key).await {
            Ok(Some(entry)) => entry,
            Ok(None) => return None,
            Err(e) => {
                warn!("Cache lookup degraded to miss: {}", e);
                return None;
            }
        };

        if entry.expires_at <= Utc::now() {
            debug!("Cache entry expired for key {}", &key[..12.min(key.len())]);
            return None;
        }

        entry.hits += 1;
        entry.last_accessed = Utc::now();
        let response = entry.response.clone();
        if let Err(e) = self.store.put(key, entry).await {
            warn!("Failed to record cache hit: {}", e);
        }

        Some(response)
    }

    /// Store an accepted response, overwriting any entry for the key.
    /// Best-effort: failures are logged and swallowed.
    pub async fn put(&self, key: &str, response: &FinalResponse) {
        let now = Utc::now();
        let entry = CacheEntry {
            response: response.clone(),
            provider: response.provider.clone(),
            expires_at: now + Duration::seconds(self.ttl_secs as i64),
            hits: 0,
            last_accessed: now,
        };
        if let Err(e) = self.store.put(key, entry).await {
            warn!("Cache write failed (ignored): {}", e);
        }
    }
}

/// Lowercase and collapse whitespace so formatting differences do not
/// defeat the cache.
fn normalize_message(message: &str) -> String {
    message
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
