// Prompt cache: key derivation, the store abstraction and the in-memory store.

use async_trait::async_trait;
use dashmap::DashMap;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

use crate::error::GatewayError;
use crate::metrics::CACHE_SIZE;
use crate::models::GenerationRequest;

const KEY_NAMESPACE: &str = "chart";
const DEFAULT_CHART_LABEL: &str = "default";

// Cache entry with expiry
#[derive(Clone, Debug)]
pub struct CacheEntry {
    pub value: String,
    pub expires_at: Instant,
}

impl CacheEntry {
    pub fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

// Create a cache key: namespace + chart type + sha256 of the exact prompt
pub fn make_cache_key(req: &GenerationRequest) -> String {
    let mut hasher = Sha256::new();
    hasher.update(req.prompt.as_bytes());
    format!(
        "{}_{}_{:x}",
        KEY_NAMESPACE,
        req.chart_type.as_deref().unwrap_or(DEFAULT_CHART_LABEL),
        hasher.finalize()
    )
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    pub keys: usize,
    pub hits: u64,
    pub misses: u64,
}

// Storage behind the proxy. Swap the in-memory store for a shared one by
// implementing this trait.
#[async_trait]
pub trait PromptCache: Send + Sync {
    // Live value for `key`. Expired entries read as absent.
    async fn get(&self, key: &str) -> Result<Option<String>, GatewayError>;

    // Store `value` under `key` for the cache's TTL, replacing any entry.
    async fn set(&self, key: &str, value: String) -> Result<(), GatewayError>;

    async fn clear(&self) -> Result<usize, GatewayError>;

    async fn stats(&self) -> Result<CacheStats, GatewayError>;
}

// Process-local cache on a `DashMap`, with lazy expiry on read and a
// capacity bound.
pub struct MemoryCache {
    entries: DashMap<String, CacheEntry>,
    ttl: Duration,
    max_entries: usize,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl MemoryCache {
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
            max_entries: max_entries.max(1),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    // Remove every expired entry, returning how many went.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.is_live(now));
        let removed = before.saturating_sub(self.entries.len());
        CACHE_SIZE.set(self.entries.len() as f64);
        removed
    }
}

#[async_trait]
impl PromptCache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>, GatewayError> {
        let now = Instant::now();
        if let Some(entry) = self.entries.get(key) {
            if entry.is_live(now) {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Ok(Some(entry.value.clone()));
            }
        }
        // expired entries are removed on read; re-check under the shard lock
        // so a fresh write racing with us survives
        if self
            .entries
            .remove_if(key, |_, entry| !entry.is_live(now))
            .is_some()
        {
            debug!(key, "Cache entry expired, removed");
            CACHE_SIZE.set(self.entries.len() as f64);
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        Ok(None)
    }

    // max_entries is a soft bound: the size check and the insert take
    // different shard locks, so writers racing on distinct new keys can each
    // pass the check and overshoot by at most one entry per racing writer.
    // Overwrites of an existing key never count against the bound.
    async fn set(&self, key: &str, value: String) -> Result<(), GatewayError> {
        let entry = CacheEntry {
            value,
            expires_at: Instant::now() + self.ttl,
        };

        if let Some(mut existing) = self.entries.get_mut(key) {
            *existing = entry;
            return Ok(());
        }

        if self.entries.len() >= self.max_entries {
            self.purge_expired();
            if self.entries.len() >= self.max_entries {
                return Err(GatewayError::Cache(format!(
                    "cache is full ({} entries)",
                    self.max_entries
                )));
            }
        }
        // a racing writer may have created the key meanwhile; last write wins
        self.entries.insert(key.to_string(), entry);
        CACHE_SIZE.set(self.entries.len() as f64);
        Ok(())
    }

    async fn clear(&self) -> Result<usize, GatewayError> {
        let removed = self.entries.len();
        self.entries.clear();
        CACHE_SIZE.set(0.0);
        Ok(removed)
    }

    async fn stats(&self) -> Result<CacheStats, GatewayError> {
        Ok(CacheStats {
            keys: self.entries.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        })
    }
}
