//! Process-lifetime TTL cache for sanitized activity content.
//!
//! Entries expire lazily: a read that finds an entry past its deadline
//! removes it and reports a miss. There is no background sweep and no
//! capacity bound.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use sha2::{Digest, Sha256};
use tokio::time::Instant;

/// Default time-to-live for cached content.
pub const DEFAULT_TTL: Duration = Duration::from_secs(3600);

/// Prefix of every activity cache key.
pub const ACTIVITY_KEY_PREFIX: &str = "activity:";

/// Hex SHA-256 digest of a URL.
pub fn fingerprint(url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(url.as_bytes());
    hex::encode(hasher.finalize())
}

/// Cache key for an activity URL: `activity:<fingerprint>`.
///
/// This format is visible to callers of [`ContentService::invalidate`](crate::ContentService::invalidate)
/// and must stay stable.
pub fn activity_key(url: &str) -> String {
    format!("{ACTIVITY_KEY_PREFIX}{}", fingerprint(url))
}

#[derive(Debug, Clone)]
struct CacheEntry {
    value: String,
    created_at: Instant,
    ttl: Duration,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        now.duration_since(self.created_at) >= self.ttl
    }
}

/// Keyed TTL cache guarded by a mutex.
///
/// Share it between services with an `Arc`.
#[derive(Debug)]
pub struct FingerprintCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
    default_ttl: Duration,
}

impl FingerprintCache {
    /// Create an empty cache whose [`insert`](Self::insert) uses `default_ttl`.
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            default_ttl,
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, CacheEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Return the cached value, or `None` if missing or expired.
    ///
    /// An expired entry is removed as a side effect.
    pub fn get(&self, key: &str) -> Option<String> {
        let mut entries = self.lock();
        let entry = entries.get(key)?;

        if entry.is_expired(Instant::now()) {
            tracing::debug!("Cache entry expired: {key}");
            entries.remove(key);
            return None;
        }

        Some(entry.value.clone())
    }

    /// Insert or overwrite a value with the default TTL.
    pub fn insert(&self, key: impl Into<String>, value: impl Into<String>) {
        self.insert_with_ttl(key, value, self.default_ttl);
    }

    /// Insert or overwrite a value with an explicit TTL.
    pub fn insert_with_ttl(&self, key: impl Into<String>, value: impl Into<String>, ttl: Duration) {
        let entry = CacheEntry {
            value: value.into(),
            created_at: Instant::now(),
            ttl,
        };
        self.lock().insert(key.into(), entry);
    }

    /// Remove a single entry. Returns `true` if it was present.
    pub fn remove(&self, key: &str) -> bool {
        self.lock().remove(key).is_some()
    }

    /// Remove every entry.
    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Number of stored entries, including expired ones not yet read.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// The TTL applied by [`insert`](Self::insert).
    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }
}

impl Default for FingerprintCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}
