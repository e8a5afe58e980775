//! Thread-safe in-memory cache with per-entry expiry.
//!
//! Entries carry an absolute wall-clock deadline so callers can derive it
//! from data (for example a signed URL's `deadline` parameter) rather than
//! from a fixed TTL.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;

#[derive(Debug)]
struct CacheEntry<V> {
    value: Arc<V>,
    expires_at: DateTime<Utc>,
}

impl<V> CacheEntry<V> {
    fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

pub struct TtlCache<V> {
    entries: Arc<DashMap<String, CacheEntry<V>>>,
}

impl<V> Clone for TtlCache<V> {
    fn clone(&self) -> Self {
        Self {
            entries: Arc::clone(&self.entries),
        }
    }
}

impl<V> Default for TtlCache<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> TtlCache<V> {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
        }
    }

    /// Returns None if not cached or expired.
    pub fn get(&self, key: &str) -> Option<Arc<V>> {
        self.get_at(key, Utc::now())
    }

    /// Lookup against an explicit clock. Expired entries are evicted on the way.
    pub fn get_at(&self, key: &str, now: DateTime<Utc>) -> Option<Arc<V>> {
        let entry = self.entries.get(key)?;

        if entry.is_expired_at(now) {
            drop(entry); // Release the shard lock before removing
            self.entries
                .remove_if(key, |_, entry| entry.is_expired_at(now));
            return None;
        }

        Some(Arc::clone(&entry.value))
    }

    pub fn insert_until(
        &self,
        key: impl Into<String>,
        value: V,
        expires_at: DateTime<Utc>,
    ) -> Arc<V> {
        let value = Arc::new(value);
        self.entries.insert(
            key.into(),
            CacheEntry {
                value: Arc::clone(&value),
                expires_at,
            },
        );
        value
    }

    pub fn insert_for(&self, key: impl Into<String>, value: V, ttl: Duration) -> Arc<V> {
        let ttl = chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX);
        let expires_at = Utc::now()
            .checked_add_signed(ttl)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        self.insert_until(key, value, expires_at)
    }

    pub fn remove(&self, key: &str) -> Option<Arc<V>> {
        self.entries.remove(key).map(|(_, entry)| entry.value)
    }

    pub fn expires_at(&self, key: &str) -> Option<DateTime<Utc>> {
        self.entries.get(key).map(|entry| entry.expires_at)
    }

    /// Number of entries, expired ones included until they are touched or cleaned.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Drop expired entries; returns how many were removed.
    pub fn cleanup_expired(&self) -> usize {
        let now = Utc::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired_at(now));
        before.saturating_sub(self.entries.len())
    }
}
