//! Expiry-aware cache of resolved play locations.

use std::sync::Arc;

use chrono::Utc;
use tracing::debug;

use crate::error::Result;
use crate::model::Quality;
use crate::resolver::{ResolvedPlayLocation, StreamResolver};
use crate::ttl::TtlCache;

#[derive(Clone)]
pub struct PlayUrlCache {
    resolver: Arc<dyn StreamResolver>,
    entries: TtlCache<ResolvedPlayLocation>,
}

fn cache_key(source_id: &str, quality: Quality) -> String {
    format!("{source_id}:{quality}")
}

impl PlayUrlCache {
    pub fn new(resolver: Arc<dyn StreamResolver>) -> Self {
        Self {
            resolver,
            entries: TtlCache::new(),
        }
    }

    /// Cached location if unexpired, otherwise a fresh resolution.
    pub async fn get(
        &self,
        source_id: &str,
        quality: Quality,
    ) -> Result<Arc<ResolvedPlayLocation>> {
        let key = cache_key(source_id, quality);
        if let Some(hit) = self.entries.get_at(&key, Utc::now()) {
            debug!(source_id, %quality, expires_at = %hit.expires_at, "Play URL cache hit");
            return Ok(hit);
        }

        let location = self.resolver.resolve(source_id, quality).await?;
        let expires_at = location.expires_at;
        Ok(self.entries.insert_until(key, location, expires_at))
    }

    pub fn invalidate(&self, source_id: &str, quality: Quality) {
        self.entries.remove(&cache_key(source_id, quality));
    }

    /// Drop expired entries; returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        self.entries.cleanup_expired()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[cfg(test)]
    pub(crate) fn entries(&self) -> &TtlCache<ResolvedPlayLocation> {
        &self.entries
    }
}
