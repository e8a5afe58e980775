//! Title/duration lookups, cached for a day.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::Result;
use crate::model::VideoInfo;
use crate::resolver::StreamResolver;
use crate::ttl::TtlCache;

/// Parse `H:MM:SS`, `MM:SS` or plain seconds.
pub fn parse_clock_duration(text: &str) -> Option<f64> {
    let parts: Vec<&str> = text.trim().split(':').collect();
    if parts.is_empty() || parts.len() > 3 {
        return None;
    }

    let mut total = 0.0;
    for part in parts {
        let value: f64 = part.trim().parse().ok()?;
        if !value.is_finite() || value < 0.0 {
            return None;
        }
        total = total * 60.0 + value;
    }
    Some(total)
}

#[derive(Clone)]
pub struct MetadataCache {
    resolver: Arc<dyn StreamResolver>,
    entries: TtlCache<VideoInfo>,
    ttl: Duration,
}

impl MetadataCache {
    pub fn new(resolver: Arc<dyn StreamResolver>, ttl: Duration) -> Self {
        Self {
            resolver,
            entries: TtlCache::new(),
            ttl,
        }
    }

    pub async fn get(&self, source_id: &str) -> Result<Arc<VideoInfo>> {
        if let Some(hit) = self.entries.get(source_id) {
            debug!(source_id, "Metadata cache hit");
            return Ok(hit);
        }

        let raw = self.resolver.metadata(source_id).await?;
        let duration = raw
            .duration
            .or_else(|| raw.duration_string.as_deref().and_then(parse_clock_duration))
            .unwrap_or(0.0);
        let info = VideoInfo {
            title: raw.title,
            duration,
        };
        Ok(self.entries.insert_for(source_id, info, self.ttl))
    }

    pub fn purge_expired(&self) -> usize {
        self.entries.cleanup_expired()
    }

    /// Like [`Self::get`], but a failure degrades to an empty title and a zero
    /// duration. Failures are not cached.
    pub async fn get_or_default(&self, source_id: &str) -> VideoInfo {
        match self.get(source_id).await {
            Ok(info) => info.as_ref().clone(),
            Err(e) => {
                warn!(source_id, error = %e, "Metadata lookup failed; continuing without it");
                VideoInfo::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_doubles::MockResolver;

    #[test]
    fn test_parse_clock_duration() {
        assert_eq!(parse_clock_duration("1:02:03"), Some(3723.0));
        assert_eq!(parse_clock_duration("02:03"), Some(123.0));
        assert_eq!(parse_clock_duration("45"), Some(45.0));
        assert_eq!(parse_clock_duration("1:2:3:4"), None);
        assert_eq!(parse_clock_duration("abc"), None);
        assert_eq!(parse_clock_duration(""), None);
    }

    #[tokio::test]
    async fn test_get_caches_result() {
        let resolver =
            Arc::new(MockResolver::muxed("https://cdn/v.mp4").with_metadata("Title", 120.0));
        let cache = MetadataCache::new(resolver.clone(), Duration::from_secs(86400));

        let info = cache.get("BV1").await.unwrap();
        assert_eq!(info.title, "Title");
        assert_eq!(info.duration, 120.0);
        cache.get("BV1").await.unwrap();
        assert_eq!(resolver.metadata_calls(), 1);
    }

    #[tokio::test]
    async fn test_failure_degrades_and_is_retried() {
        let resolver = Arc::new(MockResolver::muxed("https://cdn/v.mp4"));
        let cache = MetadataCache::new(resolver.clone(), Duration::from_secs(86400));

        assert_eq!(cache.get_or_default("BV1").await, VideoInfo::default());
        assert_eq!(cache.get_or_default("BV1").await, VideoInfo::default());
        assert_eq!(resolver.metadata_calls(), 2);
    }
}
