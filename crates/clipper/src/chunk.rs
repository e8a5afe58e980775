//! Disk-backed cache of fixed-length sub-clips ("chunks").
//!
//! A request range is split into windows aligned to multiples of the window
//! size, so overlapping requests land on the same chunk files.
//!
//! Check-then-populate is not guarded: two concurrent misses on the same
//! window both transcode it, each into its own scratch file, and the last
//! rename wins. Both files are complete so readers never observe a partial
//! chunk.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use tracing::{debug, info, warn};

use crate::config::PreviewConfig;
use crate::disk_index::{DiskIndex, DiskKey};
use crate::error::{ClipError, Result};
use crate::interval::{Interval, IntervalSet};
use crate::model::Quality;
use crate::play_url::PlayUrlCache;
use crate::resolver::ResolvedPlayLocation;
use crate::transcode::{MediaTranscoder, TranscodeInput, TranscodeJob, TrimWindow, transcode};

/// Identity of one chunk: source, quality and window in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChunkKey {
    pub source_id: String,
    pub quality: Quality,
    pub start_ms: u64,
    pub end_ms: u64,
}

impl ChunkKey {
    pub fn new(source_id: &str, quality: Quality, window: Interval) -> Self {
        Self {
            source_id: source_id.to_string(),
            quality,
            start_ms: to_millis(window.start),
            end_ms: to_millis(window.end),
        }
    }
}

impl DiskKey for ChunkKey {
    fn identity(&self) -> String {
        format!(
            "{}|{}|{}|{}",
            self.source_id, self.quality, self.start_ms, self.end_ms
        )
    }
}

pub(crate) fn to_millis(secs: f64) -> u64 {
    (secs.max(0.0) * 1000.0).round() as u64
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChunkRecord {
    pub file_path: PathBuf,
    pub window_start: f64,
    pub window_end: f64,
    pub created_at: SystemTime,
}

impl ChunkRecord {
    pub fn window(&self) -> Interval {
        Interval::new(self.window_start, self.window_end)
    }
}

/// Chunks covering one request, in window order.
#[derive(Debug, Clone, Default)]
pub struct ChunkCoverage {
    pub chunks: Vec<ChunkRecord>,
    /// Merged windows transcoded by this call.
    pub fresh: Vec<Interval>,
    /// Merged windows that were already cached.
    pub cached: Vec<Interval>,
}

impl ChunkCoverage {
    /// Every window of the request, merged.
    pub fn covered(&self) -> Vec<Interval> {
        let mut set = IntervalSet::new();
        for chunk in &self.chunks {
            set.add_cached_range(chunk.window_start, chunk.window_end);
        }
        set.intervals().to_vec()
    }
}

/// Windows of `window` seconds aligned to multiples of `window`, covering
/// `[start, end)`; the last one is clipped to `end`.
pub fn plan_windows(start: f64, end: f64, window: f64) -> Vec<Interval> {
    if !(window > 0.0) || end <= start {
        return Vec::new();
    }

    let mut windows = Vec::new();
    let mut k = (start / window).floor() as i64;
    loop {
        let window_start = k as f64 * window;
        if window_start >= end {
            break;
        }
        windows.push(Interval::new(window_start, (window_start + window).min(end)));
        k += 1;
    }
    windows
}

pub struct ChunkCache {
    index: DiskIndex<ChunkKey>,
    transcoder: Arc<dyn MediaTranscoder>,
    window_secs: f64,
    short_window_secs: f64,
    short_request_threshold_secs: f64,
}

impl ChunkCache {
    pub fn new(config: &PreviewConfig, transcoder: Arc<dyn MediaTranscoder>) -> Self {
        Self {
            index: DiskIndex::new(config.chunks_dir(), "chunk", config.chunk_ttl()),
            transcoder,
            window_secs: config.chunk_window_secs,
            short_window_secs: config.short_window_secs,
            short_request_threshold_secs: config.short_request_threshold_secs,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.index.ttl()
    }

    /// Window length used for a request spanning `[start, end)`.
    pub fn window_for(&self, start: f64, end: f64) -> f64 {
        if end - start <= self.short_request_threshold_secs {
            self.short_window_secs
        } else {
            self.window_secs
        }
    }

    pub async fn lookup(&self, key: &ChunkKey) -> Option<ChunkRecord> {
        let record = self.index.lookup(key).await?;
        Some(ChunkRecord {
            file_path: record.path,
            window_start: key.start_ms as f64 / 1000.0,
            window_end: key.end_ms as f64 / 1000.0,
            created_at: record.created_at,
        })
    }

    /// Make sure every window of `[start, end)` exists on disk.
    ///
    /// The play location is resolved at most once, and only when a window
    /// actually has to be transcoded.
    pub async fn ensure(
        &self,
        source_id: &str,
        quality: Quality,
        start: f64,
        end: f64,
        play_urls: &PlayUrlCache,
    ) -> Result<ChunkCoverage> {
        let windows = plan_windows(start, end, self.window_for(start, end));
        if windows.is_empty() {
            return Err(ClipError::invalid_request(format!(
                "empty chunk range [{start}, {end})"
            )));
        }

        let mut location: Option<Arc<ResolvedPlayLocation>> = None;
        let mut swept = false;
        let mut fresh = IntervalSet::new();
        let mut cached = IntervalSet::new();
        let mut chunks = Vec::with_capacity(windows.len());

        for window in windows {
            let key = ChunkKey::new(source_id, quality, window);

            if let Some(record) = self.lookup(&key).await {
                debug!(
                    source_id,
                    %quality,
                    window_start = window.start,
                    window_end = window.end,
                    "Chunk cache hit"
                );
                cached.add_cached_range(window.start, window.end);
                chunks.push(record);
                continue;
            }

            if !swept {
                self.index.ensure_dir().await?;
                if let Err(e) = self.index.sweep().await {
                    warn!(error = %e, "Chunk cache sweep failed");
                }
                swept = true;
            }

            let resolved = match location.clone() {
                Some(resolved) => resolved,
                None => {
                    let resolved = play_urls.get(source_id, quality).await?;
                    location = Some(Arc::clone(&resolved));
                    resolved
                }
            };

            let record = self.populate(&key, window, &resolved).await?;
            fresh.add_cached_range(window.start, window.end);
            chunks.push(record);
        }

        Ok(ChunkCoverage {
            chunks,
            fresh: fresh.intervals().to_vec(),
            cached: cached.intervals().to_vec(),
        })
    }

    async fn populate(
        &self,
        key: &ChunkKey,
        window: Interval,
        location: &ResolvedPlayLocation,
    ) -> Result<ChunkRecord> {
        let final_path = self.index.path_for(key);
        let part_path = self.index.part_path_for(key);

        let job = TranscodeJob {
            inputs: location
                .urls
                .iter()
                .map(|url| TranscodeInput::Remote { url: url.clone() })
                .collect(),
            trim: Some(TrimWindow {
                start: window.start,
                duration: window.len(),
            }),
            output: part_path.clone(),
        };

        let mode = transcode(self.transcoder.as_ref(), &job).await?;
        tokio::fs::rename(&part_path, &final_path)
            .await
            .map_err(|e| ClipError::io_path("finalizing chunk", &part_path, e))?;

        info!(
            source_id = %key.source_id,
            quality = %key.quality,
            window_start = window.start,
            window_end = window.end,
            %mode,
            "Chunk materialized"
        );

        let record = self.index.insert(key.clone(), final_path);
        Ok(ChunkRecord {
            file_path: record.path,
            window_start: window.start,
            window_end: window.end,
            created_at: record.created_at,
        })
    }

    pub async fn sweep(&self) -> Result<usize> {
        self.index.sweep().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_doubles::{MockResolver, MockTranscoder};
    use crate::transcode::CodecMode;
    use tempfile::TempDir;

    fn cache(dir: &TempDir, transcoder: Arc<MockTranscoder>) -> ChunkCache {
        let config = PreviewConfig {
            cache_dir: dir.path().to_path_buf(),
            ..Default::default()
        };
        ChunkCache::new(&config, transcoder)
    }

    #[test]
    fn test_plan_windows_aligns_and_clips() {
        let windows = plan_windows(5.0, 35.0, 3.0);
        assert_eq!(windows.len(), 11);
        assert_eq!(windows[0], Interval::new(3.0, 6.0));
        assert_eq!(windows[9], Interval::new(30.0, 33.0));
        assert_eq!(windows[10], Interval::new(33.0, 35.0));
        for pair in windows.windows(2) {
            assert_eq!(pair[0].end, pair[1].start);
        }
    }

    #[test]
    fn test_plan_windows_edge_cases() {
        assert_eq!(plan_windows(6.0, 9.0, 3.0), vec![Interval::new(6.0, 9.0)]);
        assert_eq!(
            plan_windows(0.5, 2.5, 1.0),
            vec![
                Interval::new(0.0, 1.0),
                Interval::new(1.0, 2.0),
                Interval::new(2.0, 2.5)
            ]
        );
        assert!(plan_windows(4.0, 4.0, 3.0).is_empty());
        assert!(plan_windows(0.0, 4.0, 0.0).is_empty());
    }

    #[test]
    fn test_short_requests_use_short_windows() {
        let dir = TempDir::new().unwrap();
        let cache = cache(&dir, Arc::new(MockTranscoder::new()));
        assert_eq!(cache.window_for(10.0, 12.5), 1.0);
        assert_eq!(cache.window_for(10.0, 13.0), 1.0);
        assert_eq!(cache.window_for(10.0, 20.0), 3.0);
    }

    #[test]
    fn test_chunk_key_identity_uses_millis() {
        let key = ChunkKey::new("BV1", Quality::P720, Interval::new(3.0, 6.0004));
        assert_eq!(key.identity(), "BV1|720p|3000|6000");
    }

    #[tokio::test]
    async fn test_ensure_populates_then_reuses() {
        let dir = TempDir::new().unwrap();
        let transcoder = Arc::new(MockTranscoder::new());
        let resolver = Arc::new(MockResolver::split("https://cdn/v.m4s", "https://cdn/a.m4s"));
        let play_urls = PlayUrlCache::new(resolver.clone());
        let cache = cache(&dir, transcoder.clone());

        let first = cache.ensure("BV1", Quality::P720, 4.0, 12.0, &play_urls).await.unwrap();
        assert_eq!(first.chunks.len(), 3);
        assert_eq!(first.fresh, vec![Interval::new(3.0, 12.0)]);
        assert!(first.cached.is_empty());
        assert_eq!(resolver.resolve_calls(), 1);

        let calls = transcoder.calls();
        assert_eq!(calls.len(), 3);
        let (job, mode) = &calls[0];
        assert_eq!(*mode, CodecMode::Copy);
        assert_eq!(job.inputs.len(), 2);
        assert_eq!(job.trim, Some(TrimWindow { start: 3.0, duration: 3.0 }));
        assert!(first.chunks.iter().all(|c| c.file_path.exists()));

        transcoder.clear();
        let second = cache.ensure("BV1", Quality::P720, 7.0, 15.0, &play_urls).await.unwrap();
        assert_eq!(second.cached, vec![Interval::new(6.0, 12.0)]);
        assert_eq!(second.fresh, vec![Interval::new(12.0, 15.0)]);
        assert_eq!(transcoder.calls().len(), 1);
        assert_eq!(second.covered(), vec![Interval::new(6.0, 15.0)]);
    }

    #[tokio::test]
    async fn test_fully_cached_range_never_resolves() {
        let dir = TempDir::new().unwrap();
        let transcoder = Arc::new(MockTranscoder::new());
        let resolver = Arc::new(MockResolver::muxed("https://cdn/v.mp4"));
        let cache = cache(&dir, transcoder.clone());

        cache
            .ensure("BV1", Quality::P720, 0.0, 6.0, &PlayUrlCache::new(resolver.clone()))
            .await
            .unwrap();

        // A new play-url cache: only a miss would need it.
        let fresh_resolver = Arc::new(MockResolver::muxed("https://cdn/v.mp4"));
        let coverage = cache
            .ensure("BV1", Quality::P720, 0.0, 6.0, &PlayUrlCache::new(fresh_resolver.clone()))
            .await
            .unwrap();
        assert!(coverage.fresh.is_empty());
        assert_eq!(fresh_resolver.resolve_calls(), 0);
    }

    #[tokio::test]
    async fn test_transcode_failure_leaves_no_chunk() {
        let dir = TempDir::new().unwrap();
        let transcoder = Arc::new(MockTranscoder::always_failing());
        let resolver = Arc::new(MockResolver::muxed("https://cdn/v.mp4"));
        let cache = cache(&dir, transcoder.clone());

        let err = cache
            .ensure("BV1", Quality::P720, 0.0, 3.0, &PlayUrlCache::new(resolver))
            .await
            .unwrap_err();
        assert!(matches!(err, ClipError::Transcode { .. }));

        let key = ChunkKey::new("BV1", Quality::P720, Interval::new(0.0, 1.0));
        assert!(cache.lookup(&key).await.is_none());
    }

    #[tokio::test]
    async fn test_concurrent_misses_on_one_window_both_succeed() {
        let dir = TempDir::new().unwrap();
        let transcoder = Arc::new(MockTranscoder::slow(Duration::from_millis(100)));
        let resolver = Arc::new(MockResolver::muxed("https://cdn/v.mp4"));
        let play_urls = PlayUrlCache::new(resolver);
        let cache = cache(&dir, transcoder.clone());

        let (a, b) = tokio::join!(
            cache.ensure("BV1", Quality::P720, 0.0, 3.0, &play_urls),
            cache.ensure("BV1", Quality::P720, 0.0, 3.0, &play_urls),
        );
        let (a, b) = (a.unwrap(), b.unwrap());
        assert_eq!(a.chunks.len(), 3);
        assert_eq!(b.chunks.len(), 3);
        assert_eq!(transcoder.calls().len(), 6);

        let outputs: std::collections::HashSet<_> =
            transcoder.calls().into_iter().map(|(job, _)| job.output).collect();
        assert_eq!(outputs.len(), 6);

        for (x, y) in a.chunks.iter().zip(&b.chunks) {
            assert_eq!(x.file_path, y.file_path);
            assert_eq!(std::fs::read(&x.file_path).unwrap(), b"mp4");
        }
        let leftovers = std::fs::read_dir(cache.index.dir())
            .unwrap()
            .filter(|e| e.as_ref().unwrap().path().to_string_lossy().ends_with(".part.mp4"))
            .count();
        assert_eq!(leftovers, 0);
    }
}
