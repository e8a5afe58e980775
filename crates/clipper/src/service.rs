//! The engine's public surface: one service owning every cache.

use std::sync::Arc;

use bytes::Bytes;
use serde::Serialize;
use tracing::{info, warn};

use crate::chunk::ChunkCache;
use crate::config::PreviewConfig;
use crate::error::Result;
use crate::expiry::ExpiryPolicy;
use crate::fetch::Fetcher;
use crate::manifest::{DashInfo, ManifestResolver};
use crate::metadata::MetadataCache;
use crate::model::{
    ClipRequest, ClipResult, PrefetchResult, Quality, SegmentRef, TrackKind, VideoInfo,
};
use crate::pipeline::ClipPipeline;
use crate::play_url::PlayUrlCache;
use crate::resolver::{StreamResolver, YtDlpResolver};
use crate::transcode::{FfmpegTranscoder, MediaTranscoder};

/// Outcome of an explicit cache sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepReport {
    pub chunks_removed: usize,
    pub clips_removed: usize,
    pub play_urls_expired: usize,
    pub manifests_expired: usize,
    pub metadata_expired: usize,
}

pub struct PreviewService {
    config: PreviewConfig,
    metadata: MetadataCache,
    play_urls: PlayUrlCache,
    manifests: ManifestResolver,
    chunks: Arc<ChunkCache>,
    pipeline: ClipPipeline,
}

impl PreviewService {
    /// Build a service backed by the configured external resolver and transcoder.
    pub fn new(config: PreviewConfig) -> Result<Self> {
        let fetcher = Fetcher::new(&config.http)?;
        let resolver = Arc::new(YtDlpResolver::new(config.resolver.clone(), config.http.clone()));
        let transcoder = Arc::new(FfmpegTranscoder::new(&config.transcoder, &config.http));
        Self::with_components(config, fetcher, resolver, transcoder)
    }

    pub fn with_components(
        config: PreviewConfig,
        fetcher: Fetcher,
        resolver: Arc<dyn StreamResolver>,
        transcoder: Arc<dyn MediaTranscoder>,
    ) -> Result<Self> {
        config.validate()?;

        let metadata = MetadataCache::new(resolver.clone(), config.metadata_ttl());
        let play_urls = PlayUrlCache::new(resolver);
        let manifests = ManifestResolver::new(
            fetcher,
            config.api.clone(),
            ExpiryPolicy::from(&config.resolver),
        );
        let chunks = Arc::new(ChunkCache::new(&config, transcoder.clone()));
        let pipeline = ClipPipeline::new(
            &config,
            metadata.clone(),
            play_urls.clone(),
            chunks.clone(),
            transcoder,
        );

        info!(cache_dir = %config.cache_dir.display(), "Preview service ready");
        Ok(Self {
            config,
            metadata,
            play_urls,
            manifests,
            chunks,
            pipeline,
        })
    }

    pub fn config(&self) -> &PreviewConfig {
        &self.config
    }

    /// Local clip for `[start, end)` of the source.
    pub async fn resolve_preview_url(
        &self,
        source_id: &str,
        quality: Quality,
        start: f64,
        end: f64,
    ) -> Result<ClipResult> {
        self.pipeline
            .resolve(&ClipRequest::new(source_id, quality, start, end))
            .await
    }

    /// Warm the chunk cache for `[start, end)` without producing a clip.
    pub async fn prefetch_preview_chunks(
        &self,
        source_id: &str,
        quality: Quality,
        start: f64,
        end: f64,
    ) -> Result<PrefetchResult> {
        self.pipeline
            .prefetch(&ClipRequest::new(source_id, quality, start, end))
            .await
    }

    pub async fn get_dash_info(&self, source_id: &str, quality: Quality) -> Result<Arc<DashInfo>> {
        self.manifests.get(source_id, quality).await
    }

    pub async fn fetch_dash_segment(
        &self,
        source_id: &str,
        quality: Quality,
        track: TrackKind,
        segment: SegmentRef,
    ) -> Result<Bytes> {
        self.manifests
            .fetch_segment(source_id, quality, track, segment)
            .await
    }

    /// Title and duration. Unlike the clip pipeline, failures surface here.
    pub async fn get_video_info(&self, source_id: &str) -> Result<Arc<VideoInfo>> {
        self.metadata.get(source_id).await
    }

    /// Delete stale chunk and clip files and drop expired in-memory entries.
    pub async fn sweep_cache(&self) -> Result<SweepReport> {
        let chunks_removed = self.chunks.sweep().await?;
        let clips_removed = match self.pipeline.sweep().await {
            Ok(n) => n,
            Err(e) => {
                warn!(error = %e, "Clip cache sweep failed");
                0
            }
        };

        let report = SweepReport {
            chunks_removed,
            clips_removed,
            play_urls_expired: self.play_urls.purge_expired(),
            manifests_expired: self.manifests.purge_expired(),
            metadata_expired: self.metadata.purge_expired(),
        };
        info!(?report, "Cache sweep finished");
        Ok(report)
    }
}
