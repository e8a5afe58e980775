//! Clip assembly: metadata, chunk coverage, concatenation and the final cut.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, instrument};
use url::Url;

use crate::chunk::{ChunkCache, ChunkCoverage, to_millis};
use crate::config::PreviewConfig;
use crate::disk_index::{DiskIndex, DiskKey};
use crate::error::{ClipError, Result};
use crate::interval::Interval;
use crate::metadata::MetadataCache;
use crate::model::{ClipRequest, ClipResult, PrefetchResult, Quality, VideoInfo};
use crate::play_url::PlayUrlCache;
use crate::transcode::{
    MediaTranscoder, TranscodeInput, TranscodeJob, TrimWindow, transcode, write_concat_list,
};

/// Identity of one assembled clip; the range is rounded to milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResultKey {
    pub source_id: String,
    pub quality: Quality,
    pub start_ms: u64,
    pub end_ms: u64,
}

impl ResultKey {
    pub fn new(source_id: &str, quality: Quality, start: f64, end: f64) -> Self {
        Self {
            source_id: source_id.to_string(),
            quality,
            start_ms: to_millis(start),
            end_ms: to_millis(end),
        }
    }
}

impl DiskKey for ResultKey {
    fn identity(&self) -> String {
        format!(
            "clip|{}|{}|{}|{}",
            self.source_id, self.quality, self.start_ms, self.end_ms
        )
    }
}

/// Clamp `[start, end)` to `[0, duration]` when the duration is known.
pub fn clamp_range(start: f64, end: f64, duration: f64) -> Result<(f64, f64)> {
    if !(start.is_finite() && end.is_finite()) {
        return Err(ClipError::invalid_request(format!(
            "non-finite range [{start}, {end})"
        )));
    }

    let mut start = start.max(0.0);
    let mut end = end;
    if duration > 0.0 {
        start = start.min(duration);
        end = end.min(duration);
    }
    if end <= start {
        return Err(ClipError::invalid_request(format!(
            "empty range [{start}, {end}) after clamping to duration {duration}"
        )));
    }
    Ok((start, end))
}

fn file_url(path: &Path) -> String {
    Url::from_file_path(path)
        .map(|u| u.to_string())
        .unwrap_or_else(|_| format!("file://{}", path.display()))
}

async fn remove_quietly(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await
        && e.kind() != std::io::ErrorKind::NotFound
    {
        debug!(path = %path.display(), error = %e, "Failed to remove temporary file");
    }
}

pub struct ClipPipeline {
    metadata: MetadataCache,
    play_urls: PlayUrlCache,
    chunks: Arc<ChunkCache>,
    results: DiskIndex<ResultKey>,
    transcoder: Arc<dyn MediaTranscoder>,
}

impl ClipPipeline {
    pub fn new(
        config: &PreviewConfig,
        metadata: MetadataCache,
        play_urls: PlayUrlCache,
        chunks: Arc<ChunkCache>,
        transcoder: Arc<dyn MediaTranscoder>,
    ) -> Self {
        Self {
            metadata,
            play_urls,
            chunks,
            results: DiskIndex::new(config.clips_dir(), "clip", config.result_ttl()),
            transcoder,
        }
    }

    /// Produce a local file covering exactly the requested range.
    #[instrument(skip(self), fields(source_id = %request.source_id, quality = %request.quality))]
    pub async fn resolve(&self, request: &ClipRequest) -> Result<ClipResult> {
        let info = self.metadata.get_or_default(&request.source_id).await;
        let (start, end) = clamp_range(request.start, request.end, info.duration)?;
        let key = ResultKey::new(&request.source_id, request.quality, start, end);

        if let Some(record) = self.results.lookup(&key).await {
            debug!(start, end, "Clip served from result cache");
            return Ok(Self::result(
                &info,
                record.path,
                start,
                end,
                vec![Interval::new(start, end)],
                true,
            ));
        }

        let coverage = self
            .chunks
            .ensure(&request.source_id, request.quality, start, end, &self.play_urls)
            .await?;

        self.results.ensure_dir().await?;
        let output = self.results.path_for(&key);
        let part = self.results.part_path_for(&key);
        self.assemble(&coverage, start, end, &part).await?;
        tokio::fs::rename(&part, &output)
            .await
            .map_err(|e| ClipError::io_path("finalizing clip", &part, e))?;
        self.results.insert(key, output.clone());

        info!(
            start,
            end,
            chunks = coverage.chunks.len(),
            fresh = coverage.fresh.len(),
            "Clip assembled"
        );
        Ok(Self::result(&info, output, start, end, coverage.covered(), false))
    }

    /// Materialize the chunks of the requested range without cutting a clip.
    #[instrument(skip(self), fields(source_id = %request.source_id, quality = %request.quality))]
    pub async fn prefetch(&self, request: &ClipRequest) -> Result<PrefetchResult> {
        let info = self.metadata.get_or_default(&request.source_id).await;
        let (start, end) = clamp_range(request.start, request.end, info.duration)?;

        let coverage = self
            .chunks
            .ensure(&request.source_id, request.quality, start, end, &self.play_urls)
            .await?;

        Ok(PrefetchResult {
            segment_start: start,
            segment_end: end,
            cached_ranges: coverage.covered(),
            fresh_ranges: coverage.fresh,
            reused_ranges: coverage.cached,
        })
    }

    pub async fn sweep(&self) -> Result<usize> {
        self.results.sweep().await
    }

    async fn assemble(
        &self,
        coverage: &ChunkCoverage,
        start: f64,
        end: f64,
        output: &Path,
    ) -> Result<()> {
        let first = coverage
            .chunks
            .first()
            .ok_or_else(|| ClipError::invalid_request("no chunks cover the requested range"))?;
        let trim = Some(TrimWindow {
            start: (start - first.window_start).max(0.0),
            duration: end - start,
        });

        if let [only] = coverage.chunks.as_slice() {
            let job = TranscodeJob {
                inputs: vec![TranscodeInput::File(only.file_path.clone())],
                trim,
                output: output.to_path_buf(),
            };
            transcode(self.transcoder.as_ref(), &job).await?;
            return Ok(());
        }

        let list = output.with_extension("concat.txt");
        let joined = output.with_extension("concat.mp4");
        let result = self
            .concat_then_cut(coverage, &list, &joined, trim, output)
            .await;
        remove_quietly(&list).await;
        remove_quietly(&joined).await;
        result
    }

    async fn concat_then_cut(
        &self,
        coverage: &ChunkCoverage,
        list: &Path,
        joined: &Path,
        trim: Option<TrimWindow>,
        output: &Path,
    ) -> Result<()> {
        let files: Vec<PathBuf> = coverage.chunks.iter().map(|c| c.file_path.clone()).collect();
        write_concat_list(list, &files).await?;

        let concat = TranscodeJob {
            inputs: vec![TranscodeInput::ConcatList(list.to_path_buf())],
            trim: None,
            output: joined.to_path_buf(),
        };
        let mode = transcode(self.transcoder.as_ref(), &concat).await?;
        debug!(chunks = files.len(), %mode, "Chunks concatenated");

        let cut = TranscodeJob {
            inputs: vec![TranscodeInput::File(joined.to_path_buf())],
            trim,
            output: output.to_path_buf(),
        };
        transcode(self.transcoder.as_ref(), &cut).await?;
        Ok(())
    }

    fn result(
        info: &VideoInfo,
        path: PathBuf,
        start: f64,
        end: f64,
        cached_ranges: Vec<Interval>,
        from_cache: bool,
    ) -> ClipResult {
        ClipResult {
            url: file_url(&path),
            path,
            title: info.title.clone(),
            duration: info.duration,
            segment_start: start,
            segment_end: end,
            cached_ranges,
            from_cache,
        }
    }
}
