//! Recording stand-ins for the resolver and transcoder.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use crate::error::{ClipError, Result};
use crate::model::Quality;
use crate::resolver::{RawMetadata, ResolvedPlayLocation, StreamResolver};
use crate::transcode::{CodecMode, MediaTranscoder, TranscodeJob};

pub struct MockResolver {
    urls: Vec<String>,
    valid_for: chrono::Duration,
    metadata: Option<RawMetadata>,
    resolve_calls: AtomicUsize,
    metadata_calls: AtomicUsize,
}

impl MockResolver {
    pub fn muxed(url: &str) -> Self {
        Self {
            urls: vec![url.to_string()],
            valid_for: chrono::Duration::hours(1),
            metadata: None,
            resolve_calls: AtomicUsize::new(0),
            metadata_calls: AtomicUsize::new(0),
        }
    }

    pub fn split(video: &str, audio: &str) -> Self {
        Self {
            urls: vec![video.to_string(), audio.to_string()],
            ..Self::muxed(video)
        }
    }

    pub fn with_metadata(mut self, title: &str, duration: f64) -> Self {
        self.metadata = Some(RawMetadata {
            title: title.to_string(),
            duration: Some(duration),
            duration_string: None,
        });
        self
    }

    /// Resolved locations are already expired when returned.
    pub fn expiring(mut self) -> Self {
        self.valid_for = chrono::Duration::seconds(-1);
        self
    }

    pub fn resolve_calls(&self) -> usize {
        self.resolve_calls.load(Ordering::SeqCst)
    }

    pub fn metadata_calls(&self) -> usize {
        self.metadata_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StreamResolver for MockResolver {
    async fn resolve(&self, _source_id: &str, _quality: Quality) -> Result<ResolvedPlayLocation> {
        self.resolve_calls.fetch_add(1, Ordering::SeqCst);
        Ok(ResolvedPlayLocation {
            urls: self.urls.clone(),
            selector: "best".to_string(),
            expires_at: Utc::now() + self.valid_for,
        })
    }

    async fn metadata(&self, source_id: &str) -> Result<RawMetadata> {
        self.metadata_calls.fetch_add(1, Ordering::SeqCst);
        self.metadata
            .clone()
            .ok_or_else(|| ClipError::resolution(format!("no metadata for {source_id}")))
    }
}

#[derive(Default)]
pub struct MockTranscoder {
    fail_copy: bool,
    fail_encode: bool,
    delay: Option<Duration>,
    calls: Mutex<Vec<(TranscodeJob, CodecMode)>>,
}

impl MockTranscoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_copy() -> Self {
        Self {
            fail_copy: true,
            ..Self::default()
        }
    }

    pub fn always_failing() -> Self {
        Self {
            fail_copy: true,
            fail_encode: true,
            ..Self::default()
        }
    }

    /// Hold every run open for `delay` between the partial and final write.
    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<(TranscodeJob, CodecMode)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn modes(&self) -> Vec<CodecMode> {
        self.calls().into_iter().map(|(_, mode)| mode).collect()
    }

    pub fn clear(&self) {
        self.calls.lock().unwrap().clear();
    }
}

#[async_trait]
impl MediaTranscoder for MockTranscoder {
    async fn run(&self, job: &TranscodeJob, mode: CodecMode) -> Result<()> {
        self.calls.lock().unwrap().push((job.clone(), mode));

        let fail = match mode {
            CodecMode::Copy => self.fail_copy,
            CodecMode::Encode => self.fail_encode,
        };
        // Leave a partial file behind, like a real tool would.
        tokio::fs::write(&job.output, b"partial").await.unwrap();
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if fail {
            return Err(ClipError::transcode(format!("{mode} rejected")));
        }
        tokio::fs::write(&job.output, b"mp4").await.unwrap();
        Ok(())
    }
}
