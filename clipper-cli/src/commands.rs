use std::path::Path;

use clipper_engine::{PreviewService, Quality, SegmentRef, TrackKind};
use tracing::info;

use crate::config::AppConfig;
use crate::error::Result;
use crate::output::OutputManager;

pub struct CommandExecutor {
    service: PreviewService,
    output: OutputManager,
}

impl CommandExecutor {
    pub fn new(config: AppConfig, output: OutputManager) -> Result<Self> {
        let service = PreviewService::new(config.engine)?;
        Ok(Self { service, output })
    }

    pub async fn clip(
        &self,
        source_id: &str,
        quality: Quality,
        start: f64,
        end: f64,
    ) -> Result<()> {
        let result = self
            .service
            .resolve_preview_url(source_id, quality, start, end)
            .await?;
        println!("{}", self.output.clip(&result)?);
        Ok(())
    }

    pub async fn prefetch(
        &self,
        source_id: &str,
        quality: Quality,
        start: f64,
        end: f64,
    ) -> Result<()> {
        let result = self
            .service
            .prefetch_preview_chunks(source_id, quality, start, end)
            .await?;
        println!("{}", self.output.prefetch(&result)?);
        Ok(())
    }

    pub async fn dash(&self, source_id: &str, quality: Quality) -> Result<()> {
        let info = self.service.get_dash_info(source_id, quality).await?;
        println!("{}", self.output.dash(&info)?);
        Ok(())
    }

    pub async fn segment(
        &self,
        source_id: &str,
        quality: Quality,
        track: TrackKind,
        index: Option<usize>,
        out: &Path,
    ) -> Result<()> {
        let segment = index.map_or(SegmentRef::Init, SegmentRef::Index);
        let bytes = self
            .service
            .fetch_dash_segment(source_id, quality, track, segment)
            .await?;

        if let Some(parent) = out.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(out, &bytes).await?;
        info!(path = %out.display(), bytes = bytes.len(), "Segment written");

        println!("{}", self.output.segment(out, bytes.len())?);
        Ok(())
    }

    pub async fn info(&self, source_id: &str) -> Result<()> {
        let info = self.service.get_video_info(source_id).await?;
        println!("{}", self.output.info(&info)?);
        Ok(())
    }

    pub async fn sweep(&self) -> Result<()> {
        let report = self.service.sweep_cache().await?;
        println!("{}", self.output.sweep(&report)?);
        Ok(())
    }
}
