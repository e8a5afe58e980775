use std::fmt::Write as _;

use clipper_engine::{
    ClipResult, DashInfo, DashTrack, Interval, PrefetchResult, SweepReport, VideoInfo,
};
#[cfg(feature = "colored-output")]
use colored::*;
use serde::Serialize;

use crate::{cli::OutputFormat, error::Result};

#[derive(Debug, Clone, Copy)]
enum Tone {
    Heading,
    Label,
    Value,
    Link,
}

#[derive(Debug, Clone, Copy)]
pub struct OutputManager {
    format: OutputFormat,
    colored: bool,
}

impl OutputManager {
    pub fn new(format: OutputFormat, colored: bool) -> Self {
        Self { format, colored }
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    fn render<T: Serialize + ?Sized>(
        &self,
        value: &T,
        pretty: impl FnOnce() -> String,
    ) -> Result<String> {
        match self.format {
            OutputFormat::Pretty => Ok(pretty()),
            OutputFormat::Json => Ok(serde_json::to_string_pretty(value)?),
            OutputFormat::JsonCompact => Ok(serde_json::to_string(value)?),
        }
    }

    pub fn clip(&self, result: &ClipResult) -> Result<String> {
        self.render(result, || {
            let mut out = self.heading("Clip");
            self.field(&mut out, "Title", &result.title);
            let range = format!("{:.3}s - {:.3}s", result.segment_start, result.segment_end);
            self.field(&mut out, "Range", &range);
            self.field(&mut out, "Source duration", &format_secs(result.duration));
            self.field(&mut out, "Cached", &format_ranges(&result.cached_ranges));
            self.field(&mut out, "From cache", &result.from_cache.to_string());
            self.link(&mut out, "URL", &result.url);
            out
        })
    }

    pub fn prefetch(&self, result: &PrefetchResult) -> Result<String> {
        self.render(result, || {
            let mut out = self.heading("Prefetch");
            let range = format!("{:.3}s - {:.3}s", result.segment_start, result.segment_end);
            self.field(&mut out, "Range", &range);
            self.field(&mut out, "Fetched", &format_ranges(&result.fresh_ranges));
            self.field(&mut out, "Reused", &format_ranges(&result.reused_ranges));
            self.field(&mut out, "Cached", &format_ranges(&result.cached_ranges));
            out
        })
    }

    pub fn dash(&self, info: &DashInfo) -> Result<String> {
        self.render(info, || {
            let mut out = self.heading("DASH manifest");
            self.field(&mut out, "Title", &info.title);
            self.field(&mut out, "Content id", &info.content_id.to_string());
            self.field(&mut out, "Quality", info.quality.as_str());
            self.field(&mut out, "Duration", &format_secs(info.duration));
            self.field(&mut out, "Expires", &info.expires_at.to_rfc3339());
            self.track(&mut out, &info.video);
            if let Some(audio) = &info.audio {
                self.track(&mut out, audio);
            }
            out
        })
    }

    pub fn info(&self, info: &VideoInfo) -> Result<String> {
        self.render(info, || {
            let mut out = self.heading("Video");
            self.field(&mut out, "Title", &info.title);
            self.field(&mut out, "Duration", &format_secs(info.duration));
            out
        })
    }

    pub fn sweep(&self, report: &SweepReport) -> Result<String> {
        self.render(report, || {
            let mut out = self.heading("Sweep");
            self.field(&mut out, "Chunks removed", &report.chunks_removed.to_string());
            self.field(&mut out, "Clips removed", &report.clips_removed.to_string());
            self.field(&mut out, "Play URLs expired", &report.play_urls_expired.to_string());
            self.field(&mut out, "Manifests expired", &report.manifests_expired.to_string());
            self.field(&mut out, "Metadata expired", &report.metadata_expired.to_string());
            out
        })
    }

    pub fn segment(&self, path: &std::path::Path, bytes: usize) -> Result<String> {
        let summary = serde_json::json!({ "path": path, "bytes": bytes });
        self.render(&summary, || {
            let mut out = self.heading("Segment");
            self.field(&mut out, "Path", &path.display().to_string());
            self.field(&mut out, "Bytes", &bytes.to_string());
            out
        })
    }

    pub fn error(&self, message: &str, kind: &impl Serialize) -> Result<String> {
        let value = serde_json::json!({
            "status": "error",
            "kind": kind,
            "message": message,
        });
        self.render(&value, || format!("{} {message}", self.colorize("Error:", Tone::Heading)))
    }

    fn track(&self, out: &mut String, track: &DashTrack) {
        let label = format!("{} track", track.kind);
        let mut detail = format!(
            "id {} / {} kbps / {}",
            track.id,
            track.bandwidth / 1000,
            track.codecs
        );
        if track.width > 0 && track.height > 0 {
            let _ = write!(detail, " / {}x{}", track.width, track.height);
        }
        let _ = write!(detail, " / {} segments", track.segments.len());
        self.field(out, &label, &detail);
    }

    fn heading(&self, text: &str) -> String {
        format!("{}\n", self.colorize(text, Tone::Heading))
    }

    fn field(&self, out: &mut String, label: &str, value: &str) {
        let _ = writeln!(
            out,
            "  {}: {}",
            self.colorize(label, Tone::Label),
            self.colorize(value, Tone::Value)
        );
    }

    fn link(&self, out: &mut String, label: &str, value: &str) {
        let _ = writeln!(
            out,
            "  {}: {}",
            self.colorize(label, Tone::Label),
            self.colorize(value, Tone::Link)
        );
    }

    #[cfg(feature = "colored-output")]
    fn colorize(&self, text: &str, tone: Tone) -> String {
        if !self.colored {
            return text.to_string();
        }
        match tone {
            Tone::Heading => text.green().bold().to_string(),
            Tone::Label => text.yellow().to_string(),
            Tone::Value => text.cyan().to_string(),
            Tone::Link => text.blue().to_string(),
        }
    }

    #[cfg(not(feature = "colored-output"))]
    fn colorize(&self, text: &str, _tone: Tone) -> String {
        let _ = self.colored;
        text.to_string()
    }
}

fn format_secs(secs: f64) -> String {
    if secs <= 0.0 {
        return "unknown".to_string();
    }
    let total = secs.round() as u64;
    format!("{}:{:02}:{:02}", total / 3600, (total / 60) % 60, total % 60)
}

fn format_ranges(ranges: &[Interval]) -> String {
    if ranges.is_empty() {
        return "none".to_string();
    }
    ranges
        .iter()
        .map(|r| format!("[{:.3}, {:.3})", r.start, r.end))
        .collect::<Vec<_>>()
        .join(", ")
}
