//! Stream-copy-first transcoding through an external `ffmpeg` compatible tool.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::{HttpConfig, TranscoderConfig};
use crate::error::{ClipError, Result};
use crate::process::run_captured;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CodecMode {
    /// Remux without touching the streams.
    Copy,
    /// Re-encode to H.264/AAC.
    Encode,
}

impl std::fmt::Display for CodecMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Copy => f.write_str("copy"),
            Self::Encode => f.write_str("encode"),
        }
    }
}

/// Seek offset and length applied to every input, in seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrimWindow {
    pub start: f64,
    pub duration: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TranscodeInput {
    Remote { url: String },
    File(PathBuf),
    /// A concat-demuxer list file.
    ConcatList(PathBuf),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TranscodeJob {
    /// One input, or a video input followed by an audio input.
    pub inputs: Vec<TranscodeInput>,
    pub trim: Option<TrimWindow>,
    pub output: PathBuf,
}

#[async_trait]
pub trait MediaTranscoder: Send + Sync {
    /// Run `job` once in `mode`. A missing tool must surface as
    /// [`ClipError::ToolUnavailable`].
    async fn run(&self, job: &TranscodeJob, mode: CodecMode) -> Result<()>;
}

async fn remove_partial(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await
        && e.kind() != std::io::ErrorKind::NotFound
    {
        debug!(path = %path.display(), error = %e, "Failed to remove partial output");
    }
}

/// Run `job` with stream copy, falling back to a re-encode.
///
/// Returns the mode that produced the output. Fails only when both attempts
/// fail, or immediately when the tool cannot be started.
pub async fn transcode(tool: &dyn MediaTranscoder, job: &TranscodeJob) -> Result<CodecMode> {
    let copy_err = match tool.run(job, CodecMode::Copy).await {
        Ok(()) => return Ok(CodecMode::Copy),
        Err(e) if e.is_tool_unavailable() => return Err(e),
        Err(e) => e,
    };

    warn!(
        output = %job.output.display(),
        error = %copy_err,
        "Stream copy failed, falling back to re-encode"
    );
    remove_partial(&job.output).await;

    match tool.run(job, CodecMode::Encode).await {
        Ok(()) => Ok(CodecMode::Encode),
        Err(e) if e.is_tool_unavailable() => Err(e),
        Err(encode_err) => {
            remove_partial(&job.output).await;
            Err(ClipError::transcode(format!(
                "stream copy failed ({copy_err}); re-encode failed ({encode_err})"
            )))
        }
    }
}

/// Write a concat-demuxer list referencing `files` in order.
pub async fn write_concat_list(path: &Path, files: &[PathBuf]) -> Result<()> {
    let mut body = String::new();
    for file in files {
        let escaped = file.to_string_lossy().replace('\'', r"'\''");
        body.push_str(&format!("file '{escaped}'\n"));
    }
    tokio::fs::write(path, body)
        .await
        .map_err(|e| ClipError::io_path("writing concat list", path, e))
}

#[derive(Debug, Clone)]
pub struct FfmpegTranscoder {
    binary: String,
    preset: String,
    extra_output_args: Vec<String>,
    user_agent: String,
    /// `Name: value` lines forwarded to remote inputs.
    headers: Vec<String>,
}

impl FfmpegTranscoder {
    pub fn new(config: &TranscoderConfig, http: &HttpConfig) -> Self {
        Self {
            binary: config.binary_path(),
            preset: config.preset.clone(),
            extra_output_args: config.extra_output_args.clone(),
            user_agent: http.user_agent.clone(),
            headers: http
                .header_pairs()
                .into_iter()
                .map(|(name, value)| format!("{name}: {value}"))
                .collect(),
        }
    }

    pub fn build_args(&self, job: &TranscodeJob, mode: CodecMode) -> Vec<String> {
        let mut args: Vec<String> = ["-y", "-hide_banner", "-nostdin", "-loglevel", "error"]
            .map(String::from)
            .to_vec();

        for input in &job.inputs {
            let source = match input {
                TranscodeInput::Remote { url } => {
                    args.push("-user_agent".to_string());
                    args.push(self.user_agent.clone());
                    if !self.headers.is_empty() {
                        let mut joined = self.headers.join("\r\n");
                        joined.push_str("\r\n");
                        args.push("-headers".to_string());
                        args.push(joined);
                    }
                    url.clone()
                }
                TranscodeInput::File(path) => path.to_string_lossy().into_owned(),
                TranscodeInput::ConcatList(path) => {
                    args.extend(["-f", "concat", "-safe", "0"].map(String::from));
                    path.to_string_lossy().into_owned()
                }
            };

            if let Some(trim) = job.trim {
                args.push("-ss".to_string());
                args.push(format!("{:.3}", trim.start.max(0.0)));
                args.push("-t".to_string());
                args.push(format!("{:.3}", trim.duration.max(0.0)));
            }
            args.push("-i".to_string());
            args.push(source);
        }

        if job.inputs.len() == 2 {
            args.extend(["-map", "0:v:0", "-map", "1:a:0"].map(String::from));
        }

        match mode {
            CodecMode::Copy => args.extend(["-c", "copy"].map(String::from)),
            CodecMode::Encode => {
                args.extend(["-c:v", "libx264", "-preset"].map(String::from));
                args.push(self.preset.clone());
                args.extend(["-c:a", "aac"].map(String::from));
            }
        }

        args.extend(
            ["-avoid_negative_ts", "make_zero", "-movflags", "+faststart"].map(String::from),
        );
        args.extend(self.extra_output_args.iter().cloned());
        args.push(job.output.to_string_lossy().into_owned());
        args
    }
}

#[async_trait]
impl MediaTranscoder for FfmpegTranscoder {
    async fn run(&self, job: &TranscodeJob, mode: CodecMode) -> Result<()> {
        if job.inputs.is_empty() {
            return Err(ClipError::invalid_request("transcode job has no inputs"));
        }

        let args = self.build_args(job, mode);
        debug!(%mode, output = %job.output.display(), "Running transcoder");
        let output = run_captured(&self.binary, &args).await?;

        if !output.success() {
            return Err(ClipError::transcode(format!(
                "{} ({mode}) exited with {}: {}",
                self.binary,
                output.status,
                output.stderr_tail()
            )));
        }

        let written = tokio::fs::metadata(&job.output)
            .await
            .map(|m| m.len())
            .unwrap_or(0);
        if written == 0 {
            return Err(ClipError::transcode(format!(
                "{} ({mode}) produced no output at {}",
                self.binary,
                job.output.display()
            )));
        }

        info!(%mode, output = %job.output.display(), bytes = written, "Transcode finished");
        Ok(())
    }
}
