//! Request/response types shared by the engine's public operations.

use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ClipError;
use crate::interval::Interval;

/// Requested preview quality.
///
/// Each variant maps to a representation-rank ceiling (the `qn` ids used by
/// the manifest API) and a pixel-height ceiling (used by the resolver's
/// format selectors).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
pub enum Quality {
    #[serde(rename = "360p")]
    #[cfg_attr(feature = "clap", value(name = "360p"))]
    P360,
    #[serde(rename = "480p")]
    #[cfg_attr(feature = "clap", value(name = "480p"))]
    P480,
    #[default]
    #[serde(rename = "720p")]
    #[cfg_attr(feature = "clap", value(name = "720p"))]
    P720,
    #[serde(rename = "1080p")]
    #[cfg_attr(feature = "clap", value(name = "1080p"))]
    P1080,
    #[serde(rename = "1080p+")]
    #[cfg_attr(feature = "clap", value(name = "1080p+"))]
    P1080Plus,
    #[serde(rename = "4k")]
    #[cfg_attr(feature = "clap", value(name = "4k"))]
    Uhd4k,
}

impl Quality {
    pub const ALL: [Quality; 6] = [
        Quality::P360,
        Quality::P480,
        Quality::P720,
        Quality::P1080,
        Quality::P1080Plus,
        Quality::Uhd4k,
    ];

    /// Representation-rank ceiling.
    pub fn rank(self) -> u32 {
        match self {
            Self::P360 => 16,
            Self::P480 => 32,
            Self::P720 => 64,
            Self::P1080 => 80,
            Self::P1080Plus => 112,
            Self::Uhd4k => 120,
        }
    }

    /// Pixel-height ceiling.
    pub fn max_height(self) -> u32 {
        match self {
            Self::P360 => 360,
            Self::P480 => 480,
            Self::P720 => 720,
            Self::P1080 | Self::P1080Plus => 1080,
            Self::Uhd4k => 2160,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::P360 => "360p",
            Self::P480 => "480p",
            Self::P720 => "720p",
            Self::P1080 => "1080p",
            Self::P1080Plus => "1080p+",
            Self::Uhd4k => "4k",
        }
    }
}

impl Display for Quality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Quality {
    type Err = ClipError;

    /// Accepts the display name (`720p`), the bare height (`720`) or the rank (`64`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        let quality = match normalized.as_str() {
            "360p" | "360" | "16" => Self::P360,
            "480p" | "480" | "32" => Self::P480,
            "720p" | "720" | "64" => Self::P720,
            "1080p" | "1080" | "80" => Self::P1080,
            "1080p+" | "1080+" | "112" => Self::P1080Plus,
            "4k" | "2160p" | "2160" | "120" => Self::Uhd4k,
            _ => {
                return Err(ClipError::invalid_request(format!(
                    "unknown quality `{s}`"
                )));
            }
        };
        Ok(quality)
    }
}

/// One track of a split manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
pub enum TrackKind {
    Video,
    Audio,
}

impl Display for TrackKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Video => f.write_str("video"),
            Self::Audio => f.write_str("audio"),
        }
    }
}

/// Addresses either the init segment or one media segment of a track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SegmentRef {
    Init,
    Index(usize),
}

/// Title/duration of a source.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VideoInfo {
    pub title: String,
    /// Seconds; 0 when unknown.
    pub duration: f64,
}

/// A request for one trimmed preview file.
#[derive(Debug, Clone, PartialEq)]
pub struct ClipRequest {
    pub source_id: String,
    pub quality: Quality,
    pub start: f64,
    pub end: f64,
}

impl ClipRequest {
    pub fn new(source_id: impl Into<String>, quality: Quality, start: f64, end: f64) -> Self {
        Self {
            source_id: source_id.into(),
            quality,
            start,
            end,
        }
    }
}

/// Output of a clip request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClipResult {
    /// `file://` URL of the produced clip.
    pub url: String,
    pub path: PathBuf,
    pub title: String,
    pub duration: f64,
    pub segment_start: f64,
    pub segment_end: f64,
    /// Source ranges now materialized in the chunk cache for this request.
    pub cached_ranges: Vec<Interval>,
    /// Served from the whole-result cache without touching the chunk cache.
    pub from_cache: bool,
}

/// Output of a prefetch-only request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrefetchResult {
    pub segment_start: f64,
    pub segment_end: f64,
    /// Ranges transcoded by this call.
    pub fresh_ranges: Vec<Interval>,
    /// Ranges that were already cached.
    pub reused_ranges: Vec<Interval>,
    pub cached_ranges: Vec<Interval>,
}
