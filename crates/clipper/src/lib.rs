//! Clip preview engine.
//!
//! Turns a remote video identifier plus a time range into a local, trimmed
//! MP4 while keeping network fetches and transcoder runs to a minimum.
//!
//! ## Core Types
//!
//! - [`PreviewService`] - Owns every cache; the entry point for callers
//! - [`PreviewConfig`] - Cache, resolver, transcoder and HTTP settings
//! - [`ClipError`] - Error type shared by every operation
//!
//! ## Components
//!
//! - `resolver`: play-URL and metadata lookups through an external resolver
//! - `play_url` / `metadata`: expiry-aware caches in front of the resolver
//! - `manifest`: DASH manifest resolution with segment index parsing
//! - `chunk`: disk-backed cache of aligned sub-clips
//! - `pipeline`: clip assembly from cached chunks
//! - `transcode`: copy-then-re-encode transcoder wrapper
//! - `interval`: cached-range bookkeeping for playback clients

pub mod chunk;
pub mod config;
pub mod disk_index;
pub mod error;
pub mod expiry;
pub mod fetch;
pub mod interval;
pub mod manifest;
pub mod metadata;
pub mod model;
pub mod pipeline;
pub mod play_url;
pub mod process;
pub mod resolver;
pub mod service;
pub mod transcode;
pub mod ttl;

#[cfg(test)]
mod test_doubles;
#[cfg(test)]
mod test_util;

pub use config::{ApiConfig, HttpConfig, PreviewConfig, ResolverConfig, TranscoderConfig};
pub use error::{ClipError, FailureKind, Result};
pub use fetch::{ByteRange, Fetcher};
pub use interval::{Interval, IntervalSet, IntervalTracker, PrefetchGate};
pub use manifest::{DashInfo, DashSegment, DashTrack};
pub use model::{ClipRequest, ClipResult, PrefetchResult, Quality, SegmentRef, TrackKind, VideoInfo};
pub use resolver::{ResolvedPlayLocation, StreamResolver, YtDlpResolver};
pub use service::{PreviewService, SweepReport};
pub use transcode::{CodecMode, FfmpegTranscoder, MediaTranscoder};
