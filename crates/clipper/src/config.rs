//! Engine configuration.
//!
//! Every section deserializes with defaults, so a partial TOML/JSON document
//! (or none at all) yields a working configuration.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ClipError, Result};

pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/142.0.0.0 Safari/537.36";

pub const DEFAULT_REFERER: &str = "https://www.bilibili.com";

const DEFAULT_RESOLVER_BINARY: &str = "yt-dlp";
const DEFAULT_TRANSCODER_BINARY: &str = "ffmpeg";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PreviewConfig {
    /// Root directory for chunk and clip files.
    pub cache_dir: PathBuf,
    /// Age after which a chunk file is stale and swept.
    pub chunk_ttl_secs: u64,
    /// Age after which an assembled clip is stale and swept.
    pub result_ttl_secs: u64,
    /// Chunk window length for regular requests.
    pub chunk_window_secs: f64,
    /// Chunk window length used when the whole request is short.
    pub short_window_secs: f64,
    /// Requests spanning at most this many seconds use `short_window_secs`.
    pub short_request_threshold_secs: f64,
    pub metadata_ttl_secs: u64,
    pub resolver: ResolverConfig,
    pub transcoder: TranscoderConfig,
    pub http: HttpConfig,
    pub api: ApiConfig,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            cache_dir: std::env::temp_dir().join("clipper-cache"),
            chunk_ttl_secs: 3600,
            result_ttl_secs: 3600,
            chunk_window_secs: 3.0,
            short_window_secs: 1.0,
            short_request_threshold_secs: 3.0,
            metadata_ttl_secs: 24 * 3600,
            resolver: ResolverConfig::default(),
            transcoder: TranscoderConfig::default(),
            http: HttpConfig::default(),
            api: ApiConfig::default(),
        }
    }
}

impl PreviewConfig {
    pub fn chunk_ttl(&self) -> Duration {
        Duration::from_secs(self.chunk_ttl_secs)
    }

    pub fn result_ttl(&self) -> Duration {
        Duration::from_secs(self.result_ttl_secs)
    }

    pub fn metadata_ttl(&self) -> Duration {
        Duration::from_secs(self.metadata_ttl_secs)
    }

    pub fn chunks_dir(&self) -> PathBuf {
        self.cache_dir.join("chunks")
    }

    pub fn clips_dir(&self) -> PathBuf {
        self.cache_dir.join("clips")
    }

    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("chunk_window_secs", self.chunk_window_secs),
            ("short_window_secs", self.short_window_secs),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(ClipError::configuration(format!(
                    "{name} must be a positive number of seconds, got {value}"
                )));
            }
        }
        if self.short_request_threshold_secs < 0.0 {
            return Err(ClipError::configuration(
                "short_request_threshold_secs must not be negative",
            ));
        }
        if self.chunk_ttl_secs == 0 || self.result_ttl_secs == 0 {
            return Err(ClipError::configuration("cache TTLs must be non-zero"));
        }
        if !self.resolver.source_url_template.contains("{id}") {
            return Err(ClipError::configuration(
                "resolver.source_url_template must contain `{id}`",
            ));
        }
        Ok(())
    }
}

/// External resolver (`yt-dlp` compatible) settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    pub binary_path: Option<String>,
    pub extra_args: Vec<String>,
    /// Page URL handed to the resolver; `{id}` is replaced by the source id.
    pub source_url_template: String,
    /// Safety margin subtracted from a URL's embedded deadline.
    pub expiry_margin_secs: u64,
    /// Minimum lifetime of a resolved entry, whatever the deadline says.
    pub min_validity_secs: u64,
    /// Lifetime of entries whose URLs carry no deadline.
    pub fallback_ttl_secs: u64,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            binary_path: None,
            extra_args: Vec::new(),
            source_url_template: "https://www.bilibili.com/video/{id}".to_string(),
            expiry_margin_secs: 120,
            min_validity_secs: 60,
            fallback_ttl_secs: 30 * 60,
        }
    }
}

impl ResolverConfig {
    pub fn binary_path(&self) -> String {
        self.binary_path
            .clone()
            .or_else(|| std::env::var("YT_DLP_PATH").ok())
            .unwrap_or_else(|| DEFAULT_RESOLVER_BINARY.to_string())
    }

    /// Page URL for `source_id`; full URLs pass through untouched.
    pub fn source_url(&self, source_id: &str) -> String {
        if source_id.starts_with("http://") || source_id.starts_with("https://") {
            source_id.to_string()
        } else {
            self.source_url_template.replace("{id}", source_id)
        }
    }
}

/// External transcoder (`ffmpeg` compatible) settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscoderConfig {
    pub binary_path: Option<String>,
    /// x264 preset used by the re-encode fallback.
    pub preset: String,
    pub extra_output_args: Vec<String>,
}

impl Default for TranscoderConfig {
    fn default() -> Self {
        Self {
            binary_path: None,
            preset: "veryfast".to_string(),
            extra_output_args: Vec::new(),
        }
    }
}

impl TranscoderConfig {
    pub fn binary_path(&self) -> String {
        self.binary_path
            .clone()
            .or_else(|| std::env::var("FFMPEG_PATH").ok())
            .unwrap_or_else(|| DEFAULT_TRANSCODER_BINARY.to_string())
    }
}

/// HTTP identity shared by the fetch layer, the resolver and the transcoder.
///
/// Credentials are opaque: `cookies` is forwarded verbatim as a `Cookie` header.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub user_agent: String,
    pub referer: Option<String>,
    pub cookies: Option<String>,
    pub headers: BTreeMap<String, String>,
    /// Overall request timeout; 0 disables it.
    pub timeout_secs: u64,
    pub connect_timeout_secs: u64,
    pub proxy: Option<String>,
    pub pool_max_idle_per_host: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            referer: Some(DEFAULT_REFERER.to_string()),
            cookies: None,
            headers: BTreeMap::new(),
            timeout_secs: 0,
            connect_timeout_secs: 30,
            proxy: None,
            pool_max_idle_per_host: 10,
        }
    }
}

impl HttpConfig {
    /// Extra request headers (everything except the user agent) as name/value pairs.
    pub fn header_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::with_capacity(self.headers.len() + 2);
        if let Some(referer) = self.referer.as_deref().filter(|r| !r.is_empty()) {
            pairs.push(("Referer".to_string(), referer.to_string()));
        }
        if let Some(cookies) = self.cookies.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
            pairs.push(("Cookie".to_string(), cookies.to_string()));
        }
        for (name, value) in &self.headers {
            pairs.push((name.clone(), value.clone()));
        }
        pairs
    }

    /// Same as [`Self::header_pairs`], as a `HeaderMap`. Invalid entries are skipped.
    pub fn header_map(&self) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in self.header_pairs() {
            match (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(&value),
            ) {
                (Ok(name), Ok(value)) => {
                    map.insert(name, value);
                }
                (Err(e), _) => debug!(error = %e, header = %name, "Invalid header name; skipping"),
                (_, Err(e)) => debug!(error = %e, header = %name, "Invalid header value; skipping"),
            }
        }
        map
    }
}

/// Content-id and manifest endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub view_url: String,
    pub playurl_url: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            view_url: "https://api.bilibili.com/x/web-interface/view".to_string(),
            playurl_url: "https://api.bilibili.com/x/player/playurl".to_string(),
        }
    }
}
