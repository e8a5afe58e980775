//! HTTP access shared by the manifest API client and the segment fetcher.

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;
use std::time::Duration;

use bytes::Bytes;
use reqwest::header::{self, HeaderMap};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, trace, warn};

use crate::config::HttpConfig;
use crate::error::{ClipError, Result};

pub fn install_rustls_provider() {
    static PROVIDER_INSTALLED: OnceLock<()> = OnceLock::new();
    PROVIDER_INSTALLED.get_or_init(|| {
        if let Err(e) = rustls::crypto::aws_lc_rs::default_provider().install_default() {
            // Another crate installed one first.
            debug!(existing_provider = ?e, "rustls CryptoProvider already installed");
        }
    });
}

/// Inclusive byte range, as written in manifests (`"start-end"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    pub fn new(start: u64, end: u64) -> Result<Self> {
        if end < start {
            return Err(ClipError::parse(format!(
                "byte range end {end} precedes start {start}"
            )));
        }
        Ok(Self { start, end })
    }

    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn header_value(&self) -> String {
        format!("bytes={}-{}", self.start, self.end)
    }
}

impl fmt::Display for ByteRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

impl serde::Serialize for ByteRange {
    fn serialize<S: serde::Serializer>(
        &self,
        serializer: S,
    ) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl FromStr for ByteRange {
    type Err = ClipError;

    fn from_str(s: &str) -> Result<Self> {
        let (start, end) = s
            .trim()
            .split_once('-')
            .ok_or_else(|| ClipError::parse(format!("malformed byte range `{s}`")))?;
        let start = start
            .trim()
            .parse()
            .map_err(|_| ClipError::parse(format!("malformed byte range start in `{s}`")))?;
        let end = end
            .trim()
            .parse()
            .map_err(|_| ClipError::parse(format!("malformed byte range end in `{s}`")))?;
        Self::new(start, end)
    }
}

/// Thin wrapper around a configured `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
}

impl Fetcher {
    pub fn new(config: &HttpConfig) -> Result<Self> {
        install_rustls_provider();

        let mut builder = Client::builder()
            .user_agent(&config.user_agent)
            .default_headers(config.header_map())
            .redirect(reqwest::redirect::Policy::limited(10));

        if config.timeout_secs > 0 {
            builder = builder.timeout(Duration::from_secs(config.timeout_secs));
        }
        if config.connect_timeout_secs > 0 {
            builder = builder.connect_timeout(Duration::from_secs(config.connect_timeout_secs));
        }
        if config.pool_max_idle_per_host > 0 {
            builder = builder.pool_max_idle_per_host(config.pool_max_idle_per_host);
        }

        if let Some(url) = config.proxy.as_deref().map(str::trim).filter(|u| !u.is_empty()) {
            match reqwest::Proxy::all(url) {
                Ok(proxy) => builder = builder.proxy(proxy),
                Err(error) => {
                    warn!(proxy_url = %url, error = %error, "Invalid proxy URL; disabling proxy");
                    builder = builder.no_proxy();
                }
            }
        }

        Ok(Self {
            client: builder.build()?,
        })
    }

    pub fn from_client(client: Client) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    /// GET `url` with `query` and decode the body as JSON.
    ///
    /// `headers` are merged over the client defaults; per-call values win.
    pub async fn fetch_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
        headers: &HeaderMap,
    ) -> Result<T> {
        trace!(url, ?query, "Fetching JSON");
        let response = self
            .client
            .get(url)
            .query(query)
            .headers(headers.clone())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClipError::http_status(status, url, "JSON fetch"));
        }

        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }

    /// Fetch the inclusive byte `range` of `url`.
    ///
    /// A server that ignores `Range` and answers 200 with the whole body is
    /// tolerated; the requested slice is cut out locally.
    pub async fn fetch_range(
        &self,
        url: &str,
        headers: &HeaderMap,
        range: ByteRange,
    ) -> Result<Bytes> {
        trace!(url, %range, "Fetching byte range");
        let response = self
            .client
            .get(url)
            .headers(headers.clone())
            .header(header::RANGE, range.header_value())
            .send()
            .await?;

        let status = response.status();
        match status {
            StatusCode::PARTIAL_CONTENT => Ok(response.bytes().await?),
            StatusCode::OK => {
                let body = response.bytes().await?;
                let start = range.start as usize;
                let end = range.end as usize;
                if body.len() <= end {
                    return Err(ClipError::parse(format!(
                        "server ignored range {range} and returned only {} bytes",
                        body.len()
                    )));
                }
                debug!(url, %range, "Server ignored Range header; slicing full body");
                Ok(body.slice(start..=end))
            }
            _ => Err(ClipError::http_status(status, url, "range fetch")),
        }
    }
}
