//! Stream resolution through an external `yt-dlp` compatible tool.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::config::{HttpConfig, ResolverConfig};
use crate::error::{ClipError, Result};
use crate::expiry::{ExpiryPolicy, expiry_for_urls};
use crate::model::Quality;
use crate::process::run_captured;

/// One (muxed) or two (video, audio) playable URLs and their validity.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedPlayLocation {
    pub urls: Vec<String>,
    /// Format selector that produced `urls`.
    pub selector: String,
    pub expires_at: DateTime<Utc>,
}

impl ResolvedPlayLocation {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Separate video and audio streams.
    pub fn is_split(&self) -> bool {
        self.urls.len() == 2
    }
}

/// Resolver output for a metadata query, before duration fallback parsing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawMetadata {
    pub title: String,
    pub duration: Option<f64>,
    pub duration_string: Option<String>,
}

#[async_trait]
pub trait StreamResolver: Send + Sync {
    async fn resolve(&self, source_id: &str, quality: Quality) -> Result<ResolvedPlayLocation>;

    async fn metadata(&self, source_id: &str) -> Result<RawMetadata>;
}

/// Format selectors tried in order, most specific first.
pub fn format_selectors(quality: Quality) -> Vec<String> {
    let height = quality.max_height();
    vec![
        format!("best[height<={height}][vcodec!=none][acodec!=none]"),
        format!("bestvideo[height<={height}]+bestaudio"),
        "best[acodec!=none]".to_string(),
        "best".to_string(),
    ]
}

/// Accepts one or two URL lines; anything else is not a usable answer.
fn parse_url_lines(stdout: &str) -> Option<Vec<String>> {
    let urls: Vec<String> = stdout
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(ToOwned::to_owned)
        .collect();

    let all_http = urls
        .iter()
        .all(|u| u.starts_with("http://") || u.starts_with("https://"));
    (matches!(urls.len(), 1 | 2) && all_http).then_some(urls)
}

fn non_placeholder(value: Option<&str>) -> Option<&str> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty() && !v.eq_ignore_ascii_case("NA") && *v != "None")
}

#[derive(Debug, Clone)]
pub struct YtDlpResolver {
    config: ResolverConfig,
    http: HttpConfig,
    policy: ExpiryPolicy,
}

impl YtDlpResolver {
    pub fn new(config: ResolverConfig, http: HttpConfig) -> Self {
        let policy = ExpiryPolicy::from(&config);
        Self {
            config,
            http,
            policy,
        }
    }

    fn binary(&self) -> String {
        self.config.binary_path()
    }

    fn common_args(&self) -> Vec<String> {
        let mut args = vec![
            "--no-warnings".to_string(),
            "--no-playlist".to_string(),
            "--user-agent".to_string(),
            self.http.user_agent.clone(),
        ];
        for (name, value) in self.http.header_pairs() {
            args.push("--add-header".to_string());
            args.push(format!("{name}:{value}"));
        }
        args.extend(self.config.extra_args.iter().cloned());
        args
    }
}

#[async_trait]
impl StreamResolver for YtDlpResolver {
    async fn resolve(&self, source_id: &str, quality: Quality) -> Result<ResolvedPlayLocation> {
        let binary = self.binary();
        let page_url = self.config.source_url(source_id);
        let mut last_failure = String::from("no selector attempted");

        for selector in format_selectors(quality) {
            let mut args = self.common_args();
            args.extend(["-g".to_string(), "-f".to_string(), selector.clone(), page_url.clone()]);

            debug!(source_id, %quality, selector, "Running resolver");
            let output = run_captured(&binary, &args).await?;

            if !output.success() {
                last_failure = format!(
                    "selector `{selector}` exited with {}: {}",
                    output.status,
                    output.stderr_tail()
                );
                debug!(source_id, selector, reason = %last_failure, "Selector failed");
                continue;
            }

            let Some(urls) = parse_url_lines(&output.stdout) else {
                last_failure = format!("selector `{selector}` produced unusable output");
                debug!(source_id, selector, "Resolver output is not one or two URLs");
                continue;
            };

            let expires_at = expiry_for_urls(&urls, Utc::now(), &self.policy);
            info!(
                source_id,
                %quality,
                selector,
                split = urls.len() == 2,
                %expires_at,
                "Resolved play location"
            );
            return Ok(ResolvedPlayLocation {
                urls,
                selector,
                expires_at,
            });
        }

        warn!(source_id, %quality, reason = %last_failure, "All format selectors failed");
        Err(ClipError::resolution(last_failure))
    }

    async fn metadata(&self, source_id: &str) -> Result<RawMetadata> {
        let mut args = self.common_args();
        args.extend(
            [
                "--skip-download",
                "--print",
                "title",
                "--print",
                "duration",
                "--print",
                "duration_string",
            ]
            .map(String::from),
        );
        args.push(self.config.source_url(source_id));

        let output = run_captured(&self.binary(), &args).await?;
        if !output.success() {
            return Err(ClipError::resolution(format!(
                "metadata query exited with {}: {}",
                output.status,
                output.stderr_tail()
            )));
        }

        let mut lines = output.stdout.lines();
        let title = non_placeholder(lines.next()).unwrap_or_default().to_string();
        let duration = non_placeholder(lines.next())
            .and_then(|d| d.parse::<f64>().ok())
            .filter(|d| d.is_finite() && *d > 0.0);
        let duration_string = non_placeholder(lines.next()).map(ToOwned::to_owned);

        Ok(RawMetadata {
            title,
            duration,
            duration_string,
        })
    }
}
