//! Expiry derivation for signed media URLs.
//!
//! CDN URLs embed a `deadline` query parameter (unix seconds). A resolved
//! entry is trusted until shortly before the earliest deadline among its URLs.

use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use url::Url;

use crate::config::ResolverConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpiryPolicy {
    /// Subtracted from the earliest deadline.
    pub margin: Duration,
    /// Lower bound on an entry's lifetime.
    pub min_validity: Duration,
    /// Lifetime when no URL carries a deadline.
    pub fallback: Duration,
}

impl Default for ExpiryPolicy {
    fn default() -> Self {
        Self {
            margin: Duration::from_secs(120),
            min_validity: Duration::from_secs(60),
            fallback: Duration::from_secs(30 * 60),
        }
    }
}

impl From<&ResolverConfig> for ExpiryPolicy {
    fn from(config: &ResolverConfig) -> Self {
        Self {
            margin: Duration::from_secs(config.expiry_margin_secs),
            min_validity: Duration::from_secs(config.min_validity_secs),
            fallback: Duration::from_secs(config.fallback_ttl_secs),
        }
    }
}

/// Read the `deadline` query parameter, if present and a valid unix timestamp.
pub fn extract_deadline(url: &str) -> Option<DateTime<Utc>> {
    let parsed = Url::parse(url).ok()?;
    let (_, value) = parsed.query_pairs().find(|(key, _)| key == "deadline")?;
    let secs: i64 = value.trim().parse().ok()?;
    Utc.timestamp_opt(secs, 0).single()
}

fn add(now: DateTime<Utc>, d: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(d)
        .ok()
        .and_then(|d| now.checked_add_signed(d))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

fn sub(at: DateTime<Utc>, d: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(d)
        .ok()
        .and_then(|d| at.checked_sub_signed(d))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Expiry of a resolved entry built from `urls`.
///
/// * every URL has a deadline: `max(min(deadlines) - margin, now + min_validity)`
/// * none has one: `now + fallback`
/// * only some do: the earlier of the two candidates above
pub fn expiry_for_urls<S: AsRef<str>>(
    urls: &[S],
    now: DateTime<Utc>,
    policy: &ExpiryPolicy,
) -> DateTime<Utc> {
    let deadlines: Vec<DateTime<Utc>> = urls
        .iter()
        .filter_map(|u| extract_deadline(u.as_ref()))
        .collect();

    let fallback = add(now, policy.fallback);
    let Some(earliest) = deadlines.iter().min().copied() else {
        return fallback;
    };

    let from_deadline = sub(earliest, policy.margin).max(add(now, policy.min_validity));
    if deadlines.len() == urls.len() {
        from_deadline
    } else {
        from_deadline.min(fallback)
    }
}
