//! DASH manifest resolution through the view/playurl JSON API.
//!
//! The source id is mapped to an internal content id (`cid`), the DASH
//! manifest is requested at the quality's rank ceiling, one video and one
//! audio representation are chosen and each one's `sidx` box is fetched and
//! parsed into a byte/time segment list. Video is required; a manifest
//! without audio yields a video-only result.

use std::sync::{Arc, LazyLock};

use bytes::Bytes;
use chrono::{DateTime, Utc};
use regex::Regex;
use reqwest::header::HeaderMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::ApiConfig;
use crate::error::{ClipError, Result};
use crate::expiry::{ExpiryPolicy, expiry_for_urls};
use crate::fetch::{ByteRange, Fetcher};
use crate::model::{Quality, SegmentRef, TrackKind};
use crate::ttl::TtlCache;

static BVID_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(BV[0-9A-Za-z]{10})").unwrap());
static AID_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)^(?:av)?(\d+)$").unwrap());
static AID_URL_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)/av(\d+)").unwrap());

/// How the view API addresses a source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentRef {
    Bvid(String),
    Aid(u64),
}

impl ContentRef {
    fn query_pair(&self) -> (&'static str, String) {
        match self {
            Self::Bvid(bvid) => ("bvid", bvid.clone()),
            Self::Aid(aid) => ("aid", aid.to_string()),
        }
    }
}

/// Accepts `BV…` ids, `av<digits>` / bare digits, or a page URL containing either.
pub fn parse_source_id(source_id: &str) -> Result<ContentRef> {
    let trimmed = source_id.trim();
    if let Some(caps) = BVID_REGEX.captures(trimmed) {
        return Ok(ContentRef::Bvid(caps[1].to_string()));
    }
    if let Some(caps) = AID_REGEX
        .captures(trimmed)
        .or_else(|| AID_URL_REGEX.captures(trimmed))
        && let Ok(aid) = caps[1].parse()
    {
        return Ok(ContentRef::Aid(aid));
    }
    Err(ClipError::not_found(format!(
        "unrecognized source id `{source_id}`"
    )))
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    code: i64,
    #[serde(default)]
    message: String,
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct ViewData {
    cid: Option<u64>,
    #[serde(default)]
    title: String,
}

#[derive(Debug, Deserialize)]
struct PlayUrlData {
    dash: Option<DashManifest>,
}

#[derive(Debug, Deserialize)]
struct DashManifest {
    #[serde(default)]
    duration: f64,
    #[serde(default)]
    video: Vec<Representation>,
    #[serde(default)]
    audio: Option<Vec<Representation>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Representation {
    pub id: u32,
    #[serde(default)]
    pub bandwidth: u64,
    pub base_url: String,
    #[serde(default)]
    pub backup_url: Option<Vec<String>>,
    #[serde(default)]
    pub codecs: String,
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
    #[serde(default)]
    pub segment_base: Option<SegmentBase>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SegmentBase {
    pub initialization: Option<String>,
    pub index_range: Option<String>,
}

/// Highest rank not above `ceiling` (ties by bandwidth), else the highest overall.
pub fn select_video(representations: &[Representation], ceiling: u32) -> Option<&Representation> {
    let rank = |r: &&Representation| (r.id, r.bandwidth);
    representations
        .iter()
        .filter(|r| r.id <= ceiling)
        .max_by_key(rank)
        .or_else(|| representations.iter().max_by_key(rank))
}

pub fn select_audio(representations: &[Representation]) -> Option<&Representation> {
    representations.iter().max_by_key(|r| r.bandwidth)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashSegment {
    pub index: usize,
    pub start: f64,
    pub end: f64,
    pub byte_start: u64,
    pub byte_end: u64,
}

impl DashSegment {
    pub fn range(&self) -> ByteRange {
        ByteRange {
            start: self.byte_start,
            end: self.byte_end,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashTrack {
    pub kind: TrackKind,
    pub id: u32,
    pub bandwidth: u64,
    pub codecs: String,
    pub width: u32,
    pub height: u32,
    pub base_url: String,
    pub backup_urls: Vec<String>,
    pub init_range: ByteRange,
    pub index_range: ByteRange,
    pub timescale: u32,
    pub segments: Vec<DashSegment>,
}

impl DashTrack {
    pub fn end_time(&self) -> f64 {
        self.segments.last().map_or(0.0, |s| s.end)
    }

    pub fn range_for(&self, segment: SegmentRef) -> Result<ByteRange> {
        match segment {
            SegmentRef::Init => Ok(self.init_range),
            SegmentRef::Index(i) => self.segments.get(i).map(DashSegment::range).ok_or_else(|| {
                ClipError::not_found(format!(
                    "{} segment {i} (track has {})",
                    self.kind,
                    self.segments.len()
                ))
            }),
        }
    }

    fn urls(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.base_url.as_str()).chain(self.backup_urls.iter().map(String::as_str))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashInfo {
    pub source_id: String,
    pub content_id: u64,
    pub quality: Quality,
    pub title: String,
    pub duration: f64,
    pub video: DashTrack,
    pub audio: Option<DashTrack>,
    pub expires_at: DateTime<Utc>,
}

impl DashInfo {
    pub fn track(&self, kind: TrackKind) -> Result<&DashTrack> {
        match kind {
            TrackKind::Video => Ok(&self.video),
            TrackKind::Audio => self
                .audio
                .as_ref()
                .ok_or_else(|| ClipError::not_found(format!("audio track of {}", self.source_id))),
        }
    }
}

#[derive(Clone)]
pub struct ManifestResolver {
    fetcher: Fetcher,
    api: ApiConfig,
    policy: ExpiryPolicy,
    cache: TtlCache<DashInfo>,
}

impl ManifestResolver {
    pub fn new(fetcher: Fetcher, api: ApiConfig, policy: ExpiryPolicy) -> Self {
        Self {
            fetcher,
            api,
            policy,
            cache: TtlCache::new(),
        }
    }

    pub async fn get(&self, source_id: &str, quality: Quality) -> Result<Arc<DashInfo>> {
        let key = format!("{source_id}:{quality}");
        if let Some(hit) = self.cache.get(&key) {
            debug!(source_id, %quality, "Manifest cache hit");
            return Ok(hit);
        }

        let info = self.resolve(source_id, quality).await?;
        let expires_at = info.expires_at;
        Ok(self.cache.insert_until(key, info, expires_at))
    }

    async fn resolve(&self, source_id: &str, quality: Quality) -> Result<DashInfo> {
        let content = parse_source_id(source_id)?;
        let (cid, title) = self.content_id(source_id, &content).await?;
        let manifest = self.manifest(&content, cid, quality).await?;

        let video_rep = select_video(&manifest.video, quality.rank()).ok_or_else(|| {
            ClipError::parse(format!("manifest for {source_id} has no video representation"))
        })?;
        let audio_rep = manifest.audio.as_deref().and_then(select_audio);

        let video = self.build_track(TrackKind::Video, video_rep).await?;
        let audio = match audio_rep {
            Some(rep) => Some(self.build_track(TrackKind::Audio, rep).await?),
            None => {
                warn!(source_id, "Manifest has no audio representation; serving video only");
                None
            }
        };

        let duration = if manifest.duration > 0.0 {
            manifest.duration
        } else {
            video
                .end_time()
                .max(audio.as_ref().map_or(0.0, DashTrack::end_time))
        };

        let mut urls = vec![video.base_url.clone()];
        urls.extend(audio.as_ref().map(|a| a.base_url.clone()));
        let expires_at = expiry_for_urls(&urls, Utc::now(), &self.policy);

        info!(
            source_id,
            cid,
            %quality,
            video_id = video.id,
            video_segments = video.segments.len(),
            audio_segments = audio.as_ref().map_or(0, |a| a.segments.len()),
            duration,
            "Resolved DASH manifest"
        );

        Ok(DashInfo {
            source_id: source_id.to_string(),
            content_id: cid,
            quality,
            title,
            duration,
            video,
            audio,
            expires_at,
        })
    }

    async fn content_id(&self, source_id: &str, content: &ContentRef) -> Result<(u64, String)> {
        let (key, value) = content.query_pair();
        let response: ApiResponse<ViewData> = self
            .fetcher
            .fetch_json(&self.api.view_url, &[(key, value)], &HeaderMap::new())
            .await?;

        if response.code != 0 {
            return Err(ClipError::not_found(format!(
                "{source_id}: view API returned code {} ({})",
                response.code, response.message
            )));
        }

        let data = response
            .data
            .ok_or_else(|| {
                ClipError::not_found(format!("{source_id}: view API returned no data"))
            })?;
        let cid = data
            .cid
            .ok_or_else(|| ClipError::not_found(format!("{source_id}: no content id")))?;
        Ok((cid, data.title))
    }

    async fn manifest(
        &self,
        content: &ContentRef,
        cid: u64,
        quality: Quality,
    ) -> Result<DashManifest> {
        let (key, value) = content.query_pair();
        let query = [
            (key, value),
            ("cid", cid.to_string()),
            ("qn", quality.rank().to_string()),
            ("fnval", "16".to_string()),
            ("fourk", "1".to_string()),
        ];
        let response: ApiResponse<PlayUrlData> = self
            .fetcher
            .fetch_json(&self.api.playurl_url, &query, &HeaderMap::new())
            .await?;

        if response.code != 0 {
            return Err(ClipError::resolution(format!(
                "playurl API returned code {} ({})",
                response.code, response.message
            )));
        }

        response
            .data
            .and_then(|d| d.dash)
            .ok_or_else(|| {
                ClipError::parse(format!("playurl response for cid {cid} has no DASH manifest"))
            })
    }

    async fn build_track(&self, kind: TrackKind, rep: &Representation) -> Result<DashTrack> {
        let base = rep.segment_base.as_ref().ok_or_else(|| {
            ClipError::parse(format!("{kind} representation {} has no segment base", rep.id))
        })?;
        let init_range: ByteRange = base
            .initialization
            .as_deref()
            .ok_or_else(|| {
                ClipError::parse(format!("{kind} representation {} has no init range", rep.id))
            })?
            .parse()?;
        let index_range: ByteRange = base
            .index_range
            .as_deref()
            .ok_or_else(|| {
                ClipError::parse(format!("{kind} representation {} has no index range", rep.id))
            })?
            .parse()?;

        let bytes = self
            .fetcher
            .fetch_range(&rep.base_url, &HeaderMap::new(), index_range)
            .await?;
        let index = mp4::parse_sidx(&bytes, index_range.end)?;

        let segments = index
            .entries
            .iter()
            .enumerate()
            .map(|(index, entry)| DashSegment {
                index,
                start: entry.presentation_time,
                end: entry.end_time(),
                byte_start: entry.byte_start,
                byte_end: entry.byte_end,
            })
            .collect();

        Ok(DashTrack {
            kind,
            id: rep.id,
            bandwidth: rep.bandwidth,
            codecs: rep.codecs.clone(),
            width: rep.width,
            height: rep.height,
            base_url: rep.base_url.clone(),
            backup_urls: rep.backup_url.clone().unwrap_or_default(),
            init_range,
            index_range,
            timescale: index.timescale,
            segments,
        })
    }

    /// Bytes of one init or media segment, trying backup URLs in order.
    pub async fn fetch_segment(
        &self,
        source_id: &str,
        quality: Quality,
        kind: TrackKind,
        segment: SegmentRef,
    ) -> Result<Bytes> {
        let info = self.get(source_id, quality).await?;
        let track = info.track(kind)?;
        let range = track.range_for(segment)?;

        let mut last_err = None;
        for url in track.urls() {
            match self.fetcher.fetch_range(url, &HeaderMap::new(), range).await {
                Ok(bytes) => return Ok(bytes),
                Err(e) => {
                    debug!(source_id, %kind, url, error = %e, "Segment fetch failed");
                    last_err = Some(e);
                }
            }
        }
        Err(last_err.unwrap_or_else(|| ClipError::not_found(format!("{kind} segment URL"))))
    }

    pub fn invalidate(&self, source_id: &str, quality: Quality) {
        self.cache.remove(&format!("{source_id}:{quality}"));
    }

    pub fn purge_expired(&self) -> usize {
        self.cache.cleanup_expired()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HttpConfig;
    use crate::test_util::spawn_server_with;
    use axum::extract::{Path, Query};
    use axum::http::{HeaderMap as AxumHeaders, StatusCode, header};
    use axum::routing::get;
    use axum::{Json, Router};
    use mp4::test_support::make_sidx;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn rep(id: u32, bandwidth: u64) -> Representation {
        Representation {
            id,
            bandwidth,
            base_url: format!("https://cdn.example/{id}.m4s"),
            backup_url: None,
            codecs: "avc1.640028".to_string(),
            width: 0,
            height: 0,
            segment_base: None,
        }
    }

    #[test]
    fn test_parse_source_id() {
        assert_eq!(
            parse_source_id("BV1xx411c7mD").unwrap(),
            ContentRef::Bvid("BV1xx411c7mD".to_string())
        );
        assert_eq!(
            parse_source_id("https://www.bilibili.com/video/BV1xx411c7mD?p=1").unwrap(),
            ContentRef::Bvid("BV1xx411c7mD".to_string())
        );
        assert_eq!(parse_source_id("av170001").unwrap(), ContentRef::Aid(170001));
        assert_eq!(parse_source_id("170001").unwrap(), ContentRef::Aid(170001));
        assert_eq!(
            parse_source_id("https://www.bilibili.com/video/av170001/").unwrap(),
            ContentRef::Aid(170001)
        );
        let err = parse_source_id("hello").unwrap_err();
        assert!(matches!(err, ClipError::NotFound { .. }));
    }

    #[test]
    fn test_select_video_respects_ceiling() {
        let reps = vec![rep(16, 100), rep(64, 900), rep(64, 1200), rep(80, 2000)];
        let chosen = select_video(&reps, Quality::P720.rank()).unwrap();
        assert_eq!((chosen.id, chosen.bandwidth), (64, 1200));
    }

    #[test]
    fn test_select_video_above_every_representation_picks_highest() {
        let reps = vec![rep(32, 100), rep(80, 2000), rep(64, 900)];
        assert_eq!(select_video(&reps, Quality::Uhd4k.rank()).unwrap().id, 80);
    }

    #[test]
    fn test_select_video_below_every_representation_falls_back_to_highest() {
        let reps = vec![rep(32, 100), rep(64, 900)];
        assert_eq!(select_video(&reps, Quality::P360.rank()).unwrap().id, 64);
        assert!(select_video(&[], 64).is_none());
    }

    #[test]
    fn test_select_audio_by_bandwidth() {
        let reps = vec![rep(30216, 67_000), rep(30280, 192_000), rep(30232, 132_000)];
        assert_eq!(select_audio(&reps).unwrap().id, 30280);
    }

    #[test]
    fn test_manifest_json_ignores_camel_case_duplicates() {
        let json = serde_json::json!({
            "id": 64,
            "base_url": "https://cdn/v.m4s",
            "baseUrl": "https://cdn/v.m4s",
            "backup_url": null,
            "bandwidth": 1000,
            "codecs": "avc1",
            "segment_base": { "initialization": "0-99", "index_range": "100-199" },
            "SegmentBase": { "Initialization": "0-99", "indexRange": "100-199" }
        });
        let rep: Representation = serde_json::from_value(json).unwrap();
        assert_eq!(rep.backup_url, None);
        assert_eq!(
            rep.segment_base.unwrap().index_range.as_deref(),
            Some("100-199")
        );
    }

    /// A media file: 100 init bytes, a sidx box, then the referenced payload.
    struct MediaFixture {
        body: Vec<u8>,
        init: String,
        index: String,
        index_end: u64,
        sidx_len: u64,
    }

    fn media_fixture(timescale: u32, refs: &[(u32, u32)]) -> MediaFixture {
        let sidx = make_sidx(0, timescale, 0, 0, refs);
        let sidx_len = sidx.len() as u64;
        let index_end = 100 + sidx_len - 1;
        let payload: u64 = refs.iter().map(|(size, _)| u64::from(*size)).sum();

        let mut body = vec![0xAA; 100];
        body.extend_from_slice(&sidx);
        // Segments start at index_end + sidx_len; pad generously.
        let total = (index_end + sidx_len + payload + 1) as usize;
        body.extend((body.len()..total).map(|i| (i % 251) as u8));

        MediaFixture {
            body,
            init: "0-99".to_string(),
            index: format!("100-{index_end}"),
            index_end,
            sidx_len,
        }
    }

    fn serve_range(body: &[u8], headers: &AxumHeaders) -> (StatusCode, Vec<u8>) {
        let range = headers
            .get(header::RANGE)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("bytes="))
            .and_then(|v| v.parse::<ByteRange>().ok());
        match range {
            Some(r) if (r.end as usize) < body.len() => (
                StatusCode::PARTIAL_CONTENT,
                body[r.start as usize..=r.end as usize].to_vec(),
            ),
            Some(_) => (StatusCode::RANGE_NOT_SATISFIABLE, Vec::new()),
            None => (StatusCode::OK, body.to_vec()),
        }
    }

    struct Api {
        resolver: ManifestResolver,
        video: MediaFixture,
        playurl_calls: Arc<AtomicUsize>,
    }

    async fn api(manifest_duration: f64) -> Api {
        api_with(manifest_duration, true).await
    }

    async fn api_with(manifest_duration: f64, with_audio: bool) -> Api {
        let video = media_fixture(1000, &[(500, 2000), (600, 2000), (700, 1500)]);
        let audio = media_fixture(48000, &[(400, 96000), (400, 96000), (400, 48000)]);
        let playurl_calls = Arc::new(AtomicUsize::new(0));

        let media: Arc<HashMap<&'static str, Vec<u8>>> = Arc::new(HashMap::from([
            ("video.m4s", video.body.clone()),
            ("audio.m4s", audio.body.clone()),
        ]));
        let (v_init, v_index) = (video.init.clone(), video.index.clone());
        let (a_init, a_index) = (audio.init.clone(), audio.index.clone());
        let calls = Arc::clone(&playurl_calls);

        let addr = spawn_server_with(move |addr| {
            let videos: Vec<serde_json::Value> = [16u32, 64, 80]
                .iter()
                .map(|id| {
                    serde_json::json!({
                        "id": id,
                        "bandwidth": 1000 * id,
                        "base_url": format!("http://{addr}/media/video.m4s?deadline=4102444800"),
                        "backup_url": [format!("http://{addr}/media/missing.m4s")],
                        "codecs": "avc1.640028",
                        "width": 1280,
                        "height": 720,
                        "segment_base": { "initialization": v_init, "index_range": v_index },
                    })
                })
                .collect();
            let mut dash = serde_json::json!({
                "duration": manifest_duration,
                "video": videos,
            });
            if with_audio {
                dash["audio"] = serde_json::json!([{
                    "id": 30280,
                    "bandwidth": 192000,
                    "base_url": format!("http://{addr}/media/audio.m4s?deadline=4102444800"),
                    "codecs": "mp4a.40.2",
                    "segment_base": { "initialization": a_init, "index_range": a_index },
                }]);
            }

            Router::new()
                .route(
                    "/view",
                    get(|Query(q): Query<HashMap<String, String>>| async move {
                        match q.get("bvid").map(String::as_str) {
                            Some("BV1xx411c7mD") => Json(serde_json::json!({
                                "code": 0,
                                "message": "0",
                                "data": { "cid": 279786, "title": "Fixture", "duration": 6 }
                            })),
                            _ => Json(serde_json::json!({
                                "code": -404,
                                "message": "啥都木有",
                            })),
                        }
                    }),
                )
                .route(
                    "/playurl",
                    get(move |Query(q): Query<HashMap<String, String>>| async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        assert_eq!(q.get("cid").map(String::as_str), Some("279786"));
                        assert_eq!(q.get("fnval").map(String::as_str), Some("16"));
                        Json(serde_json::json!({ "code": 0, "data": { "dash": dash } }))
                    }),
                )
                .route(
                    "/media/{name}",
                    get(move |Path(name): Path<String>, headers: AxumHeaders| async move {
                        match media.get(name.as_str()) {
                            Some(body) => serve_range(body, &headers),
                            None => (StatusCode::NOT_FOUND, Vec::new()),
                        }
                    }),
                )
        })
        .await;

        let api = ApiConfig {
            view_url: format!("http://{addr}/view"),
            playurl_url: format!("http://{addr}/playurl"),
        };
        let fetcher = Fetcher::new(&HttpConfig::default()).unwrap();
        Api {
            resolver: ManifestResolver::new(fetcher, api, ExpiryPolicy::default()),
            video,
            playurl_calls,
        }
    }

    #[tokio::test]
    async fn test_resolves_tracks_from_sidx() {
        let api = api(0.0).await;
        let info = api.resolver.get("BV1xx411c7mD", Quality::P720).await.unwrap();

        assert_eq!(info.content_id, 279786);
        assert_eq!(info.title, "Fixture");
        assert_eq!(info.video.id, 64);
        assert_eq!(info.video.segments.len(), 3);

        let first = &info.video.segments[0];
        assert_eq!(info.video.index_range.end, api.video.index_end);
        assert_eq!(first.byte_start, api.video.index_end + api.video.sidx_len);
        assert_eq!(first.byte_end, first.byte_start + 499);
        assert_eq!(info.video.segments[1].byte_start, first.byte_end + 1);
        assert_eq!(info.video.segments[2].start, 4.0);

        let audio = info.audio.as_ref().unwrap();
        assert_eq!(audio.end_time(), 5.0);
        // No declared duration: the longer track wins.
        assert_eq!(info.duration, 5.5);
        assert_eq!(info.expires_at.timestamp(), 4_102_444_800 - 120);
    }

    #[tokio::test]
    async fn test_declared_duration_wins_and_result_is_cached() {
        let api = api(6.0).await;
        let first = api.resolver.get("BV1xx411c7mD", Quality::P1080).await.unwrap();
        let second = api.resolver.get("BV1xx411c7mD", Quality::P1080).await.unwrap();

        assert_eq!(first.duration, 6.0);
        assert_eq!(first.video.id, 80);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(api.playurl_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_fetch_segment_reads_exact_bytes() {
        let api = api(0.0).await;
        let info = api.resolver.get("BV1xx411c7mD", Quality::P720).await.unwrap();
        let range = info.video.segments[1].range();

        let bytes = api
            .resolver
            .fetch_segment("BV1xx411c7mD", Quality::P720, TrackKind::Video, SegmentRef::Index(1))
            .await
            .unwrap();
        assert_eq!(
            &bytes[..],
            &api.video.body[range.start as usize..=range.end as usize]
        );

        let init = api
            .resolver
            .fetch_segment("BV1xx411c7mD", Quality::P720, TrackKind::Video, SegmentRef::Init)
            .await
            .unwrap();
        assert_eq!(init.len(), 100);

        let err = api
            .resolver
            .fetch_segment("BV1xx411c7mD", Quality::P720, TrackKind::Audio, SegmentRef::Index(9))
            .await
            .unwrap_err();
        assert!(matches!(err, ClipError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_video_only_manifest_has_no_audio_track() {
        let api = api_with(0.0, false).await;
        let info = api.resolver.get("BV1xx411c7mD", Quality::P720).await.unwrap();

        assert!(info.audio.is_none());
        assert_eq!(info.duration, 5.5);
        let err = api
            .resolver
            .fetch_segment("BV1xx411c7mD", Quality::P720, TrackKind::Audio, SegmentRef::Init)
            .await
            .unwrap_err();
        assert!(matches!(err, ClipError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_unknown_content_is_not_found() {
        let api = api(0.0).await;
        let err = api
            .resolver
            .get("BV1zz411c7zz", Quality::P720)
            .await
            .unwrap_err();
        assert!(matches!(err, ClipError::NotFound { .. }));
        assert_eq!(api.playurl_calls.load(Ordering::SeqCst), 0);
    }
}
