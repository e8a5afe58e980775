//! Client-side interval bookkeeping.
//!
//! An [`IntervalSet`] records which parts of one source (at one quality) are
//! already materialized, so a player can ask what is missing before it asks
//! the engine for more. Everything here is pure; no I/O.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::model::Quality;

/// Tolerance, in seconds, used for merging and membership tests.
pub const EPSILON: f64 = 0.05;

/// Half-open time range `[start, end)` in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Interval {
    pub start: f64,
    pub end: f64,
}

impl Interval {
    #[inline]
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    #[inline]
    pub fn len(&self) -> f64 {
        (self.end - self.start).max(0.0)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }
}

/// Sorted, merged set of covered intervals.
///
/// Invariant: for consecutive stored intervals `a`, `b`:
/// `a.end < b.start - EPSILON`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IntervalSet {
    intervals: Vec<Interval>,
}

impl IntervalSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intervals(&self) -> &[Interval] {
        &self.intervals
    }

    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    pub fn clear(&mut self) {
        self.intervals.clear();
    }

    /// Total covered seconds.
    pub fn covered(&self) -> f64 {
        self.intervals.iter().map(Interval::len).sum()
    }

    /// Insert `[start, end)` and restore the merge invariant.
    ///
    /// Empty, inverted or non-finite ranges are ignored.
    pub fn add_cached_range(&mut self, start: f64, end: f64) {
        if !(start.is_finite() && end.is_finite()) || end <= start {
            return;
        }

        self.intervals.push(Interval::new(start, end));
        self.intervals.sort_by(|a, b| a.start.total_cmp(&b.start));

        let mut merged: Vec<Interval> = Vec::with_capacity(self.intervals.len());
        for interval in self.intervals.drain(..) {
            match merged.last_mut() {
                Some(last) if interval.start <= last.end + EPSILON => {
                    last.end = last.end.max(interval.end);
                }
                _ => merged.push(interval),
            }
        }
        self.intervals = merged;
    }

    /// First uncovered sub-range overlapping `[start, end)`, or `None` when the
    /// whole range is covered.
    pub fn find_missing_range(&self, start: f64, end: f64) -> Option<Interval> {
        if end <= start {
            return None;
        }

        let mut cursor = start;
        for interval in &self.intervals {
            if cursor >= end - EPSILON {
                return None;
            }
            if interval.end <= cursor {
                continue;
            }
            if interval.start > cursor + EPSILON {
                return Some(Interval::new(cursor, interval.start.min(end)));
            }
            cursor = cursor.max(interval.end);
        }

        (cursor < end - EPSILON).then(|| Interval::new(cursor, end))
    }

    /// Seconds of contiguous coverage from `time` forward; 0 when `time` is not
    /// inside any interval.
    pub fn buffer_ahead(&self, time: f64) -> f64 {
        self.intervals
            .iter()
            .find(|i| time >= i.start - EPSILON && time < i.end)
            .map_or(0.0, |i| (i.end - time).max(0.0))
    }

    pub fn is_time_cached(&self, time: f64) -> bool {
        self.intervals
            .iter()
            .any(|i| time >= i.start - EPSILON && time <= i.end + EPSILON)
    }
}

/// Interval set bound to one (source, quality) pair; switching either resets it.
#[derive(Debug, Clone, Default)]
pub struct IntervalTracker {
    key: Option<(String, Quality)>,
    set: IntervalSet,
}

impl IntervalTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind the tracker to `source_id`/`quality`. Returns `true` when this
    /// dropped previously tracked coverage.
    pub fn select(&mut self, source_id: &str, quality: Quality) -> bool {
        let same = self
            .key
            .as_ref()
            .is_some_and(|(id, q)| id == source_id && *q == quality);
        if same {
            return false;
        }
        let had_data = !self.set.is_empty();
        self.key = Some((source_id.to_string(), quality));
        self.set.clear();
        had_data
    }

    pub fn set(&self) -> &IntervalSet {
        &self.set
    }

    /// Record ranges reported by the engine (`cachedRanges`).
    pub fn record(&mut self, ranges: &[Interval]) {
        for range in ranges {
            self.set.add_cached_range(range.start, range.end);
        }
    }

    /// Missing range in the look-ahead window after the playhead, clamped to
    /// the source duration when known.
    pub fn next_prefetch_range(
        &self,
        time: f64,
        lookahead: f64,
        duration: Option<f64>,
    ) -> Option<Interval> {
        let mut end = time + lookahead;
        if let Some(duration) = duration.filter(|d| *d > 0.0) {
            end = end.min(duration);
        }
        self.set.find_missing_range(time, end)
    }
}

/// Cooldown guard against duplicate prefetch calls.
///
/// At most one prefetch may be in flight, and the same key is not retried
/// until the cooldown has elapsed.
#[derive(Debug, Clone)]
pub struct PrefetchGate {
    cooldown: Duration,
    in_flight: bool,
    last: Option<(String, Instant)>,
}

impl PrefetchGate {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            in_flight: false,
            last: None,
        }
    }

    /// Key for a prefetch of `[start, end)`, rounded outward to whole seconds.
    pub fn key(source_id: &str, quality: Quality, start: f64, end: f64) -> String {
        format!(
            "{source_id}:{quality}:{}-{}",
            start.floor() as i64,
            end.ceil() as i64
        )
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight
    }

    pub fn try_begin(&mut self, key: &str) -> bool {
        self.try_begin_at(key, Instant::now())
    }

    pub fn try_begin_at(&mut self, key: &str, now: Instant) -> bool {
        if self.in_flight {
            return false;
        }
        if let Some((last_key, at)) = &self.last
            && last_key == key
            && now.saturating_duration_since(*at) < self.cooldown
        {
            return false;
        }
        self.in_flight = true;
        self.last = Some((key.to_string(), now));
        true
    }

    pub fn finish(&mut self) {
        self.in_flight = false;
    }
}
