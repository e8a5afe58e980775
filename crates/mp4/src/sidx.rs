//! Segment Index (`sidx`) box parsing.
//!
//! A `sidx` box describes consecutive media subsegments of one track: each
//! reference carries a byte size and a duration in timescale units. DASH
//! on-demand profiles ship exactly one such box inside the representation's
//! `indexRange`, so parsing it yields the full byte/time segment map of the
//! track without touching the media itself.
//!
//! Layout (ISO 14496-12 SegmentIndexBox):
//!
//! ```text
//! size(4) type(4) [largesize(8) if size == 1]
//! version(1) flags(3) reference_ID(4) timescale(4)
//! earliest_presentation_time(4|8) first_offset(4|8)   // 8 bytes each when version != 0
//! reserved(2) reference_count(2)
//! reference_count x { type(1 bit) referenced_size(31) duration(32) sap(32) }
//! ```

use std::io::{Cursor, Read};

use byteorder::{BigEndian, ReadBytesExt};
use thiserror::Error;
use tracing::debug;

use crate::box_utils::{fourcc_to_string, header_bytes_needed, read_box_header};

/// FourCC of the segment index box.
pub const SIDX: [u8; 4] = *b"sidx";

const REFERENCED_SIZE_MASK: u32 = 0x7FFF_FFFF;

/// Size of one reference record.
const REFERENCE_LEN: usize = 12;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SidxError {
    #[error("truncated segment index: needed {needed} bytes, got {available}")]
    Truncated { needed: usize, available: usize },

    #[error("unexpected box type `{found}`, expected `{expected}`")]
    UnexpectedBoxType { expected: String, found: String },

    #[error("segment index declares a zero timescale")]
    ZeroTimescale,

    #[error("segment index {field} overflows 64 bits")]
    Overflow { field: &'static str },
}

/// One addressable media subsegment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentIndexEntry {
    /// First byte of the subsegment.
    pub byte_start: u64,
    /// Last byte of the subsegment (inclusive, HTTP `Range` style).
    pub byte_end: u64,
    /// Presentation time of the first sample, in seconds.
    pub presentation_time: f64,
    /// Duration in seconds.
    pub duration: f64,
}

impl SegmentIndexEntry {
    #[inline]
    pub fn end_time(&self) -> f64 {
        self.presentation_time + self.duration
    }

    #[inline]
    pub fn len(&self) -> u64 {
        self.byte_end + 1 - self.byte_start
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether `time` (seconds) falls inside this subsegment.
    #[inline]
    pub fn contains_time(&self, time: f64) -> bool {
        time >= self.presentation_time && time < self.end_time()
    }
}

/// Decoded segment index.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentIndex {
    pub version: u8,
    pub reference_id: u32,
    pub timescale: u32,
    pub earliest_presentation_time: u64,
    pub first_offset: u64,
    /// Total size of the box as declared by its header.
    pub box_size: u64,
    pub entries: Vec<SegmentIndexEntry>,
}

impl SegmentIndex {
    /// Sum of all reference durations, in seconds.
    pub fn total_duration(&self) -> f64 {
        self.entries.iter().map(|e| e.duration).sum()
    }

    /// End time of the last subsegment, in seconds.
    pub fn end_time(&self) -> f64 {
        self.entries
            .last()
            .map(SegmentIndexEntry::end_time)
            .unwrap_or(self.earliest_presentation_time as f64 / self.timescale as f64)
    }

    /// Index of the subsegment containing `time`, if any.
    pub fn entry_at(&self, time: f64) -> Option<usize> {
        self.entries.iter().position(|e| e.contains_time(time))
    }
}

/// Parse a `sidx` box.
///
/// `anchor` is the byte offset the DASH manifest's `indexRange` ends at; the
/// first subsegment starts at `anchor + box_size + first_offset`.
pub fn parse_sidx(data: &[u8], anchor: u64) -> Result<SegmentIndex, SidxError> {
    parse_segment_index(data, anchor, SIDX)
}

/// Parse a segment index box whose type tag must equal `expected`.
pub fn parse_segment_index(
    data: &[u8],
    anchor: u64,
    expected: [u8; 4],
) -> Result<SegmentIndex, SidxError> {
    let header = read_box_header(data).ok_or(SidxError::Truncated {
        needed: header_bytes_needed(data),
        available: data.len(),
    })?;

    if header.fourcc != expected {
        return Err(SidxError::UnexpectedBoxType {
            expected: fourcc_to_string(&expected),
            found: fourcc_to_string(&header.fourcc),
        });
    }

    // version + flags is the first thing after the header
    let version = *data.get(header.header_size).ok_or(SidxError::Truncated {
        needed: header.header_size + 1,
        available: data.len(),
    })?;
    let wide = version != 0;
    let fixed_len = header.header_size + 4 + 8 + if wide { 16 } else { 8 } + 4;
    ensure_len(data, fixed_len)?;

    let mut rdr = Cursor::new(data);
    rdr.set_position(header.header_size as u64 + 4);

    let reference_id = rdr.read_u32::<BigEndian>().map_err(|_| truncated(data, fixed_len))?;
    let timescale = rdr.read_u32::<BigEndian>().map_err(|_| truncated(data, fixed_len))?;
    if timescale == 0 {
        return Err(SidxError::ZeroTimescale);
    }

    let (earliest_presentation_time, first_offset) = if wide {
        (
            rdr.read_u64::<BigEndian>().map_err(|_| truncated(data, fixed_len))?,
            rdr.read_u64::<BigEndian>().map_err(|_| truncated(data, fixed_len))?,
        )
    } else {
        (
            u64::from(rdr.read_u32::<BigEndian>().map_err(|_| truncated(data, fixed_len))?),
            u64::from(rdr.read_u32::<BigEndian>().map_err(|_| truncated(data, fixed_len))?),
        )
    };

    let mut reserved = [0u8; 2];
    rdr.read_exact(&mut reserved)
        .map_err(|_| truncated(data, fixed_len))?;
    let reference_count = rdr.read_u16::<BigEndian>().map_err(|_| truncated(data, fixed_len))?;

    let total_len = fixed_len + reference_count as usize * REFERENCE_LEN;
    ensure_len(data, total_len)?;

    debug!(
        version,
        timescale,
        earliest_presentation_time,
        first_offset,
        reference_count,
        box_size = header.size,
        "Parsing segment index"
    );

    let timescale_f = f64::from(timescale);
    let mut offset = anchor
        .checked_add(header.size)
        .and_then(|v| v.checked_add(first_offset))
        .ok_or(SidxError::Overflow { field: "byte offset" })?;
    let mut time_ticks = earliest_presentation_time;
    let mut entries = Vec::with_capacity(reference_count as usize);

    for _ in 0..reference_count {
        let chunk = rdr.read_u32::<BigEndian>().map_err(|_| truncated(data, total_len))?;
        let referenced_size = u64::from(chunk & REFERENCED_SIZE_MASK);
        let duration = rdr.read_u32::<BigEndian>().map_err(|_| truncated(data, total_len))?;
        // starts_with_SAP / SAP_type / SAP_delta_time
        let _sap = rdr.read_u32::<BigEndian>().map_err(|_| truncated(data, total_len))?;

        let next_offset = offset
            .checked_add(referenced_size)
            .ok_or(SidxError::Overflow { field: "byte offset" })?;
        let next_ticks = time_ticks
            .checked_add(u64::from(duration))
            .ok_or(SidxError::Overflow { field: "presentation time" })?;

        entries.push(SegmentIndexEntry {
            byte_start: offset,
            byte_end: next_offset.saturating_sub(1),
            presentation_time: time_ticks as f64 / timescale_f,
            duration: f64::from(duration) / timescale_f,
        });

        offset = next_offset;
        time_ticks = next_ticks;
    }

    Ok(SegmentIndex {
        version,
        reference_id,
        timescale,
        earliest_presentation_time,
        first_offset,
        box_size: header.size,
        entries,
    })
}

#[inline]
fn truncated(data: &[u8], needed: usize) -> SidxError {
    SidxError::Truncated {
        needed,
        available: data.len(),
    }
}

#[inline]
fn ensure_len(data: &[u8], needed: usize) -> Result<(), SidxError> {
    if data.len() < needed {
        return Err(truncated(data, needed));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{make_box, make_sidx, make_sidx_large_size};
    use proptest::prelude::*;

    #[test]
    fn test_parse_sidx_version0() {
        let data = make_sidx(0, 1000, 0, 0, &[(1000, 2000), (1500, 2000), (800, 1000)]);
        let index = parse_sidx(&data, 900).unwrap();

        assert_eq!(index.version, 0);
        assert_eq!(index.timescale, 1000);
        assert_eq!(index.box_size, data.len() as u64);
        assert_eq!(index.entries.len(), 3);

        let first = index.entries[0];
        assert_eq!(first.byte_start, 900 + data.len() as u64);
        assert_eq!(first.byte_end, first.byte_start + 999);
        assert_eq!(first.presentation_time, 0.0);
        assert_eq!(first.duration, 2.0);

        let second = index.entries[1];
        assert_eq!(second.byte_start, first.byte_end + 1);
        assert_eq!(second.presentation_time, 2.0);

        let third = index.entries[2];
        assert_eq!(third.len(), 800);
        assert_eq!(third.end_time(), 5.0);
        assert_eq!(index.end_time(), 5.0);
    }

    #[test]
    fn test_parse_sidx_version1_with_first_offset_and_start_time() {
        let data = make_sidx(1, 90_000, 180_000, 64, &[(4096, 270_000)]);
        let index = parse_sidx(&data, 1_000).unwrap();

        assert_eq!(index.version, 1);
        assert_eq!(index.first_offset, 64);
        let entry = index.entries[0];
        assert_eq!(entry.byte_start, 1_000 + data.len() as u64 + 64);
        assert_eq!(entry.presentation_time, 2.0);
        assert_eq!(entry.duration, 3.0);
    }

    #[test]
    fn test_parse_sidx_large_size_header() {
        let data = make_sidx_large_size(0, 1000, 0, 0, &[(10, 500), (20, 500)]);
        let index = parse_sidx(&data, 0).unwrap();
        assert_eq!(index.box_size, data.len() as u64);
        assert_eq!(index.entries[0].byte_start, data.len() as u64);
        assert_eq!(index.entries[1].presentation_time, 0.5);
    }

    #[test]
    fn test_reference_type_bit_is_ignored() {
        let data = make_sidx(0, 1000, 0, 0, &[(0x8000_0000 | 100, 1000)]);
        let index = parse_sidx(&data, 0).unwrap();
        assert_eq!(index.entries[0].len(), 100);
    }

    #[test]
    fn test_rejects_unexpected_box_type() {
        let data = make_box(b"moof", &[0u8; 32]);
        let err = parse_sidx(&data, 0).unwrap_err();
        assert_eq!(
            err,
            SidxError::UnexpectedBoxType {
                expected: "sidx".to_string(),
                found: "moof".to_string(),
            }
        );
    }

    #[test]
    fn test_rejects_truncated_references() {
        let mut data = make_sidx(0, 1000, 0, 0, &[(10, 10), (10, 10)]);
        data.truncate(data.len() - 4);
        assert!(matches!(
            parse_sidx(&data, 0),
            Err(SidxError::Truncated { .. })
        ));
    }

    #[test]
    fn test_rejects_short_header() {
        assert_eq!(
            parse_sidx(&[0, 0, 0], 0).unwrap_err(),
            SidxError::Truncated {
                needed: 8,
                available: 3
            }
        );
    }

    #[test]
    fn test_rejects_zero_timescale() {
        let data = make_sidx(0, 0, 0, 0, &[(10, 10)]);
        assert_eq!(parse_sidx(&data, 0).unwrap_err(), SidxError::ZeroTimescale);
    }

    #[test]
    fn test_rejects_offsets_past_u64() {
        let data = make_sidx(1, 1000, 0, u64::MAX - 10, &[(100, 1000)]);
        assert!(matches!(
            parse_sidx(&data, 1000),
            Err(SidxError::Overflow { field: "byte offset" })
        ));

        let data = make_sidx(1, 1000, 0, u64::MAX - 200, &[(100, 1000), (100, 1000)]);
        assert!(matches!(parse_sidx(&data, 0), Err(SidxError::Overflow { .. })));

        let data = make_sidx(1, 1000, u64::MAX - 500, 0, &[(100, 1000)]);
        assert!(matches!(
            parse_sidx(&data, 0),
            Err(SidxError::Overflow { field: "presentation time" })
        ));
    }

    #[test]
    fn test_entry_at_finds_containing_segment() {
        let data = make_sidx(0, 1, 0, 0, &[(1, 2), (1, 2), (1, 2)]);
        let index = parse_sidx(&data, 0).unwrap();
        assert_eq!(index.entry_at(0.0), Some(0));
        assert_eq!(index.entry_at(3.5), Some(1));
        assert_eq!(index.entry_at(6.0), None);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Durations sum to the total reference duration over the timescale and
        /// the first entry starts right after the box, shifted by `first_offset`.
        #[test]
        fn prop_sidx_durations_and_offsets(
            version in 0u8..2,
            timescale in 1u32..200_000,
            earliest in 0u32..1_000_000,
            first_offset in 0u32..10_000,
            anchor in 0u64..1_000_000,
            refs in prop::collection::vec((1u32..5_000_000, 1u32..1_000_000), 1..40),
        ) {
            let data = make_sidx(
                version,
                timescale,
                u64::from(earliest),
                u64::from(first_offset),
                &refs,
            );
            let index = parse_sidx(&data, anchor).unwrap();

            let total: u64 = refs.iter().map(|(_, d)| u64::from(*d)).sum();
            let expected = total as f64 / f64::from(timescale);
            prop_assert!((index.total_duration() - expected).abs() < 1e-6 * expected.max(1.0));

            prop_assert_eq!(
                index.entries[0].byte_start,
                anchor + data.len() as u64 + u64::from(first_offset)
            );

            for pair in index.entries.windows(2) {
                prop_assert_eq!(pair[0].byte_end + 1, pair[1].byte_start);
                prop_assert!((pair[0].end_time() - pair[1].presentation_time).abs() < 1e-6);
            }
        }
    }
}
