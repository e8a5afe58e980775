//! Minimal ISOBMFF helpers used by the clip preview engine.
//!
//! Only the pieces needed to turn a DASH `indexRange` into byte/time
//! segments are implemented: box header decoding and `sidx` parsing.

pub(crate) mod box_utils;
pub mod sidx;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_support;

pub use box_utils::fourcc_to_string;
pub use sidx::{SIDX, SegmentIndex, SegmentIndexEntry, SidxError, parse_segment_index, parse_sidx};
