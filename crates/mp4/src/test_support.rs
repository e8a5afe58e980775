//! Shared ISOBMFF test builders.
//!
//! This module is available for local mp4 tests and optionally for downstream
//! crate tests when the `test-utils` feature is enabled.

pub fn make_box(fourcc: &[u8; 4], body: &[u8]) -> Vec<u8> {
    let size = (8 + body.len()) as u32;
    let mut out = Vec::with_capacity(size as usize);
    out.extend_from_slice(&size.to_be_bytes());
    out.extend_from_slice(fourcc);
    out.extend_from_slice(body);
    out
}

/// Same as [`make_box`] but with a 64-bit large-size header.
pub fn make_large_box(fourcc: &[u8; 4], body: &[u8]) -> Vec<u8> {
    let size = (16 + body.len()) as u64;
    let mut out = Vec::with_capacity(size as usize);
    out.extend_from_slice(&1u32.to_be_bytes());
    out.extend_from_slice(fourcc);
    out.extend_from_slice(&size.to_be_bytes());
    out.extend_from_slice(body);
    out
}

/// Build a `sidx` body. `refs` holds `(referenced_size_word, duration)` pairs;
/// the size word is written verbatim so callers can set the reference-type bit.
pub fn make_sidx_body(
    version: u8,
    timescale: u32,
    earliest_presentation_time: u64,
    first_offset: u64,
    refs: &[(u32, u32)],
) -> Vec<u8> {
    let mut body = vec![version, 0, 0, 0];
    body.extend_from_slice(&1u32.to_be_bytes()); // reference_ID
    body.extend_from_slice(&timescale.to_be_bytes());
    if version == 0 {
        body.extend_from_slice(&(earliest_presentation_time as u32).to_be_bytes());
        body.extend_from_slice(&(first_offset as u32).to_be_bytes());
    } else {
        body.extend_from_slice(&earliest_presentation_time.to_be_bytes());
        body.extend_from_slice(&first_offset.to_be_bytes());
    }
    body.extend_from_slice(&[0, 0]);
    body.extend_from_slice(&(refs.len() as u16).to_be_bytes());
    for (size, duration) in refs {
        body.extend_from_slice(&size.to_be_bytes());
        body.extend_from_slice(&duration.to_be_bytes());
        // starts_with_SAP = 1, SAP_type = 1
        body.extend_from_slice(&0x9000_0000u32.to_be_bytes());
    }
    body
}

pub fn make_sidx(
    version: u8,
    timescale: u32,
    earliest_presentation_time: u64,
    first_offset: u64,
    refs: &[(u32, u32)],
) -> Vec<u8> {
    make_box(
        b"sidx",
        &make_sidx_body(version, timescale, earliest_presentation_time, first_offset, refs),
    )
}

pub fn make_sidx_large_size(
    version: u8,
    timescale: u32,
    earliest_presentation_time: u64,
    first_offset: u64,
    refs: &[(u32, u32)],
) -> Vec<u8> {
    make_large_box(
        b"sidx",
        &make_sidx_body(version, timescale, earliest_presentation_time, first_offset, refs),
    )
}
