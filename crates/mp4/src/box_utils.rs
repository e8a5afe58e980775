/// Decoded ISOBMFF box header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct BoxHeader {
    /// Total box size in bytes, header included.
    pub(crate) size: u64,
    pub(crate) fourcc: [u8; 4],
    /// 8 for a compact header, 16 when the 64-bit large size is present.
    pub(crate) header_size: usize,
}

/// Number of bytes needed before [`read_box_header`] can succeed on `data`.
pub(crate) fn header_bytes_needed(data: &[u8]) -> usize {
    if data.len() >= 4 && u32::from_be_bytes([data[0], data[1], data[2], data[3]]) == 1 {
        16
    } else {
        8
    }
}

/// Read a box header.
///
/// Handles 32-bit size, 64-bit extended size (`size == 1`),
/// and box-extends-to-EOF (`size == 0`).
pub(crate) fn read_box_header(data: &[u8]) -> Option<BoxHeader> {
    if data.len() < 8 {
        return None;
    }

    let size = u32::from_be_bytes([data[0], data[1], data[2], data[3]]) as u64;
    let fourcc: [u8; 4] = [data[4], data[5], data[6], data[7]];

    if size == 1 {
        if data.len() < 16 {
            return None;
        }
        let ext_size = u64::from_be_bytes([
            data[8], data[9], data[10], data[11], data[12], data[13], data[14], data[15],
        ]);
        Some(BoxHeader {
            size: ext_size,
            fourcc,
            header_size: 16,
        })
    } else if size == 0 {
        Some(BoxHeader {
            size: data.len() as u64,
            fourcc,
            header_size: 8,
        })
    } else {
        Some(BoxHeader {
            size,
            fourcc,
            header_size: 8,
        })
    }
}

/// Render a FourCC for logs and error messages, escaping non-printable bytes.
pub fn fourcc_to_string(fourcc: &[u8; 4]) -> String {
    fourcc
        .iter()
        .map(|&b| {
            if b.is_ascii_graphic() || b == b' ' {
                (b as char).to_string()
            } else {
                format!("\\x{b:02x}")
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_compact_header() {
        let data = [0, 0, 0, 44, b's', b'i', b'd', b'x'];
        let header = read_box_header(&data).unwrap();
        assert_eq!(header.size, 44);
        assert_eq!(&header.fourcc, b"sidx");
        assert_eq!(header.header_size, 8);
    }

    #[test]
    fn test_read_large_size_header() {
        let mut data = vec![0, 0, 0, 1, b's', b'i', b'd', b'x'];
        data.extend_from_slice(&60u64.to_be_bytes());
        let header = read_box_header(&data).unwrap();
        assert_eq!(header.size, 60);
        assert_eq!(header.header_size, 16);
        assert_eq!(header_bytes_needed(&data), 16);
    }

    #[test]
    fn test_large_size_header_needs_sixteen_bytes() {
        let data = [0, 0, 0, 1, b's', b'i', b'd', b'x', 0, 0];
        assert!(read_box_header(&data).is_none());
        assert_eq!(header_bytes_needed(&data), 16);
    }

    #[test]
    fn test_size_zero_extends_to_end() {
        let data = [0, 0, 0, 0, b'm', b'd', b'a', b't', 1, 2, 3];
        let header = read_box_header(&data).unwrap();
        assert_eq!(header.size, data.len() as u64);
    }

    #[test]
    fn test_fourcc_to_string_escapes() {
        assert_eq!(fourcc_to_string(b"sidx"), "sidx");
        assert_eq!(fourcc_to_string(&[0, b'a', b'b', b'c']), "\\x00abc");
    }
}
