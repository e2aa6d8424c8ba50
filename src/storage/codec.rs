//! Framing for document files.
//!
//! Every file is a single frame:
//! ```text
//! [magic: 4 bytes "WBDC"][version: 1 byte][length: 4 bytes LE][data: N bytes JSON][crc32: 4 bytes LE]
//! ```
//! The checksum turns torn writes and bit rot into a clean "corrupt" result
//! instead of a half-parsed document.

use std::io::{Error as IoError, ErrorKind, Read, Result as IoResult};

use crc32fast::Hasher;

/// Current codec version.
const CODEC_VERSION: u8 = 1;

/// Magic bytes identifying a writeback document file.
pub const MAGIC: [u8; 4] = *b"WBDC";

fn checksum(data: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(data);
    hasher.finalize()
}

fn invalid(message: String) -> IoError {
    IoError::new(ErrorKind::InvalidData, message)
}

/// Wraps `data` in a frame.
///
/// # Errors
/// Fails if `data` is longer than `u32::MAX` bytes.
pub fn encode(data: &[u8]) -> IoResult<Vec<u8>> {
    let len = u32::try_from(data.len())
        .map_err(|_| invalid(format!("document of {} bytes cannot be framed", data.len())))?;

    let mut out = Vec::with_capacity(MAGIC.len() + 1 + 4 + data.len() + 4);
    out.extend_from_slice(&MAGIC);
    out.push(CODEC_VERSION);
    out.extend_from_slice(&len.to_le_bytes());
    out.extend_from_slice(data);
    out.extend_from_slice(&checksum(data).to_le_bytes());
    Ok(out)
}

/// Reads one frame and returns its payload, verifying the checksum.
///
/// # Errors
/// - `InvalidData` on bad magic, unsupported version, a length above
///   `max_len`, a CRC mismatch, or bytes after the frame
/// - `UnexpectedEof` if the frame is truncated
pub fn decode(reader: &mut impl Read, max_len: usize) -> IoResult<Vec<u8>> {
    let mut magic = [0u8; 4];
    reader.read_exact(&mut magic)?;
    if magic != MAGIC {
        return Err(invalid(format!(
            "invalid magic bytes: expected {MAGIC:?}, got {magic:?}"
        )));
    }

    let mut version = [0u8; 1];
    reader.read_exact(&mut version)?;
    if version[0] != CODEC_VERSION {
        return Err(invalid(format!(
            "unsupported codec version: {} (expected {CODEC_VERSION})",
            version[0]
        )));
    }

    let mut len_bytes = [0u8; 4];
    reader.read_exact(&mut len_bytes)?;
    let len = u32::from_le_bytes(len_bytes) as usize;

    // Reject before allocating.
    if len > max_len {
        return Err(invalid(format!("entry size {len} exceeds maximum {max_len}")));
    }

    let mut data = vec![0u8; len];
    reader.read_exact(&mut data)?;

    let mut crc_bytes = [0u8; 4];
    reader.read_exact(&mut crc_bytes)?;
    let stored = u32::from_le_bytes(crc_bytes);
    let computed = checksum(&data);
    if stored != computed {
        return Err(invalid(format!(
            "CRC mismatch: stored={stored:08x}, computed={computed:08x} (data corrupted)"
        )));
    }

    let mut trailing = [0u8; 1];
    if reader.read(&mut trailing)? != 0 {
        return Err(invalid("trailing bytes after frame".to_string()));
    }

    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_roundtrip() {
        let payload = br#"{"brightness":128}"#;
        let framed = encode(payload).unwrap();
        assert_eq!(&framed[..4], &MAGIC);
        let decoded = decode(&mut Cursor::new(framed), 1024).unwrap();
        assert_eq!(decoded, payload);
    }

    #[test]
    fn test_detects_corruption() {
        let mut framed = encode(b"{\"on\":true}").unwrap();
        framed[12] ^= 0xFF;
        let err = decode(&mut Cursor::new(framed), 1024).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidData);
        assert!(err.to_string().contains("CRC"));
    }

    #[test]
    fn test_detects_truncation() {
        let framed = encode(b"{\"on\":true}").unwrap();
        let truncated = framed[..framed.len() - 3].to_vec();
        let err = decode(&mut Cursor::new(truncated), 1024).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnexpectedEof);
    }

    #[test]
    fn test_rejects_oversized_entry() {
        let framed = encode(&[b'x'; 100]).unwrap();
        let err = decode(&mut Cursor::new(framed), 64).unwrap_err();
        assert!(err.to_string().contains("exceeds maximum"));
    }

    #[test]
    fn test_rejects_foreign_files_and_trailing_bytes() {
        let err = decode(&mut Cursor::new(b"{\"plain\":\"json\"}".to_vec()), 1024).unwrap_err();
        assert!(err.to_string().contains("magic"));

        let mut framed = encode(b"{}").unwrap();
        framed.push(0);
        let err = decode(&mut Cursor::new(framed), 1024).unwrap_err();
        assert!(err.to_string().contains("trailing"));
    }
}
