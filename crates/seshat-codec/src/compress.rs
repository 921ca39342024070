//! Gzip compression for payload bodies.

use std::io::{Read, Write};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;

use crate::error::{CodecError, Result};

/// Compress a payload body with gzip at the default level.
pub(crate) fn compress(raw: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::with_capacity(raw.len() / 2), Compression::default());
    encoder.write_all(raw)?;
    Ok(encoder.finish()?)
}

/// Decompress a gzip payload body, expecting exactly `expected_len` bytes.
///
/// The read is capped at `expected_len + 1` so a corrupt header can never
/// trigger an unbounded allocation; producing more or fewer bytes than the
/// header declares is corruption.
pub(crate) fn decompress(data: &[u8], expected_len: usize) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(expected_len);
    let mut decoder = GzDecoder::new(data).take(expected_len as u64 + 1);
    decoder
        .read_to_end(&mut out)
        .map_err(|e| CodecError::CorruptPayload(format!("gzip decode failed: {e}")))?;

    if out.len() != expected_len {
        return Err(CodecError::CorruptPayload(format!(
            "decompressed to {} bytes, header declared {expected_len}",
            out.len()
        )));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compress_round_trip() {
        let raw = b"the quick brown fox jumps over the lazy dog".repeat(100);
        let packed = compress(&raw).unwrap();
        assert!(packed.len() < raw.len());

        let unpacked = decompress(&packed, raw.len()).unwrap();
        assert_eq!(unpacked, raw);
    }

    #[test]
    fn test_decompress_wrong_expected_len() {
        let packed = compress(b"hello world").unwrap();
        assert!(matches!(
            decompress(&packed, 5),
            Err(CodecError::CorruptPayload(_))
        ));
    }

    #[test]
    fn test_decompress_garbage() {
        assert!(matches!(
            decompress(&[0xde, 0xad, 0xbe, 0xef], 16),
            Err(CodecError::CorruptPayload(_))
        ));
    }
}
