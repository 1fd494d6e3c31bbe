use crate::error::XmlError;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use flate2::Compression;
use flate2::read::{ZlibDecoder, ZlibEncoder};
use std::io::Read;

/// Deflates a buffer (zlib wrapper), as EBICS requires for order data before
/// E002 encryption.
pub fn deflate(data: &[u8]) -> Result<Vec<u8>, XmlError> {
    let mut encoder = ZlibEncoder::new(data, Compression::default());
    let mut out = Vec::new();
    encoder.read_to_end(&mut out).map_err(|e| XmlError::Deflate(e.to_string()))?;
    Ok(out)
}

/// Inflates a zlib-wrapped buffer.
pub fn inflate(data: &[u8]) -> Result<Vec<u8>, XmlError> {
    let mut decoder = ZlibDecoder::new(data);
    let mut out = Vec::new();
    decoder.read_to_end(&mut out).map_err(|e| XmlError::Deflate(e.to_string()))?;
    Ok(out)
}

pub fn base64_encode(data: &[u8]) -> String {
    BASE64.encode(data)
}

pub fn base64_decode(data: &str) -> Result<Vec<u8>, XmlError> {
    BASE64.decode(data.trim()).map_err(|e| XmlError::Base64(e.to_string()))
}

/// Splits a byte buffer into fixed-size segments, the unit EBICS transfers
/// order data in across multiple `Transfer`-phase requests.
pub fn segment(data: &[u8], segment_size: usize) -> Vec<Vec<u8>> {
    data.chunks(segment_size.max(1)).map(|c| c.to_vec()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deflate_roundtrip() {
        let original = b"<OrderData>hello ebics</OrderData>".to_vec();
        let deflated = deflate(&original).unwrap();
        let restored = inflate(&deflated).unwrap();
        assert_eq!(original, restored);
    }

    #[test]
    fn base64_roundtrip() {
        let original = b"segment bytes";
        let encoded = base64_encode(original);
        let decoded = base64_decode(&encoded).unwrap();
        assert_eq!(original.to_vec(), decoded);
    }

    #[test]
    fn segment_splits_evenly() {
        let data = vec![0u8; 10];
        let segments = segment(&data, 4);
        assert_eq!(segments.len(), 3);
        assert_eq!(segments[2].len(), 2);
    }
}
