//! Entry Codec Module
//!
//! Serializes values into byte payloads, optionally compressing them, and
//! records which scheme was used so the transformation can be reversed on
//! read regardless of the reading store's own configuration.

use std::io::{Read, Write};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use serde_json::Value;

use crate::cache::COMPRESSION_THRESHOLD;
use crate::error::{Result, StoreError};

// == Compression Scheme ==
/// Payload compression schemes known to this build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    Gzip,
}

impl Compression {
    /// Resolves a configured scheme name.
    ///
    /// Unknown names fail here, at configuration time, never lazily at
    /// first write.
    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            "gzip" => Ok(Compression::Gzip),
            other => Err(StoreError::UnsupportedCompression(other.to_string())),
        }
    }

    /// The tag recorded on rows compressed with this scheme.
    pub fn tag(&self) -> &'static str {
        match self {
            Compression::Gzip => "gzip",
        }
    }

    fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        match self {
            Compression::Gzip => {
                let mut encoder = GzEncoder::new(Vec::new(), flate2::Compression::default());
                encoder.write_all(data)?;
                Ok(encoder.finish()?)
            }
        }
    }

    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>> {
        match self {
            Compression::Gzip => {
                let mut out = Vec::new();
                GzDecoder::new(data).read_to_end(&mut out)?;
                Ok(out)
            }
        }
    }
}

// == Encode ==
/// Serializes a value into a storable payload plus its compression tag.
///
/// Integer values are always stored as their plain serialized bytes so the
/// backing store's native arithmetic can operate on them directly. Other
/// values are compressed only when a scheme is configured and the
/// serialized form reaches the size threshold; smaller payloads stay plain
/// and untagged to skip the decompression cost on read.
pub fn encode(value: &Value, compression: Option<Compression>) -> Result<(Vec<u8>, Option<String>)> {
    let plain = serde_json::to_vec(value)?;

    if is_numeric(value) {
        return Ok((plain, None));
    }

    match compression {
        Some(scheme) if plain.len() >= COMPRESSION_THRESHOLD => {
            let compressed = scheme.compress(&plain)?;
            Ok((compressed, Some(scheme.tag().to_string())))
        }
        _ => Ok((plain, None)),
    }
}

// == Decode ==
/// Reverses `encode`, dispatching purely on the row's stored tag.
///
/// A store configured without compression can therefore read rows written
/// by a store configured with it, and vice versa.
///
/// # Errors
/// Returns `StoreError::UnsupportedCompression` when the tag names a scheme
/// this build cannot resolve.
pub fn decode(payload: &[u8], tag: Option<&str>) -> Result<Value> {
    let plain = match tag {
        None => payload.to_vec(),
        Some(tag) => Compression::from_name(tag)?.decompress(payload)?,
    };
    Ok(serde_json::from_slice(&plain)?)
}

/// Whether a value is an integer eligible for atomic increment/decrement.
fn is_numeric(value: &Value) -> bool {
    value.as_i64().is_some() || value.as_u64().is_some()
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_name_gzip() {
        assert_eq!(Compression::from_name("gzip").unwrap(), Compression::Gzip);
    }

    #[test]
    fn test_from_name_unknown() {
        let result = Compression::from_name("lz9");
        assert!(matches!(result, Err(StoreError::UnsupportedCompression(_))));
    }

    #[test]
    fn test_encode_small_value_stays_plain() {
        let (payload, tag) = encode(&json!("hello"), Some(Compression::Gzip)).unwrap();
        assert_eq!(payload, b"\"hello\"".to_vec());
        assert!(tag.is_none());
    }

    #[test]
    fn test_encode_large_value_compressed() {
        let value = json!("x".repeat(COMPRESSION_THRESHOLD * 2));
        let (payload, tag) = encode(&value, Some(Compression::Gzip)).unwrap();
        assert_eq!(tag.as_deref(), Some("gzip"));
        assert!(payload.len() < COMPRESSION_THRESHOLD * 2);
    }

    #[test]
    fn test_encode_large_value_without_scheme_stays_plain() {
        let value = json!("x".repeat(COMPRESSION_THRESHOLD * 2));
        let (payload, tag) = encode(&value, None).unwrap();
        assert!(tag.is_none());
        assert_eq!(payload.len(), COMPRESSION_THRESHOLD * 2 + 2);
    }

    #[test]
    fn test_encode_at_threshold_boundary() {
        // Serialized length includes the surrounding quotes
        let under = json!("x".repeat(COMPRESSION_THRESHOLD - 3));
        let (_, tag) = encode(&under, Some(Compression::Gzip)).unwrap();
        assert!(tag.is_none());

        let at = json!("x".repeat(COMPRESSION_THRESHOLD - 2));
        let (_, tag) = encode(&at, Some(Compression::Gzip)).unwrap();
        assert_eq!(tag.as_deref(), Some("gzip"));
    }

    #[test]
    fn test_encode_integer_never_compressed() {
        let (payload, tag) = encode(&json!(42), Some(Compression::Gzip)).unwrap();
        assert_eq!(payload, b"42".to_vec());
        assert!(tag.is_none());
    }

    #[test]
    fn test_decode_round_trip_compressed() {
        let value = json!({"body": "y".repeat(COMPRESSION_THRESHOLD * 2)});
        let (payload, tag) = encode(&value, Some(Compression::Gzip)).unwrap();
        assert!(tag.is_some());
        let decoded = decode(&payload, tag.as_deref()).unwrap();
        assert_eq!(decoded, value);
    }

    #[test]
    fn test_decode_plain() {
        let decoded = decode(b"false", None).unwrap();
        assert_eq!(decoded, json!(false));
    }

    #[test]
    fn test_decode_unknown_tag_fails() {
        let result = decode(b"data", Some("snappy"));
        assert!(matches!(result, Err(StoreError::UnsupportedCompression(_))));
    }
}
