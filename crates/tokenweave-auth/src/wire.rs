//! Byte-level codecs used to pack principals
//!
//! The binary-packed marshaling strategy turns a principal into bytes through a
//! [`Codec`], then armors the bytes for embedding in a text claim. [`MsgPackCodec`]
//! is the compact default; [`JsonCodec`] is useful when packed claims must stay
//! human-inspectable after base64 decoding.

use serde::{Serialize, de::DeserializeOwned};
use std::fmt;

/// Wire format codec error
#[derive(Debug, Clone)]
pub struct CodecError {
    /// Error message
    pub message: String,
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "codec error: {}", self.message)
    }
}

impl std::error::Error for CodecError {}

impl CodecError {
    /// Create a new codec error
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Create an encoding error
    pub fn encode(message: impl Into<String>) -> Self {
        Self::new(format!("encode: {}", message.into()))
    }

    /// Create a decoding error
    pub fn decode(message: impl Into<String>) -> Self {
        Self::new(format!("decode: {}", message.into()))
    }
}

/// Result type for codec operations
pub type CodecResult<T> = Result<T, CodecError>;

/// Pack/unpack service over serde types
///
/// Codecs are shared by every request-handling thread, so implementations must be
/// immutable after construction.
pub trait Codec: Send + Sync {
    /// Encode a value to bytes
    fn encode<T: Serialize>(&self, value: &T) -> CodecResult<Vec<u8>>;

    /// Decode bytes to a value
    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> CodecResult<T>;

    /// Content type for this codec (e.g., "application/msgpack")
    fn content_type(&self) -> &'static str;

    /// Codec name for debugging
    fn name(&self) -> &'static str;
}

/// JSON codec using serde_json
#[derive(Debug, Clone, Default)]
pub struct JsonCodec;

impl JsonCodec {
    /// Create a new JSON codec
    pub fn new() -> Self {
        Self
    }
}

impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> CodecResult<Vec<u8>> {
        serde_json::to_vec(value).map_err(|e| CodecError::encode(e.to_string()))
    }

    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> CodecResult<T> {
        serde_json::from_slice(bytes).map_err(|e| CodecError::decode(e.to_string()))
    }

    fn content_type(&self) -> &'static str {
        "application/json"
    }

    fn name(&self) -> &'static str {
        "json"
    }
}

/// MessagePack binary codec
///
/// Fields are written by name so that `skip_serializing_if` on optional principal
/// fields round-trips. Packed claims come from tokens whose signature has already
/// been verified, so the input is trusted by the time it reaches this codec.
#[derive(Debug, Clone, Default)]
pub struct MsgPackCodec;

impl MsgPackCodec {
    /// Create a new MessagePack codec
    pub fn new() -> Self {
        Self
    }
}

impl Codec for MsgPackCodec {
    fn encode<T: Serialize>(&self, value: &T) -> CodecResult<Vec<u8>> {
        rmp_serde::to_vec_named(value).map_err(|e| CodecError::encode(e.to_string()))
    }

    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> CodecResult<T> {
        rmp_serde::from_slice(bytes).map_err(|e| CodecError::decode(e.to_string()))
    }

    fn content_type(&self) -> &'static str {
        "application/msgpack"
    }

    fn name(&self) -> &'static str {
        "msgpack"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Sample {
        id: u32,
        #[serde(skip_serializing_if = "Option::is_none", default)]
        label: Option<String>,
    }

    #[test]
    fn test_msgpack_is_more_compact_than_json() {
        let sample = Sample {
            id: 7,
            label: Some("seven".into()),
        };
        let packed = MsgPackCodec::new().encode(&sample).unwrap();
        let json = JsonCodec::new().encode(&sample).unwrap();
        assert!(packed.len() < json.len());
    }

    #[test]
    fn test_msgpack_skips_absent_optionals() {
        let sample = Sample { id: 1, label: None };
        let codec = MsgPackCodec::new();
        let bytes = codec.encode(&sample).unwrap();
        let back: Sample = codec.decode(&bytes).unwrap();
        assert_eq!(back, sample);
    }

    #[test]
    fn test_decode_garbage_fails() {
        let result: CodecResult<Sample> = MsgPackCodec::new().decode(&[0xc1, 0xff]);
        let err = result.unwrap_err();
        assert!(err.message.starts_with("decode:"));
    }

    #[test]
    fn test_codec_metadata() {
        assert_eq!(JsonCodec::new().content_type(), "application/json");
        assert_eq!(MsgPackCodec::new().name(), "msgpack");
    }
}
