//! The `_meta` record describing a generalized object.

use bytes::Bytes;
use ciborium::value::Value;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::canonical::{as_map, as_u64, decode_value, encode_canonical, int, map_get};
use crate::error::{CoreError, Result};

mod keys {
    pub const CONTENT_TYPE: u64 = 0;
    pub const TIMESTAMP: u64 = 1;
    pub const HAS_SEGMENTS: u64 = 2;
    pub const OTHER: u64 = 3;
}

/// Describes an object published under a name: its content type, when it
/// was produced, whether the payload is split into segments, and (for small
/// objects) the payload itself.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentMetaInfo {
    pub content_type: String,
    /// Milliseconds since the Unix epoch. Required for encoding.
    pub timestamp: Option<u64>,
    pub has_segments: bool,
    /// Inline payload. Empty when `has_segments` is true.
    pub other: Bytes,
}

impl ContentMetaInfo {
    pub fn new(content_type: impl Into<String>) -> Self {
        Self {
            content_type: content_type.into(),
            ..Self::default()
        }
    }

    pub fn with_timestamp(mut self, timestamp: u64) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn with_has_segments(mut self, has_segments: bool) -> Self {
        self.has_segments = has_segments;
        self
    }

    pub fn with_other(mut self, other: impl Into<Bytes>) -> Self {
        self.other = other.into();
        self
    }

    pub fn wire_encode(&self) -> Result<Bytes> {
        let timestamp = self
            .timestamp
            .ok_or_else(|| CoreError::EncodingError("content meta timestamp is not set".into()))?;

        let mut entries = vec![
            (int(keys::CONTENT_TYPE), Value::Text(self.content_type.clone())),
            (int(keys::TIMESTAMP), int(timestamp)),
            (int(keys::HAS_SEGMENTS), Value::Bool(self.has_segments)),
        ];
        if !self.other.is_empty() {
            entries.push((int(keys::OTHER), Value::Bytes(self.other.to_vec())));
        }
        Ok(Bytes::from(encode_canonical(&Value::Map(entries))))
    }

    pub fn wire_decode(bytes: &[u8]) -> Result<Self> {
        let value = decode_value(bytes)?;
        let entries = as_map(&value)?;

        let content_type = match map_get(entries, keys::CONTENT_TYPE) {
            Some(Value::Text(s)) => s.clone(),
            _ => return Err(CoreError::DecodingError("missing content type".into())),
        };
        let timestamp = map_get(entries, keys::TIMESTAMP)
            .and_then(as_u64)
            .ok_or_else(|| CoreError::DecodingError("missing timestamp".into()))?;
        let has_segments = match map_get(entries, keys::HAS_SEGMENTS) {
            Some(Value::Bool(b)) => *b,
            _ => return Err(CoreError::DecodingError("missing has_segments".into())),
        };
        let other = match map_get(entries, keys::OTHER) {
            Some(Value::Bytes(b)) => Bytes::copy_from_slice(b),
            None => Bytes::new(),
            _ => return Err(CoreError::DecodingError("invalid other".into())),
        };

        Ok(Self {
            content_type,
            timestamp: Some(timestamp),
            has_segments,
            other,
        })
    }
}

/// Current wall-clock time in milliseconds since the Unix epoch.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_encoding() {
        let meta = ContentMetaInfo::new("ndnrtc4").with_timestamp(1000).with_has_segments(true);
        let bytes = meta.wire_encode().unwrap();
        let mut expected = vec![0xa3, 0x00, 0x67];
        expected.extend_from_slice(b"ndnrtc4");
        expected.extend_from_slice(&[0x01, 0x19, 0x03, 0xe8, 0x02, 0xf5]);
        assert_eq!(bytes.as_ref(), expected.as_slice());
    }

    #[test]
    fn test_inline_payload_survives_decode() {
        let meta = ContentMetaInfo::new("text/plain")
            .with_timestamp(now_millis())
            .with_other(&b"Debug other"[..]);
        let decoded = ContentMetaInfo::wire_decode(&meta.wire_encode().unwrap()).unwrap();
        assert_eq!(decoded, meta);
        assert!(!decoded.has_segments);
    }

    #[test]
    fn test_encode_requires_timestamp() {
        let meta = ContentMetaInfo::new("text/plain");
        assert!(matches!(meta.wire_encode(), Err(CoreError::EncodingError(_))));
    }

    #[test]
    fn test_decode_rejects_missing_fields() {
        let value = Value::Map(vec![(int(keys::CONTENT_TYPE), Value::Text("x".into()))]);
        assert!(ContentMetaInfo::wire_decode(&encode_canonical(&value)).is_err());
    }
}
