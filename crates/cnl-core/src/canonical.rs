//! Canonical CBOR wire encoding for packets and small records.
//!
//! Encoding follows RFC 8949 Core Deterministic Encoding:
//! - Map keys sorted by encoded byte comparison
//! - Integers use smallest valid encoding
//! - Definite lengths only
//! - No floats (durations are integer milliseconds)
//!
//! Determinism matters here: a packet's implicit digest is the hash of its
//! wire encoding, and manifests compare those digests byte for byte.

use bytes::Bytes;
use ciborium::value::Value;
use std::time::Duration;

use crate::error::{CoreError, Result};
use crate::name::{Component, Name};
use crate::packet::{Data, MetaInfo, SignatureInfo, SignatureKind};

/// Data packet field keys.
///
/// Keys 0-23 encode as single bytes in CBOR.
mod keys {
    pub const NAME: u64 = 0;
    pub const FRESHNESS_PERIOD: u64 = 1;
    pub const FINAL_BLOCK_ID: u64 = 2;
    pub const CONTENT: u64 = 3;
    pub const SIGNATURE_KIND: u64 = 4;
    pub const KEY_LOCATOR: u64 = 5;
    pub const SIGNATURE_VALUE: u64 = 6;
}

impl Data {
    /// Encode the full packet, signature included.
    pub fn wire_encode(&self) -> Bytes {
        Bytes::from(encode_canonical(&data_to_value(self, true)))
    }

    /// Decode a packet produced by [`Data::wire_encode`].
    pub fn wire_decode(bytes: &[u8]) -> Result<Data> {
        let value = decode_value(bytes)?;
        value_to_data(&value)
    }

    /// The bytes covered by the signature: every field except the signature
    /// value itself.
    pub fn signed_portion(&self) -> Vec<u8> {
        encode_canonical(&data_to_value(self, false))
    }
}

fn data_to_value(data: &Data, with_signature_value: bool) -> Value {
    let mut entries = Vec::with_capacity(7);

    entries.push((int(keys::NAME), name_to_value(&data.name)));

    if let Some(period) = data.meta_info.freshness_period {
        entries.push((int(keys::FRESHNESS_PERIOD), int(period.as_millis() as u64)));
    }

    if let Some(final_block_id) = &data.meta_info.final_block_id {
        entries.push((int(keys::FINAL_BLOCK_ID), component_to_value(final_block_id)));
    }

    entries.push((int(keys::CONTENT), Value::Bytes(data.content.to_vec())));

    entries.push((
        int(keys::SIGNATURE_KIND),
        int(u64::from(data.signature.kind.to_u8())),
    ));

    let locator = match &data.signature.key_locator {
        Some(name) => name_to_value(name),
        None => Value::Null,
    };
    entries.push((int(keys::KEY_LOCATOR), locator));

    if with_signature_value {
        entries.push((
            int(keys::SIGNATURE_VALUE),
            Value::Bytes(data.signature.value.to_vec()),
        ));
    }

    Value::Map(entries)
}

fn value_to_data(value: &Value) -> Result<Data> {
    let entries = as_map(value)?;

    let name = match map_get(entries, keys::NAME) {
        Some(v) => value_to_name(v)?,
        None => return Err(CoreError::DecodingError("missing name".into())),
    };

    let freshness_period = match map_get(entries, keys::FRESHNESS_PERIOD) {
        Some(v) => Some(Duration::from_millis(as_u64(v).ok_or_else(|| {
            CoreError::DecodingError("invalid freshness period".into())
        })?)),
        None => None,
    };

    let final_block_id = match map_get(entries, keys::FINAL_BLOCK_ID) {
        Some(v) => Some(value_to_component(v)?),
        None => None,
    };

    let content = match map_get(entries, keys::CONTENT) {
        Some(Value::Bytes(b)) => Bytes::copy_from_slice(b),
        None => Bytes::new(),
        _ => return Err(CoreError::DecodingError("invalid content".into())),
    };

    let kind = map_get(entries, keys::SIGNATURE_KIND)
        .and_then(as_u64)
        .and_then(|k| u8::try_from(k).ok())
        .and_then(SignatureKind::from_u8)
        .ok_or_else(|| CoreError::DecodingError("invalid signature kind".into()))?;

    let key_locator = match map_get(entries, keys::KEY_LOCATOR) {
        Some(Value::Null) | None => None,
        Some(v) => Some(value_to_name(v)?),
    };

    let signature_value = match map_get(entries, keys::SIGNATURE_VALUE) {
        Some(Value::Bytes(b)) => Bytes::copy_from_slice(b),
        None => Bytes::new(),
        _ => return Err(CoreError::DecodingError("invalid signature value".into())),
    };

    Ok(Data {
        name,
        meta_info: MetaInfo {
            freshness_period,
            final_block_id,
        },
        content,
        signature: SignatureInfo {
            kind,
            key_locator,
            value: signature_value,
        },
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Name codec
// ─────────────────────────────────────────────────────────────────────────────

/// A name as an array of `[type, bytes]` pairs.
pub fn name_to_value(name: &Name) -> Value {
    Value::Array(name.iter().map(component_to_value).collect())
}

pub fn component_to_value(component: &Component) -> Value {
    Value::Array(vec![
        int(u64::from(component.typ())),
        Value::Bytes(component.value().to_vec()),
    ])
}

pub fn value_to_name(value: &Value) -> Result<Name> {
    match value {
        Value::Array(items) => items.iter().map(value_to_component).collect(),
        _ => Err(CoreError::DecodingError("expected name array".into())),
    }
}

pub fn value_to_component(value: &Value) -> Result<Component> {
    match value {
        Value::Array(pair) if pair.len() == 2 => {
            let typ = as_u64(&pair[0])
                .and_then(|t| u16::try_from(t).ok())
                .ok_or_else(|| CoreError::DecodingError("invalid component type".into()))?;
            match &pair[1] {
                Value::Bytes(b) => Ok(Component::new(typ, Bytes::copy_from_slice(b))),
                _ => Err(CoreError::DecodingError("invalid component value".into())),
            }
        }
        _ => Err(CoreError::DecodingError("expected component pair".into())),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Value helpers
// ─────────────────────────────────────────────────────────────────────────────

pub(crate) fn int(n: u64) -> Value {
    Value::Integer(n.into())
}

pub(crate) fn as_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Integer(i) => u64::try_from(*i).ok(),
        _ => None,
    }
}

pub(crate) fn as_map(value: &Value) -> Result<&[(Value, Value)]> {
    match value {
        Value::Map(entries) => Ok(entries),
        _ => Err(CoreError::DecodingError("expected map".into())),
    }
}

/// Look up a map entry by integer key.
pub(crate) fn map_get(entries: &[(Value, Value)], key: u64) -> Option<&Value> {
    entries
        .iter()
        .find(|(k, _)| as_u64(k) == Some(key))
        .map(|(_, v)| v)
}

/// Parse CBOR bytes into a generic value.
pub fn decode_value(bytes: &[u8]) -> Result<Value> {
    ciborium::from_reader(bytes).map_err(|e| CoreError::DecodingError(e.to_string()))
}

// ─────────────────────────────────────────────────────────────────────────────
// Deterministic encoder
// ─────────────────────────────────────────────────────────────────────────────

/// Encode a CBOR value canonically.
pub fn encode_canonical(value: &Value) -> Vec<u8> {
    let mut buf = Vec::new();
    encode_value_to(&mut buf, value);
    buf
}

fn encode_value_to(buf: &mut Vec<u8>, value: &Value) {
    match value {
        Value::Integer(i) => encode_integer(buf, *i),
        Value::Bytes(b) => encode_bytes(buf, b),
        Value::Text(s) => encode_text(buf, s),
        Value::Array(arr) => encode_array(buf, arr),
        Value::Map(entries) => encode_map_canonical(buf, entries),
        Value::Bool(b) => buf.push(if *b { 0xf5 } else { 0xf4 }),
        Value::Null => buf.push(0xf6),
        Value::Float(_) => panic!("floats not supported in canonical encoding"),
        _ => panic!("unsupported CBOR value type"),
    }
}

/// Major types 0 and 1.
fn encode_integer(buf: &mut Vec<u8>, i: ciborium::value::Integer) {
    let n: i128 = i.into();
    if n >= 0 {
        encode_uint(buf, 0, n as u64);
    } else {
        // -1 encodes as 0, -2 as 1, ...
        encode_uint(buf, 1, (-1 - n) as u64);
    }
}

fn encode_uint(buf: &mut Vec<u8>, major: u8, n: u64) {
    let mt = major << 5;
    if n < 24 {
        buf.push(mt | (n as u8));
    } else if n <= 0xff {
        buf.push(mt | 24);
        buf.push(n as u8);
    } else if n <= 0xffff {
        buf.push(mt | 25);
        buf.extend_from_slice(&(n as u16).to_be_bytes());
    } else if n <= 0xffff_ffff {
        buf.push(mt | 26);
        buf.extend_from_slice(&(n as u32).to_be_bytes());
    } else {
        buf.push(mt | 27);
        buf.extend_from_slice(&n.to_be_bytes());
    }
}

fn encode_bytes(buf: &mut Vec<u8>, bytes: &[u8]) {
    encode_uint(buf, 2, bytes.len() as u64);
    buf.extend_from_slice(bytes);
}

fn encode_text(buf: &mut Vec<u8>, s: &str) {
    encode_uint(buf, 3, s.len() as u64);
    buf.extend_from_slice(s.as_bytes());
}

fn encode_array(buf: &mut Vec<u8>, arr: &[Value]) {
    encode_uint(buf, 4, arr.len() as u64);
    for item in arr {
        encode_value_to(buf, item);
    }
}

/// Keys are written in the order of their encoded bytes.
fn encode_map_canonical(buf: &mut Vec<u8>, entries: &[(Value, Value)]) {
    let mut encoded: Vec<(Vec<u8>, &Value)> = entries
        .iter()
        .map(|(k, v)| (encode_canonical(k), v))
        .collect();
    encoded.sort_by(|a, b| a.0.cmp(&b.0));

    encode_uint(buf, 5, encoded.len() as u64);
    for (key_bytes, value) in encoded {
        buf.extend_from_slice(&key_bytes);
        encode_value_to(buf, value);
    }
}
