//! Names and typed name components.
//!
//! A [`Name`] is an ordered sequence of [`Component`]s. Every component
//! carries a type code, so segment, version and sequence numbers never
//! collide with generic components holding the same bytes.
//!
//! Components are totally ordered by type code, then value length, then
//! value bytes. This is the key order used for child lookup in the namespace
//! tree.

use bytes::Bytes;
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::error::{CoreError, Result};

/// Well-known component type codes.
pub mod component_type {
    pub const IMPLICIT_DIGEST: u16 = 0x01;
    pub const GENERIC: u16 = 0x08;
    pub const SEGMENT: u16 = 0x32;
    pub const BYTE_OFFSET: u16 = 0x34;
    pub const VERSION: u16 = 0x36;
    pub const TIMESTAMP: u16 = 0x38;
    pub const SEQUENCE_NUM: u16 = 0x3a;
}

use component_type::*;

/// URI markers for numeric components.
const NUMBER_MARKERS: [(&str, u16); 5] = [
    ("seg=", SEGMENT),
    ("off=", BYTE_OFFSET),
    ("v=", VERSION),
    ("t=", TIMESTAMP),
    ("seq=", SEQUENCE_NUM),
];

const DIGEST_MARKER: &str = "digest=";

/// One typed component of a [`Name`].
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Component {
    typ: u16,
    value: Bytes,
}

impl Component {
    /// Create a component with an explicit type code.
    pub fn new(typ: u16, value: impl Into<Bytes>) -> Self {
        Self {
            typ,
            value: value.into(),
        }
    }

    /// Create a generic component.
    pub fn generic(value: impl Into<Bytes>) -> Self {
        Self::new(GENERIC, value)
    }

    /// Create a numeric component, encoding `n` as a big-endian
    /// non-negative integer of 1, 2, 4 or 8 bytes.
    pub fn from_number(typ: u16, n: u64) -> Self {
        Self::new(typ, encode_non_negative(n))
    }

    pub fn from_segment(segment: u64) -> Self {
        Self::from_number(SEGMENT, segment)
    }

    pub fn from_byte_offset(offset: u64) -> Self {
        Self::from_number(BYTE_OFFSET, offset)
    }

    pub fn from_version(version: u64) -> Self {
        Self::from_number(VERSION, version)
    }

    pub fn from_timestamp(timestamp: u64) -> Self {
        Self::from_number(TIMESTAMP, timestamp)
    }

    pub fn from_sequence_number(seq: u64) -> Self {
        Self::from_number(SEQUENCE_NUM, seq)
    }

    /// Create an implicit digest component from a 32-byte packet digest.
    pub fn from_implicit_digest(digest: [u8; 32]) -> Self {
        Self::new(IMPLICIT_DIGEST, Bytes::copy_from_slice(&digest))
    }

    /// The type code.
    pub fn typ(&self) -> u16 {
        self.typ
    }

    /// The raw value bytes.
    pub fn value(&self) -> &Bytes {
        &self.value
    }

    pub fn is_generic(&self) -> bool {
        self.typ == GENERIC
    }

    pub fn is_segment(&self) -> bool {
        self.typ == SEGMENT
    }

    pub fn is_version(&self) -> bool {
        self.typ == VERSION
    }

    pub fn is_timestamp(&self) -> bool {
        self.typ == TIMESTAMP
    }

    pub fn is_sequence_number(&self) -> bool {
        self.typ == SEQUENCE_NUM
    }

    pub fn is_implicit_digest(&self) -> bool {
        self.typ == IMPLICIT_DIGEST && self.value.len() == 32
    }

    /// Decode the value as a non-negative integer, ignoring the type.
    pub fn to_number(&self) -> Result<u64> {
        decode_non_negative(&self.value)
    }

    pub fn to_segment(&self) -> Result<u64> {
        self.to_typed_number(SEGMENT)
    }

    pub fn to_version(&self) -> Result<u64> {
        self.to_typed_number(VERSION)
    }

    pub fn to_timestamp(&self) -> Result<u64> {
        self.to_typed_number(TIMESTAMP)
    }

    pub fn to_sequence_number(&self) -> Result<u64> {
        self.to_typed_number(SEQUENCE_NUM)
    }

    fn to_typed_number(&self, expected: u16) -> Result<u64> {
        if self.typ != expected {
            return Err(CoreError::ComponentTypeMismatch {
                expected,
                actual: self.typ,
            });
        }
        self.to_number()
    }
}

impl Ord for Component {
    fn cmp(&self, other: &Self) -> Ordering {
        self.typ
            .cmp(&other.typ)
            .then_with(|| self.value.len().cmp(&other.value.len()))
            .then_with(|| self.value.cmp(&other.value))
    }
}

impl PartialOrd for Component {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl From<&str> for Component {
    /// A generic component holding the UTF-8 bytes of `s` (no URI unescaping).
    fn from(s: &str) -> Self {
        Component::generic(Bytes::copy_from_slice(s.as_bytes()))
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_implicit_digest() {
            return write!(f, "{}{}", DIGEST_MARKER, hex::encode(&self.value));
        }
        if let Some((marker, _)) = NUMBER_MARKERS.iter().find(|(_, t)| *t == self.typ) {
            if let Ok(n) = self.to_number() {
                return write!(f, "{}{}", marker, n);
            }
        }
        if self.typ == GENERIC {
            write!(f, "{}", escape(&self.value))
        } else {
            write!(f, "{}={}", self.typ, escape(&self.value))
        }
    }
}

impl fmt::Debug for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Component({})", self)
    }
}

impl FromStr for Component {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        if let Some(hex_digest) = s.strip_prefix(DIGEST_MARKER) {
            let bytes = hex::decode(hex_digest)
                .map_err(|e| CoreError::InvalidComponent(format!("{}: {}", s, e)))?;
            let digest: [u8; 32] = bytes
                .try_into()
                .map_err(|_| CoreError::InvalidComponent(format!("{}: digest must be 32 bytes", s)))?;
            return Ok(Component::from_implicit_digest(digest));
        }

        for (marker, typ) in NUMBER_MARKERS {
            if let Some(number) = s.strip_prefix(marker) {
                let n: u64 = number
                    .parse()
                    .map_err(|_| CoreError::InvalidComponent(s.to_string()))?;
                return Ok(Component::from_number(typ, n));
            }
        }

        // "<type>=<escaped value>" for other typed components
        if let Some((typ, value)) = s.split_once('=') {
            let typ: u16 = typ
                .parse()
                .map_err(|_| CoreError::InvalidComponent(s.to_string()))?;
            return Ok(Component::new(typ, unescape(value)?));
        }

        Ok(Component::generic(unescape(s)?))
    }
}

/// Encode a non-negative integer using the shortest of 1, 2, 4 or 8 bytes.
fn encode_non_negative(n: u64) -> Bytes {
    if n <= 0xff {
        Bytes::copy_from_slice(&[n as u8])
    } else if n <= 0xffff {
        Bytes::copy_from_slice(&(n as u16).to_be_bytes())
    } else if n <= 0xffff_ffff {
        Bytes::copy_from_slice(&(n as u32).to_be_bytes())
    } else {
        Bytes::copy_from_slice(&n.to_be_bytes())
    }
}

fn decode_non_negative(bytes: &[u8]) -> Result<u64> {
    match bytes.len() {
        1 => Ok(u64::from(bytes[0])),
        2 => Ok(u64::from(u16::from_be_bytes([bytes[0], bytes[1]]))),
        4 => Ok(u64::from(u32::from_be_bytes([
            bytes[0], bytes[1], bytes[2], bytes[3],
        ]))),
        8 => {
            let mut arr = [0u8; 8];
            arr.copy_from_slice(bytes);
            Ok(u64::from_be_bytes(arr))
        }
        n => Err(CoreError::InvalidComponent(format!(
            "non-negative integer of length {}",
            n
        ))),
    }
}

fn is_unreserved(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'-' | b'.' | b'_' | b'~')
}

/// Percent-encode a component value. Values made only of periods get three
/// extra periods so that "." and ".." stay distinct from path syntax.
fn escape(value: &[u8]) -> String {
    if value.iter().all(|b| *b == b'.') {
        return format!("...{}", ".".repeat(value.len()));
    }
    let mut out = String::with_capacity(value.len());
    for &b in value {
        if is_unreserved(b) {
            out.push(b as char);
        } else {
            out.push_str(&format!("%{:02X}", b));
        }
    }
    out
}

fn unescape(s: &str) -> Result<Bytes> {
    let raw = s.as_bytes();
    let mut out = Vec::with_capacity(raw.len());
    let mut i = 0;
    while i < raw.len() {
        if raw[i] == b'%' {
            let hex_pair = raw
                .get(i + 1..i + 3)
                .ok_or_else(|| CoreError::InvalidComponent(format!("truncated escape in {}", s)))?;
            let decoded = hex::decode(hex_pair)
                .map_err(|_| CoreError::InvalidComponent(format!("bad escape in {}", s)))?;
            out.extend_from_slice(&decoded);
            i += 3;
        } else {
            out.push(raw[i]);
            i += 1;
        }
    }

    if !out.is_empty() && out.iter().all(|b| *b == b'.') {
        if out.len() < 3 {
            return Err(CoreError::InvalidComponent(format!(
                "{} is not a valid component",
                s
            )));
        }
        out.drain(..3);
    }
    Ok(Bytes::from(out))
}

/// A hierarchical name.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct Name {
    components: Vec<Component>,
}

impl Name {
    /// The empty name "/".
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_components(components: impl IntoIterator<Item = Component>) -> Self {
        Self {
            components: components.into_iter().collect(),
        }
    }

    /// Return this name with `component` appended.
    pub fn append(mut self, component: impl Into<Component>) -> Self {
        self.components.push(component.into());
        self
    }

    pub fn push(&mut self, component: impl Into<Component>) {
        self.components.push(component.into());
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    pub fn components(&self) -> &[Component] {
        &self.components
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Component> {
        self.components.iter()
    }

    /// Get a component by index. Negative indexes count from the end.
    pub fn get(&self, index: isize) -> Option<&Component> {
        let i = if index < 0 {
            self.components.len().checked_sub(index.unsigned_abs())?
        } else {
            index as usize
        };
        self.components.get(i)
    }

    pub fn last(&self) -> Option<&Component> {
        self.components.last()
    }

    /// The first `n` components (the whole name if `n` exceeds the length).
    pub fn prefix(&self, n: usize) -> Name {
        let n = n.min(self.components.len());
        Name {
            components: self.components[..n].to_vec(),
        }
    }

    /// True if every component of this name equals the corresponding leading
    /// component of `other`.
    pub fn is_prefix_of(&self, other: &Name) -> bool {
        self.components.len() <= other.components.len()
            && self
                .components
                .iter()
                .zip(other.components.iter())
                .all(|(a, b)| a == b)
    }

    /// URI form, e.g. `/video/frame/seg=3`.
    pub fn to_uri(&self) -> String {
        self.to_string()
    }
}

impl Ord for Name {
    fn cmp(&self, other: &Self) -> Ordering {
        for (a, b) in self.components.iter().zip(other.components.iter()) {
            match a.cmp(b) {
                Ordering::Equal => continue,
                unequal => return unequal,
            }
        }
        self.components.len().cmp(&other.components.len())
    }
}

impl PartialOrd for Name {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl std::ops::Index<usize> for Name {
    type Output = Component;

    fn index(&self, index: usize) -> &Component {
        &self.components[index]
    }
}

impl<'a> IntoIterator for &'a Name {
    type Item = &'a Component;
    type IntoIter = std::slice::Iter<'a, Component>;

    fn into_iter(self) -> Self::IntoIter {
        self.components.iter()
    }
}

impl FromIterator<Component> for Name {
    fn from_iter<I: IntoIterator<Item = Component>>(iter: I) -> Self {
        Name::from_components(iter)
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.components.is_empty() {
            return write!(f, "/");
        }
        for component in &self.components {
            write!(f, "/{}", component)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Name({})", self)
    }
}

impl FromStr for Name {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        let path = trimmed.strip_prefix("ndn:").unwrap_or(trimmed);
        if !path.is_empty() && !path.starts_with('/') {
            return Err(CoreError::InvalidName(format!("{} is not absolute", s)));
        }
        path.split('/')
            .filter(|piece| !piece.is_empty())
            .map(Component::from_str)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_uri_roundtrip_with_typed_components() {
        let name: Name = "/video/frame/v=256/seg=3".parse().unwrap();
        assert_eq!(name.len(), 4);
        assert!(name[2].is_version());
        assert_eq!(name[2].to_version().unwrap(), 256);
        assert_eq!(name[3].to_segment().unwrap(), 3);
        assert_eq!(name.to_uri(), "/video/frame/v=256/seg=3");
    }

    #[test]
    fn test_non_negative_integer_lengths() {
        assert_eq!(Component::from_segment(0).value().len(), 1);
        assert_eq!(Component::from_segment(255).value().len(), 1);
        assert_eq!(Component::from_segment(256).value().len(), 2);
        assert_eq!(Component::from_segment(70_000).value().len(), 4);
        assert_eq!(Component::from_segment(1 << 40).value().len(), 8);
        assert_eq!(
            Component::from_segment(1 << 40).to_segment().unwrap(),
            1 << 40
        );
    }

    #[test]
    fn test_typed_accessor_rejects_wrong_type() {
        let seq = Component::from_sequence_number(5);
        assert!(seq.to_segment().is_err());
        assert_eq!(seq.to_sequence_number().unwrap(), 5);
    }

    #[test]
    fn test_component_ordering() {
        // Type first: generic (8) sorts before segment (0x32).
        assert!(Component::from("zzz") < Component::from_segment(0));
        // Then length: shorter values first.
        assert!(Component::from_segment(255) < Component::from_segment(256));
        // Then bytes.
        assert!(Component::from("a") < Component::from("b"));
    }

    #[test]
    fn test_escaping() {
        let c = Component::from("a b/c");
        assert_eq!(c.to_string(), "a%20b%2Fc");
        let parsed: Component = "a%20b%2Fc".parse().unwrap();
        assert_eq!(parsed, c);

        let empty = Component::generic(Bytes::new());
        assert_eq!(empty.to_string(), "...");
        let parsed: Component = "...".parse().unwrap();
        assert_eq!(parsed, empty);
    }

    #[test]
    fn test_prefix_relationships() {
        let parent: Name = "/a/b".parse().unwrap();
        let child = parent.clone().append(Component::from_segment(1));
        assert!(parent.is_prefix_of(&child));
        assert!(!child.is_prefix_of(&parent));
        assert!(Name::new().is_prefix_of(&parent));
        assert_eq!(child.prefix(2), parent);
        assert!(parent < child);
    }

    #[test]
    fn test_negative_index() {
        let name: Name = "/a/b/c".parse().unwrap();
        assert_eq!(name.get(-1), Some(&Component::from("c")));
        assert_eq!(name.get(-3), Some(&Component::from("a")));
        assert_eq!(name.get(-4), None);
    }

    #[test]
    fn test_relative_uri_rejected() {
        assert!("a/b".parse::<Name>().is_err());
        assert!("/".parse::<Name>().unwrap().is_empty());
    }

    fn generic_name() -> impl Strategy<Value = Name> {
        proptest::collection::vec("[a-zA-Z0-9_-]{1,12}", 0..6).prop_map(|parts| {
            parts
                .iter()
                .fold(Name::default(), |name, part| name.append(part.as_str()))
        })
    }

    proptest! {
        #[test]
        fn test_segment_order_is_numeric_order(a in any::<u64>(), b in any::<u64>()) {
            prop_assert_eq!(
                Component::from_segment(a).cmp(&Component::from_segment(b)),
                a.cmp(&b)
            );
        }

        #[test]
        fn test_uri_parses_back(name in generic_name(), segment in any::<u64>()) {
            let name = name.append(Component::from_segment(segment));
            let parsed: Name = name.to_uri().parse().unwrap();
            prop_assert_eq!(parsed, name);
        }

        #[test]
        fn test_prefix_sorts_first(name in generic_name(), cut in 0usize..6) {
            let prefix = name.prefix(cut.min(name.len()));
            prop_assert!(prefix.is_prefix_of(&name));
            prop_assert!(prefix <= name);
        }
    }
}
