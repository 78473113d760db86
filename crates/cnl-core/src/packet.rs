//! Interest and Data packets.
//!
//! An [`Interest`] asks for data by name. A [`Data`] packet carries a name,
//! delivery metadata, the content bytes and a signature. Wire encoding lives
//! in [`crate::canonical`].

use bytes::Bytes;
use std::time::Duration;

use crate::crypto::Blake3Hash;
use crate::name::{Component, Name};

/// Default lifetime applied by transports when an interest carries none.
pub const DEFAULT_INTEREST_LIFETIME: Duration = Duration::from_secs(4);

/// Which child to prefer when an interest matches several data names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildSelector {
    Leftmost,
    Rightmost,
}

/// A request for named data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interest {
    pub name: Name,
    /// `None` means the transport default.
    pub lifetime: Option<Duration>,
    pub must_be_fresh: bool,
    /// When false, only data whose name equals `name` matches.
    pub can_be_prefix: bool,
    pub child_selector: Option<ChildSelector>,
}

impl Interest {
    pub fn new(name: Name) -> Self {
        Self {
            name,
            lifetime: None,
            must_be_fresh: false,
            can_be_prefix: false,
            child_selector: None,
        }
    }

    pub fn with_lifetime(mut self, lifetime: Duration) -> Self {
        self.lifetime = Some(lifetime);
        self
    }

    pub fn with_must_be_fresh(mut self, must_be_fresh: bool) -> Self {
        self.must_be_fresh = must_be_fresh;
        self
    }

    pub fn with_can_be_prefix(mut self, can_be_prefix: bool) -> Self {
        self.can_be_prefix = can_be_prefix;
        self
    }

    /// Setting a child selector implies prefix matching.
    pub fn with_child_selector(mut self, selector: ChildSelector) -> Self {
        self.child_selector = Some(selector);
        self.can_be_prefix = true;
        self
    }

    /// Name-only match: the interest name must be a prefix of `name`.
    pub fn matches_name(&self, name: &Name) -> bool {
        self.name.is_prefix_of(name)
    }

    /// Full match against a data packet, honouring `can_be_prefix` and a
    /// trailing implicit digest component.
    pub fn matches_data(&self, data: &Data) -> bool {
        if let Some(last) = self.name.last() {
            if last.is_implicit_digest() {
                let without_digest = self.name.prefix(self.name.len() - 1);
                return without_digest == data.name
                    && last.value().as_ref() == data.full_digest().as_bytes();
            }
        }

        if self.can_be_prefix {
            self.name.is_prefix_of(&data.name)
        } else {
            self.name == data.name
        }
    }
}

/// Delivery metadata carried by a data packet.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetaInfo {
    /// How long the packet stays fresh after arrival. `None` never expires.
    pub freshness_period: Option<Duration>,
    /// The last segment component of the stream this packet belongs to.
    pub final_block_id: Option<Component>,
}

impl MetaInfo {
    pub fn with_freshness_period(mut self, period: Duration) -> Self {
        self.freshness_period = Some(period);
        self
    }

    pub fn with_final_block_id(mut self, final_block_id: Component) -> Self {
        self.final_block_id = Some(final_block_id);
        self
    }
}

/// Signature algorithm tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum SignatureKind {
    /// Blake3 digest of the signed portion, no key.
    DigestBlake3 = 0,
    /// Ed25519 over the signed portion.
    Ed25519 = 1,
    /// All-zero placeholder; integrity comes from a manifest.
    Placeholder = 2,
}

impl SignatureKind {
    pub fn to_u8(self) -> u8 {
        self as u8
    }

    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(Self::DigestBlake3),
            1 => Some(Self::Ed25519),
            2 => Some(Self::Placeholder),
            _ => None,
        }
    }
}

/// Signature block of a data packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureInfo {
    pub kind: SignatureKind,
    pub key_locator: Option<Name>,
    pub value: Bytes,
}

impl Default for SignatureInfo {
    fn default() -> Self {
        Self {
            kind: SignatureKind::DigestBlake3,
            key_locator: None,
            value: Bytes::new(),
        }
    }
}

/// A named, signed unit of content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Data {
    pub name: Name,
    pub meta_info: MetaInfo,
    pub content: Bytes,
    pub signature: SignatureInfo,
}

impl Data {
    /// An unsigned packet with empty content.
    pub fn new(name: Name) -> Self {
        Self {
            name,
            meta_info: MetaInfo::default(),
            content: Bytes::new(),
            signature: SignatureInfo::default(),
        }
    }

    pub fn with_content(mut self, content: impl Into<Bytes>) -> Self {
        self.content = content.into();
        self
    }

    pub fn with_meta_info(mut self, meta_info: MetaInfo) -> Self {
        self.meta_info = meta_info;
        self
    }

    /// Blake3 digest of the full wire encoding. This is the value an implicit
    /// digest component and a manifest entry refer to.
    pub fn full_digest(&self) -> Blake3Hash {
        Blake3Hash::hash(&self.wire_encode())
    }

    /// The name with the implicit digest component appended.
    pub fn full_name(&self) -> Name {
        self.name
            .clone()
            .append(Component::from_implicit_digest(self.full_digest().0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(uri: &str) -> Name {
        uri.parse().unwrap()
    }

    #[test]
    fn test_exact_match_by_default() {
        let interest = Interest::new(name("/a/b"));
        assert!(interest.matches_data(&Data::new(name("/a/b"))));
        assert!(!interest.matches_data(&Data::new(name("/a/b/c"))));
        // matches_name is always a prefix test.
        assert!(interest.matches_name(&name("/a/b/c")));
    }

    #[test]
    fn test_prefix_match() {
        let interest = Interest::new(name("/a")).with_can_be_prefix(true);
        assert!(interest.matches_data(&Data::new(name("/a/b/c"))));
        assert!(!interest.matches_data(&Data::new(name("/b"))));
    }

    #[test]
    fn test_implicit_digest_match() {
        let data = Data::new(name("/a/b")).with_content(&b"payload"[..]);
        let interest = Interest::new(data.full_name());
        assert!(interest.matches_data(&data));

        let altered = data.clone().with_content(&b"payloaD"[..]);
        assert!(!interest.matches_data(&altered));
    }

    #[test]
    fn test_child_selector_implies_prefix() {
        let interest = Interest::new(name("/a")).with_child_selector(ChildSelector::Rightmost);
        assert!(interest.can_be_prefix);
    }
}
