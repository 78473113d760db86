//! Golden test vectors for wire encodings and tree ordering.
//!
//! The vectors live in `vectors/golden.json` so other implementations can
//! check themselves against the same file.

use serde::{Deserialize, Serialize};

use cnl::core::{Component, ContentMetaInfo, DelegationSet, Name};
use cnl::Namespace;

const GOLDEN_JSON: &str = include_str!("../vectors/golden.json");

/// A golden test vector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoldenVector {
    /// Human-readable name for the vector.
    pub name: String,
    #[serde(flatten)]
    pub input: VectorInput,
    /// Lowercase hex of the encoding, or the comma-joined child order.
    pub expected: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum VectorInput {
    /// Value bytes of one component.
    Component { uri: String },
    ContentMeta {
        content_type: String,
        timestamp: u64,
        has_segments: bool,
        /// Hex.
        other: String,
    },
    Delegations { entries: Vec<(u64, String)> },
    /// Children created in the given order, listed back in tree order.
    ChildOrder { children: Vec<String> },
}

/// Get all golden test vectors.
pub fn all_vectors() -> serde_json::Result<Vec<GoldenVector>> {
    serde_json::from_str(GOLDEN_JSON)
}

/// Compute the actual output for a vector's input.
pub fn compute(input: &VectorInput) -> cnl::Result<String> {
    Ok(match input {
        VectorInput::Component { uri } => {
            let component: Component = uri.parse()?;
            hex::encode(component.value())
        }
        VectorInput::ContentMeta {
            content_type,
            timestamp,
            has_segments,
            other,
        } => {
            let other = hex::decode(other).map_err(|e| {
                cnl::NamespaceError::InvalidConfig(format!("vector payload is not hex: {e}"))
            })?;
            let meta = ContentMetaInfo::new(content_type.as_str())
                .with_timestamp(*timestamp)
                .with_has_segments(*has_segments)
                .with_other(other);
            hex::encode(meta.wire_encode()?)
        }
        VectorInput::Delegations { entries } => {
            let mut set = DelegationSet::new();
            for (preference, uri) in entries {
                set.add(*preference, uri.parse::<Name>()?);
            }
            hex::encode(set.wire_encode())
        }
        VectorInput::ChildOrder { children } => {
            let root = Namespace::new(Name::new());
            for child in children {
                root.get_child(child.parse::<Component>()?);
            }
            root.child_components()
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(",")
        }
    })
}

/// Check every vector. Returns `(name, matches, actual)` per vector.
pub fn verify_all_vectors() -> cnl::Result<Vec<(String, bool, String)>> {
    let vectors = all_vectors()
        .map_err(|e| cnl::NamespaceError::InvalidConfig(format!("golden vectors: {e}")))?;
    vectors
        .into_iter()
        .map(|v| {
            let actual = compute(&v.input)?;
            Ok((v.name, actual == v.expected, actual))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_vectors_match() {
        for (name, matches, actual) in verify_all_vectors().unwrap() {
            assert!(matches, "{name}: got {actual}");
        }
    }

    #[test]
    fn test_every_kind_is_covered() {
        let vectors = all_vectors().unwrap();
        let kinds: std::collections::BTreeSet<_> = vectors
            .iter()
            .map(|v| match v.input {
                VectorInput::Component { .. } => "component",
                VectorInput::ContentMeta { .. } => "content_meta",
                VectorInput::Delegations { .. } => "delegations",
                VectorInput::ChildOrder { .. } => "child_order",
            })
            .collect();
        assert_eq!(kinds.len(), 4);
    }
}
