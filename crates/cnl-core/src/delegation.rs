//! Delegation sets: preference-ordered forwarding pointers to other names.
//!
//! The stream protocol publishes a one-entry set under `_latest` pointing at
//! the newest sequence-numbered object.

use bytes::Bytes;
use ciborium::value::Value;

use crate::canonical::{as_u64, decode_value, encode_canonical, int, name_to_value, value_to_name};
use crate::error::{CoreError, Result};
use crate::name::Name;

/// One pointer with its preference (lower is preferred).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delegation {
    pub preference: u64,
    pub name: Name,
}

/// Delegations kept sorted by preference, then name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DelegationSet {
    delegations: Vec<Delegation>,
}

impl DelegationSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a delegation. An existing entry for the same name is replaced.
    pub fn add(&mut self, preference: u64, name: Name) {
        self.delegations.retain(|d| d.name != name);
        let position = self
            .delegations
            .iter()
            .position(|d| (d.preference, &d.name) > (preference, &name))
            .unwrap_or(self.delegations.len());
        self.delegations.insert(position, Delegation { preference, name });
    }

    pub fn len(&self) -> usize {
        self.delegations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.delegations.is_empty()
    }

    pub fn get(&self, i: usize) -> Option<&Delegation> {
        self.delegations.get(i)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Delegation> {
        self.delegations.iter()
    }

    pub fn wire_encode(&self) -> Bytes {
        let items = self
            .delegations
            .iter()
            .map(|d| Value::Array(vec![int(d.preference), name_to_value(&d.name)]))
            .collect();
        Bytes::from(encode_canonical(&Value::Array(items)))
    }

    pub fn wire_decode(bytes: &[u8]) -> Result<Self> {
        let items = match decode_value(bytes)? {
            Value::Array(items) => items,
            _ => return Err(CoreError::DecodingError("expected delegation array".into())),
        };

        let mut set = DelegationSet::new();
        for item in &items {
            match item {
                Value::Array(pair) if pair.len() == 2 => {
                    let preference = as_u64(&pair[0])
                        .ok_or_else(|| CoreError::DecodingError("invalid preference".into()))?;
                    set.add(preference, value_to_name(&pair[1])?);
                }
                _ => return Err(CoreError::DecodingError("invalid delegation".into())),
            }
        }
        Ok(set)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sorted_by_preference() {
        let mut set = DelegationSet::new();
        set.add(10, "/b".parse().unwrap());
        set.add(1, "/a".parse().unwrap());
        set.add(5, "/c".parse().unwrap());
        let prefs: Vec<u64> = set.iter().map(|d| d.preference).collect();
        assert_eq!(prefs, vec![1, 5, 10]);
    }

    #[test]
    fn test_add_replaces_same_name() {
        let mut set = DelegationSet::new();
        set.add(10, "/a".parse().unwrap());
        set.add(2, "/a".parse().unwrap());
        assert_eq!(set.len(), 1);
        assert_eq!(set.get(0).unwrap().preference, 2);
    }

    #[test]
    fn test_wire_decode_single_pointer() {
        let mut set = DelegationSet::new();
        set.add(1, "/stream/seq=7".parse().unwrap());
        let decoded = DelegationSet::wire_decode(&set.wire_encode()).unwrap();
        let target = &decoded.get(0).unwrap().name;
        assert_eq!(target[1].to_sequence_number().unwrap(), 7);
    }
}
