//! Proptest generators for property-based testing.

use bytes::Bytes;
use proptest::prelude::*;

use cnl::core::{Component, Name};

/// A generic component from a short lowercase word. Never starts with `_`,
/// so it cannot collide with `_meta`, `_manifest` or `_latest`.
pub fn generic_component() -> impl Strategy<Value = Component> {
    "[a-z][a-z0-9]{0,11}".prop_map(|s| Component::from(s.as_str()))
}

/// Any of the component kinds a namespace tree holds.
pub fn component() -> impl Strategy<Value = Component> {
    prop_oneof![
        3 => generic_component(),
        1 => (0u64..100_000).prop_map(Component::from_segment),
        1 => any::<u64>().prop_map(Component::from_version),
        1 => (0u64..100_000).prop_map(Component::from_sequence_number),
    ]
}

/// A name with up to `max_len` components.
pub fn name(max_len: usize) -> impl Strategy<Value = Name> {
    prop::collection::vec(component(), 0..=max_len).prop_map(Name::from_components)
}

/// Payload bytes of up to `max_len` bytes.
pub fn payload(max_len: usize) -> impl Strategy<Value = Bytes> {
    prop::collection::vec(any::<u8>(), 0..=max_len).prop_map(Bytes::from)
}

/// A shuffled `0..count`, for delivering segments out of order.
pub fn delivery_order(count: usize) -> impl Strategy<Value = Vec<usize>> {
    Just((0..count).collect::<Vec<_>>()).prop_shuffle()
}

/// Parameters for publishing one segmented object.
#[derive(Debug, Clone)]
pub struct SegmentedParams {
    pub payload: Bytes,
    pub max_segment_payload_length: usize,
}

impl SegmentedParams {
    /// Segments a producer splits the payload into. An empty payload still
    /// takes one segment.
    pub fn segment_count(&self) -> usize {
        self.payload
            .len()
            .div_ceil(self.max_segment_payload_length)
            .max(1)
    }
}

impl Arbitrary for SegmentedParams {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        (payload(200), 1usize..=32)
            .prop_map(|(payload, max_segment_payload_length)| SegmentedParams {
                payload,
                max_segment_payload_length,
            })
            .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cnl::{Namespace, SegmentedObjectConfig, SegmentedObjectHandler};

    proptest! {
        #[test]
        fn test_name_uri_parses_back(name in name(6)) {
            let parsed: Name = name.to_string().parse().unwrap();
            prop_assert_eq!(parsed, name);
        }

        #[test]
        fn test_split_covers_payload(params: SegmentedParams) {
            let handler = SegmentedObjectHandler::new(SegmentedObjectConfig {
                max_segment_payload_length: params.max_segment_payload_length,
                ..SegmentedObjectConfig::default()
            })
            .unwrap();
            let ns = Namespace::new("/obj".parse().unwrap());
            ns.set_signer(std::rc::Rc::new(cnl::core::DigestSigner));
            handler.set_object(&ns, params.payload.clone(), false).unwrap();

            let mut joined = Vec::new();
            for i in 0..params.segment_count() {
                let segment = ns.find_child(&Component::from_segment(i as u64)).unwrap();
                let content = segment.data().unwrap().content.clone();
                prop_assert!(content.len() <= params.max_segment_payload_length);
                joined.extend_from_slice(&content);
            }
            prop_assert!(ns
                .find_child(&Component::from_segment(params.segment_count() as u64))
                .is_none());
            prop_assert_eq!(joined.as_slice(), params.payload.as_ref());
        }
    }
}
