//! Objects split across segment packets.
//!
//! On the consumer side this wraps a [`SegmentStreamHandler`], collects the
//! segment payloads in order and deserializes their concatenation at the
//! stream's node. On the producer side [`SegmentedObjectHandler::set_object`]
//! splits a blob into signed segments.
//!
//! With a signature manifest, only the `_manifest` packet carries a real
//! signature. Segments are signed with a placeholder and are trusted because
//! their full digests appear, in order, in the manifest content.

use bytes::{Bytes, BytesMut};
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::{Rc, Weak};

use cnl_core::{Component, PlaceholderSigner, Signer, DIGEST_LEN};

use crate::callback::{invoke_guarded, next_callback_id};
use crate::config::SegmentedObjectConfig;
use crate::error::{NamespaceError, Result};
use crate::handler::{Handler, HandlerBinding};
use crate::namespace::Namespace;
use crate::object::Object;
use crate::segment_stream::SegmentStreamHandler;
use crate::state::NamespaceState;

/// Child holding the digests of every segment.
pub const MANIFEST: &str = "_manifest";

/// `(handler, assembled object, callback id)`
pub type SegmentedObjectFn = dyn Fn(&SegmentedObjectHandler, &Object, u64);

pub struct SegmentedObjectHandler {
    binding: HandlerBinding,
    self_ref: Weak<Self>,
    stream: Rc<SegmentStreamHandler>,
    max_segment_payload_length: Cell<usize>,
    verify_manifest: bool,
    fragments: RefCell<Vec<Bytes>>,
    on_segmented_object: RefCell<BTreeMap<u64, Rc<SegmentedObjectFn>>>,
}

impl SegmentedObjectHandler {
    pub fn new(config: SegmentedObjectConfig) -> Result<Rc<Self>> {
        config.validate()?;
        let stream = SegmentStreamHandler::new(config.stream.clone())?;
        let handler = Rc::new_cyclic(|self_ref| Self {
            binding: HandlerBinding::default(),
            self_ref: self_ref.clone(),
            stream,
            max_segment_payload_length: Cell::new(config.max_segment_payload_length),
            verify_manifest: config.verify_manifest,
            fragments: RefCell::new(Vec::new()),
            on_segmented_object: RefCell::new(BTreeMap::new()),
        });

        let weak = Rc::downgrade(&handler);
        handler.stream.add_on_segment(move |_, segment, _| {
            if let Some(h) = weak.upgrade() {
                h.on_segment(segment);
            }
        });
        Ok(handler)
    }

    /// Called once with the assembled object.
    pub fn add_on_segmented_object(
        &self,
        callback: impl Fn(&SegmentedObjectHandler, &Object, u64) + 'static,
    ) -> u64 {
        let id = next_callback_id();
        self.on_segmented_object
            .borrow_mut()
            .insert(id, Rc::new(callback));
        id
    }

    pub fn remove_callback(&self, id: u64) {
        self.on_segmented_object.borrow_mut().remove(&id);
    }

    pub fn stream(&self) -> &Rc<SegmentStreamHandler> {
        &self.stream
    }

    pub fn namespace(&self) -> Option<Namespace> {
        self.binding.namespace()
    }

    pub fn max_segment_payload_length(&self) -> usize {
        self.max_segment_payload_length.get()
    }

    pub fn set_max_segment_payload_length(&self, length: usize) -> Result<()> {
        if length < 1 {
            return Err(NamespaceError::InvalidConfig(
                "max segment payload length must be at least 1".into(),
            ));
        }
        self.max_segment_payload_length.set(length);
        Ok(())
    }

    pub fn verifies_manifest(&self) -> bool {
        self.verify_manifest
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Consuming
    // ─────────────────────────────────────────────────────────────────────────

    fn on_segment(&self, segment: Option<&Namespace>) {
        if let Some(segment) = segment {
            self.fragments
                .borrow_mut()
                .push(segment.blob_object().unwrap_or_default());
            return;
        }

        let Some(namespace) = self.stream.namespace() else {
            return;
        };
        if self.verify_manifest {
            self.verify_then_finish(&namespace);
        } else {
            self.finish(&namespace);
        }
    }

    fn finish(&self, namespace: &Namespace) {
        let fragments = std::mem::take(&mut *self.fragments.borrow_mut());
        let mut blob = BytesMut::with_capacity(fragments.iter().map(Bytes::len).sum());
        for fragment in &fragments {
            blob.extend_from_slice(fragment);
        }
        tracing::debug!(
            name = %namespace.name(),
            segments = fragments.len(),
            length = blob.len(),
            "segmented object assembled"
        );

        let weak = self.self_ref.clone();
        namespace.deserialize(
            blob.freeze(),
            Some(Rc::new(move |object: &Object| {
                if let Some(h) = weak.upgrade() {
                    h.fire_segmented_object(object);
                }
            })),
        );
    }

    fn fire_segmented_object(&self, object: &Object) {
        let callbacks: Vec<(u64, Rc<SegmentedObjectFn>)> = self
            .on_segmented_object
            .borrow()
            .iter()
            .map(|(id, cb)| (*id, Rc::clone(cb)))
            .collect();
        for (id, callback) in callbacks {
            if self.on_segmented_object.borrow().contains_key(&id) {
                invoke_guarded("on_segmented_object", || callback(self, object, id));
            }
        }
    }

    /// Fetch the manifest alongside the segments. The stream handler claims
    /// the object itself.
    fn request_manifest(&self, needed: &Namespace) {
        if self.binding.namespace().as_ref() != Some(needed) {
            return;
        }
        if let Err(e) = needed.get_child(MANIFEST).object_needed(false) {
            tracing::warn!(name = %needed.name(), error = %e, "cannot request manifest");
        }
    }

    /// Check the manifest now if it is here, otherwise once it arrives.
    fn verify_then_finish(&self, namespace: &Namespace) {
        let manifest = namespace.get_child(MANIFEST);
        if manifest.object().is_some() || manifest.state().is_failure() {
            self.check_manifest(namespace);
            return;
        }

        let weak = self.self_ref.clone();
        let target = namespace.downgrade();
        manifest.add_on_state_changed(move |listener, changed, state, id| {
            if changed != listener
                || !(state == NamespaceState::ObjectReady || state.is_failure())
            {
                return;
            }
            listener.remove_callback(id);
            if let (Some(h), Some(namespace)) = (weak.upgrade(), target.upgrade()) {
                h.check_manifest(&namespace);
            }
        });
    }

    fn check_manifest(&self, namespace: &Namespace) {
        if Self::verify_with_manifest(namespace) {
            self.finish(namespace);
        } else {
            self.fragments.borrow_mut().clear();
            namespace.fail_validation("segment digests do not match the manifest".into());
        }
    }

    /// True if `namespace/_manifest` is present and lists exactly the full
    /// digests of `seg=0..n`, in order. Segment data past `n`, or a final
    /// block id other than `seg=n`, fails the check.
    pub fn verify_with_manifest(namespace: &Namespace) -> bool {
        let Some(manifest) = namespace
            .find_child(&Component::from(MANIFEST))
            .and_then(|m| m.blob_object())
        else {
            return false;
        };
        if manifest.is_empty() || manifest.len() % DIGEST_LEN != 0 {
            return false;
        }
        let final_segment = Component::from_segment((manifest.len() / DIGEST_LEN - 1) as u64);

        let digests_match = manifest
            .chunks(DIGEST_LEN)
            .enumerate()
            .all(|(i, expected)| {
                namespace
                    .find_child(&Component::from_segment(i as u64))
                    .and_then(|segment| segment.data())
                    .is_some_and(|data| {
                        data.full_digest().matches(expected)
                            && data
                                .meta_info
                                .final_block_id
                                .as_ref()
                                .map_or(true, |id| *id == final_segment)
                    })
            });
        let nothing_past_end = namespace.children().iter().all(|child| {
            let Some(component) = child.name().last() else {
                return true;
            };
            !component.is_segment() || *component <= final_segment || child.data().is_none()
        });
        digests_match && nothing_past_end
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Producing
    // ─────────────────────────────────────────────────────────────────────────

    /// Split `content` into segments under `namespace`, each at most the
    /// max payload length and each carrying the final block id. Empty content
    /// is one empty segment. With `use_signature_manifest`, also publish
    /// `_manifest`.
    pub fn set_object(
        &self,
        namespace: &Namespace,
        content: Bytes,
        use_signature_manifest: bool,
    ) -> Result<()> {
        let max = self.max_segment_payload_length.get();
        let chunks: Vec<Bytes> = if content.is_empty() {
            vec![Bytes::new()]
        } else {
            (0..content.len())
                .step_by(max)
                .map(|start| content.slice(start..(start + max).min(content.len())))
                .collect()
        };
        let final_block_id = Component::from_segment(chunks.len() as u64 - 1);
        let placeholder: Rc<dyn Signer> = Rc::new(PlaceholderSigner);

        let mut digests = BytesMut::with_capacity(chunks.len() * DIGEST_LEN);
        for (i, chunk) in chunks.into_iter().enumerate() {
            let segment = namespace.get_child(Component::from_segment(i as u64));
            segment.set_new_data_meta_info(
                segment
                    .new_data_meta_info()
                    .with_final_block_id(final_block_id.clone()),
            );
            let signer = use_signature_manifest.then(|| Rc::clone(&placeholder));
            segment.serialize_with(Object::Blob(chunk), signer)?;

            let data = segment.data().ok_or_else(|| NamespaceError::ProductionFailed {
                name: segment.name().clone(),
                state: segment.state(),
            })?;
            digests.extend_from_slice(data.full_digest().as_bytes());
        }

        if use_signature_manifest {
            let manifest = namespace.get_child(MANIFEST);
            manifest.serialize_object(Object::Blob(digests.freeze()))?;
            if manifest.data().is_none() {
                return Err(NamespaceError::ProductionFailed {
                    name: manifest.name().clone(),
                    state: manifest.state(),
                });
            }
        }

        tracing::debug!(
            name = %namespace.name(),
            final_segment = %final_block_id,
            manifest = use_signature_manifest,
            "segmented object produced"
        );
        namespace.set_object(Object::Blob(content));
        Ok(())
    }
}

impl Handler for SegmentedObjectHandler {
    fn on_namespace_set(self: Rc<Self>, namespace: &Namespace) -> Result<()> {
        self.binding.bind(namespace)?;
        Rc::clone(&self.stream).on_namespace_set(namespace)?;

        if self.verify_manifest {
            let weak = self.self_ref.clone();
            self.binding.track(namespace.add_on_object_needed(move |_, needed, _| {
                if let Some(h) = weak.upgrade() {
                    h.request_manifest(needed);
                }
                false
            }));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cnl_core::{Data, DigestSigner, MetaInfo, Name};
    use cnl_face::MemoryNetwork;

    use crate::config::SegmentStreamConfig;
    use crate::state::ValidateState;

    fn name(uri: &str) -> Name {
        uri.parse().unwrap()
    }

    fn small_segments(verify_manifest: bool) -> SegmentedObjectConfig {
        SegmentedObjectConfig {
            stream: SegmentStreamConfig::default(),
            max_segment_payload_length: 4,
            verify_manifest,
        }
    }

    fn producer(network: &Rc<MemoryNetwork>, prefix: &str) -> Namespace {
        let ns = Namespace::new(name(prefix));
        ns.set_face(network.create_face(), Some(Rc::new(|_: &Name| {})))
            .unwrap();
        ns.set_signer(Rc::new(DigestSigner));
        ns
    }

    #[test]
    fn test_split_sizes_and_final_block_id() {
        let ns = Namespace::new(name("/obj"));
        ns.set_signer(Rc::new(DigestSigner));
        let handler = SegmentedObjectHandler::new(small_segments(false)).unwrap();
        handler
            .set_object(&ns, Bytes::from_static(b"0123456789"), false)
            .unwrap();

        let segments: Vec<Namespace> = ns.children();
        assert_eq!(segments.len(), 3);
        let lengths: Vec<usize> = segments
            .iter()
            .map(|s| s.data().unwrap().content.len())
            .collect();
        assert_eq!(lengths, vec![4, 4, 2]);
        for segment in &segments {
            assert_eq!(
                segment.data().unwrap().meta_info.final_block_id,
                Some(Component::from_segment(2))
            );
        }
        assert_eq!(ns.blob_object().unwrap().as_ref(), b"0123456789");
    }

    #[test]
    fn test_empty_object_is_one_segment() {
        let ns = Namespace::new(name("/obj"));
        ns.set_signer(Rc::new(DigestSigner));
        let handler = SegmentedObjectHandler::new(small_segments(false)).unwrap();
        handler.set_object(&ns, Bytes::new(), false).unwrap();

        let segment = ns.find_child(&Component::from_segment(0)).unwrap();
        let data = segment.data().unwrap();
        assert!(data.content.is_empty());
        assert_eq!(data.meta_info.final_block_id, Some(Component::from_segment(0)));
        assert_eq!(ns.children().len(), 1);
    }

    #[test]
    fn test_manifest_verifies_and_detects_tampering() {
        let ns = Namespace::new(name("/obj"));
        ns.set_signer(Rc::new(DigestSigner));
        let handler = SegmentedObjectHandler::new(small_segments(true)).unwrap();
        handler
            .set_object(&ns, Bytes::from_static(b"manifest protected"), true)
            .unwrap();
        assert!(SegmentedObjectHandler::verify_with_manifest(&ns));

        // Same packets in a fresh tree, with one byte of segment 1 altered.
        let copy = Namespace::new(name("/obj"));
        for child in ns.children() {
            let mut data: Data = (*child.data().unwrap()).clone();
            if child.name().last() == Some(&Component::from_segment(1)) {
                let mut content = data.content.to_vec();
                content[0] ^= 0xff;
                data.content = content.into();
            }
            copy.set_data(data).unwrap();
        }
        for child in copy.children() {
            if let Some(data) = child.data() {
                child.set_object(Object::Blob(data.content.clone()));
            }
        }
        assert!(!SegmentedObjectHandler::verify_with_manifest(&copy));
    }

    #[test]
    fn test_segment_past_manifest_fails_verification() {
        let ns = Namespace::new(name("/obj"));
        ns.set_signer(Rc::new(DigestSigner));
        SegmentedObjectHandler::new(small_segments(true))
            .unwrap()
            .set_object(&ns, Bytes::from_static(b"pay alice 10"), true)
            .unwrap();
        assert!(SegmentedObjectHandler::verify_with_manifest(&ns));

        // A requested but unanswered segment past the end is harmless.
        ns.get_child(Component::from_segment(3));
        assert!(SegmentedObjectHandler::verify_with_manifest(&ns));

        let extra = ns.get_child(Component::from_segment(3));
        extra.set_new_data_meta_info(
            MetaInfo::default().with_final_block_id(Component::from_segment(3)),
        );
        extra.serialize_object(Object::from("+ 90")).unwrap();
        assert_eq!(ns.children().len(), 5);
        assert!(!SegmentedObjectHandler::verify_with_manifest(&ns));
    }

    #[test]
    fn test_final_block_id_must_match_manifest_length() {
        let ns = Namespace::new(name("/obj"));
        ns.set_signer(Rc::new(DigestSigner));
        ns.set_new_data_meta_info(
            MetaInfo::default().with_final_block_id(Component::from_segment(5)),
        );
        let segment = ns.get_child(Component::from_segment(0));
        segment.serialize_object(Object::from("only")).unwrap();
        let digest = segment.data().unwrap().full_digest().to_bytes();
        ns.get_child(MANIFEST).set_object(Object::Blob(digest));

        assert!(!SegmentedObjectHandler::verify_with_manifest(&ns));
    }

    #[test]
    fn test_removed_callback_is_skipped() {
        let network = MemoryNetwork::new();
        let produced = producer(&network, "/obj");
        SegmentedObjectHandler::new(small_segments(false))
            .unwrap()
            .set_object(&produced, Bytes::from_static(b"abcdef"), false)
            .unwrap();

        let consumer = Namespace::new(name("/obj"));
        consumer.set_face(network.create_face(), None).unwrap();
        let handler = SegmentedObjectHandler::new(small_segments(false)).unwrap();
        let later = Rc::new(Cell::new(0));
        let calls = Rc::new(Cell::new(0));
        let to_remove = later.clone();
        handler.add_on_segmented_object(move |h, _, _| h.remove_callback(to_remove.get()));
        let counter = calls.clone();
        later.set(handler.add_on_segmented_object(move |_, _, _| counter.set(counter.get() + 1)));
        consumer.set_handler(handler).unwrap();

        consumer.object_needed(false).unwrap();
        network.process_events();

        assert_eq!(consumer.blob_object().unwrap().as_ref(), b"abcdef");
        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn test_fetch_reassembles() {
        let network = MemoryNetwork::new();
        let produced = producer(&network, "/obj");
        let content = Bytes::from_static(b"a segmented object payload");
        SegmentedObjectHandler::new(small_segments(false))
            .unwrap()
            .set_object(&produced, content.clone(), false)
            .unwrap();

        let consumer = Namespace::new(name("/obj"));
        consumer.set_face(network.create_face(), None).unwrap();
        let handler = SegmentedObjectHandler::new(small_segments(false)).unwrap();
        let received = Rc::new(RefCell::new(None));
        let sink = received.clone();
        handler.add_on_segmented_object(move |_, object, _| {
            *sink.borrow_mut() = object.as_blob().cloned();
        });
        consumer.set_handler(handler).unwrap();

        consumer.object_needed(false).unwrap();
        network.process_events();

        assert_eq!(received.borrow().as_ref(), Some(&content));
        assert_eq!(consumer.state(), NamespaceState::ObjectReady);
        assert_eq!(consumer.blob_object(), Some(content));
    }

    #[test]
    fn test_fetch_with_manifest() {
        let network = MemoryNetwork::new();
        let produced = producer(&network, "/obj");
        SegmentedObjectHandler::new(small_segments(true))
            .unwrap()
            .set_object(&produced, Bytes::from_static(b"checked by digest"), true)
            .unwrap();

        let consumer = Namespace::new(name("/obj"));
        consumer.set_face(network.create_face(), None).unwrap();
        let handler = SegmentedObjectHandler::new(small_segments(true)).unwrap();
        consumer.set_handler(handler).unwrap();

        consumer.object_needed(false).unwrap();
        network.process_events();

        assert_eq!(consumer.blob_object().unwrap().as_ref(), b"checked by digest");
        assert_ne!(consumer.validate_state(), ValidateState::ValidateFailure);
        assert!(consumer.find_child(&Component::from(MANIFEST)).unwrap().data().is_some());
    }
}
