//! A single generalized object: a `_meta` content-meta record, with the
//! payload either inline in `_meta` or split into segments of the object's
//! node.

use bytes::Bytes;
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::{Rc, Weak};

use cnl_core::{now_millis, Component, ContentMetaInfo};

use crate::callback::{invoke_guarded, next_callback_id};
use crate::config::GeneralizedObjectConfig;
use crate::error::{NamespaceError, Result};
use crate::handler::{Handler, HandlerBinding, OnDeserialized};
use crate::namespace::Namespace;
use crate::object::Object;
use crate::segmented_object::SegmentedObjectHandler;

/// Child holding the content-meta record.
pub const META: &str = "_meta";

/// `(content meta, object)`
pub type GeneralizedObjectFn = dyn Fn(&ContentMetaInfo, &Object);

pub struct GeneralizedObjectHandler {
    binding: HandlerBinding,
    self_ref: Weak<Self>,
    segmented: Rc<SegmentedObjectHandler>,
    meta_requested: Cell<bool>,
    on_generalized_object: RefCell<BTreeMap<u64, Rc<GeneralizedObjectFn>>>,
}

impl GeneralizedObjectHandler {
    pub fn new(config: GeneralizedObjectConfig) -> Result<Rc<Self>> {
        let segmented = SegmentedObjectHandler::new(config.segmented)?;
        Ok(Rc::new_cyclic(|self_ref| Self {
            binding: HandlerBinding::default(),
            self_ref: self_ref.clone(),
            segmented,
            meta_requested: Cell::new(false),
            on_generalized_object: RefCell::new(BTreeMap::new()),
        }))
    }

    /// Called with the content meta and the object once it is complete:
    /// straight from `_meta` when inline, after reassembly when segmented.
    pub fn add_on_generalized_object(
        &self,
        callback: impl Fn(&ContentMetaInfo, &Object) + 'static,
    ) -> u64 {
        let id = next_callback_id();
        self.on_generalized_object
            .borrow_mut()
            .insert(id, Rc::new(callback));
        id
    }

    /// Segments of a segmented object, in order. Not called for inline
    /// objects.
    pub fn add_on_segment(
        &self,
        callback: impl Fn(&crate::SegmentStreamHandler, Option<&Namespace>, u64) + 'static,
    ) -> u64 {
        self.segmented.stream().add_on_segment(callback)
    }

    pub fn remove_callback(&self, id: u64) {
        self.on_generalized_object.borrow_mut().remove(&id);
        self.segmented.remove_callback(id);
        self.segmented.stream().remove_callback(id);
    }

    pub fn segmented_object_handler(&self) -> &Rc<SegmentedObjectHandler> {
        &self.segmented
    }

    pub fn namespace(&self) -> Option<Namespace> {
        self.binding.namespace()
    }

    fn fire_generalized_object(&self, meta: &ContentMetaInfo, object: &Object) {
        let callbacks: Vec<(u64, Rc<GeneralizedObjectFn>)> = self
            .on_generalized_object
            .borrow()
            .iter()
            .map(|(id, cb)| (*id, Rc::clone(cb)))
            .collect();
        for (id, callback) in callbacks {
            if self.on_generalized_object.borrow().contains_key(&id) {
                invoke_guarded("on_generalized_object", || callback(meta, object));
            }
        }
    }

    fn on_object_needed(&self, needed: &Namespace) -> bool {
        if self.binding.namespace().as_ref() != Some(needed) {
            return false;
        }
        let meta = needed.get_child(META);
        if !self.meta_requested.get() || meta.state().is_failure() {
            self.meta_requested.set(true);
            if let Err(e) = meta.object_needed(false) {
                tracing::warn!(name = %meta.name(), error = %e, "cannot request content meta");
            }
        }
        true
    }

    /// Publish `content` under `namespace`: inline in `_meta` when it fits in
    /// one segment, otherwise as segments with `has_segments` set.
    pub fn set_object(&self, namespace: &Namespace, content: Bytes, content_type: &str) -> Result<()> {
        let mut meta = ContentMetaInfo::new(content_type).with_timestamp(now_millis());
        let inline = content.len() <= self.segmented.max_segment_payload_length();
        if inline {
            meta = meta.with_other(content.clone());
        } else {
            meta = meta.with_has_segments(true);
            self.segmented
                .set_object(namespace, content.clone(), self.segmented.verifies_manifest())?;
        }

        let meta_node = namespace.get_child(META);
        meta_node.serialize_object(Object::ContentMeta(meta))?;
        if meta_node.data().is_none() {
            return Err(NamespaceError::ProductionFailed {
                name: meta_node.name().clone(),
                state: meta_node.state(),
            });
        }

        if inline {
            namespace.set_object(Object::Blob(content));
        }
        Ok(())
    }
}

impl Handler for GeneralizedObjectHandler {
    fn on_namespace_set(self: Rc<Self>, namespace: &Namespace) -> Result<()> {
        self.binding.bind(namespace)?;
        let weak = self.self_ref.clone();
        self.binding.track(namespace.add_on_object_needed(move |_, needed, _| {
            weak.upgrade().is_some_and(|h| h.on_object_needed(needed))
        }));
        Ok(())
    }

    /// Claims the `_meta` child of the bound node.
    fn can_deserialize(
        &self,
        namespace: &Namespace,
        blob: &Bytes,
        on_deserialized: OnDeserialized,
    ) -> bool {
        let Some(object_node) = self.binding.namespace() else {
            return false;
        };
        if namespace.parent().as_ref() != Some(&object_node)
            || namespace.name().last() != Some(&Component::from(META))
        {
            return false;
        }

        let meta = match ContentMetaInfo::wire_decode(blob) {
            Ok(meta) => meta,
            Err(e) => {
                tracing::warn!(name = %namespace.name(), error = %e, "undecodable content meta");
                return false;
            }
        };
        on_deserialized(Object::ContentMeta(meta.clone()));

        if !meta.has_segments {
            let object = Object::Blob(meta.other.clone());
            object_node.set_object(object.clone());
            self.fire_generalized_object(&meta, &object);
            return true;
        }

        let weak = self.self_ref.clone();
        self.segmented.add_on_segmented_object(move |_, object, _| {
            if let Some(h) = weak.upgrade() {
                h.fire_generalized_object(&meta, object);
            }
        });
        if let Err(e) = Rc::clone(&self.segmented).on_namespace_set(&object_node) {
            tracing::warn!(name = %object_node.name(), error = %e, "cannot fetch segments");
            return true;
        }
        if let Err(e) = object_node.object_needed(false) {
            tracing::warn!(name = %object_node.name(), error = %e, "cannot fetch segments");
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cnl_core::{DigestSigner, Name};
    use cnl_face::MemoryNetwork;

    use crate::config::SegmentedObjectConfig;
    use crate::state::NamespaceState;

    fn name(uri: &str) -> Name {
        uri.parse().unwrap()
    }

    fn config(max_segment_payload_length: usize) -> GeneralizedObjectConfig {
        GeneralizedObjectConfig {
            segmented: SegmentedObjectConfig {
                max_segment_payload_length,
                ..SegmentedObjectConfig::default()
            },
        }
    }

    type Received = Rc<RefCell<Option<(String, Bytes)>>>;

    fn fetch(network: &Rc<MemoryNetwork>, uri: &str, max: usize) -> (Namespace, Received) {
        let consumer = Namespace::new(name(uri));
        consumer.set_face(network.create_face(), None).unwrap();
        let handler = GeneralizedObjectHandler::new(config(max)).unwrap();
        let received: Received = Rc::new(RefCell::new(None));
        let sink = received.clone();
        handler.add_on_generalized_object(move |meta, object| {
            *sink.borrow_mut() = Some((meta.content_type.clone(), object.as_blob().cloned().unwrap_or_default()));
        });
        consumer.set_handler(handler).unwrap();
        consumer.object_needed(false).unwrap();
        network.process_events();
        (consumer, received)
    }

    fn publish(network: &Rc<MemoryNetwork>, uri: &str, max: usize, content: &'static [u8]) -> Namespace {
        let producer = Namespace::new(name(uri));
        producer
            .set_face(network.create_face(), Some(Rc::new(|_: &Name| {})))
            .unwrap();
        producer.set_signer(Rc::new(DigestSigner));
        GeneralizedObjectHandler::new(config(max))
            .unwrap()
            .set_object(&producer, Bytes::from_static(content), "text/plain")
            .unwrap();
        producer
    }

    #[test]
    fn test_small_object_is_inline() {
        let network = MemoryNetwork::new();
        let producer = publish(&network, "/doc", 100, b"short");
        assert!(producer.find_child(&Component::from_segment(0)).is_none());
        let meta = producer.find_child(&Component::from(META)).unwrap();
        let decoded = meta.object().unwrap().as_content_meta().cloned().unwrap();
        assert!(!decoded.has_segments);
        assert_eq!(decoded.other.as_ref(), b"short");

        let (consumer, received) = fetch(&network, "/doc", 100);
        assert_eq!(
            *received.borrow(),
            Some(("text/plain".to_string(), Bytes::from_static(b"short")))
        );
        assert_eq!(consumer.state(), NamespaceState::ObjectReady);
    }

    #[test]
    fn test_large_object_is_segmented() {
        let network = MemoryNetwork::new();
        let producer = publish(&network, "/doc", 8, b"a payload longer than one segment");
        let meta = producer.find_child(&Component::from(META)).unwrap();
        assert!(meta.object().unwrap().as_content_meta().unwrap().has_segments);
        assert!(producer.find_child(&Component::from_segment(4)).is_some());

        let (consumer, received) = fetch(&network, "/doc", 8);
        assert_eq!(
            received.borrow().as_ref().map(|(_, b)| b.clone()),
            Some(Bytes::from_static(b"a payload longer than one segment"))
        );
        assert_eq!(
            consumer.blob_object().unwrap().as_ref(),
            b"a payload longer than one segment"
        );
    }

    #[test]
    fn test_meta_requested_once() {
        let network = MemoryNetwork::new();
        let producer = Namespace::new(name("/doc"));
        producer
            .set_face(network.create_face(), Some(Rc::new(|_: &Name| {})))
            .unwrap();

        let consumer = Namespace::new(name("/doc"));
        consumer.set_face(network.create_face(), None).unwrap();
        consumer
            .set_handler(GeneralizedObjectHandler::new(config(100)).unwrap())
            .unwrap();
        consumer.object_needed(false).unwrap();
        consumer.object_needed(false).unwrap();
        assert_eq!(network.interests_sent(), 1);
    }

    #[test]
    fn test_callback_removed_during_delivery_is_skipped() {
        let network = MemoryNetwork::new();
        let _producer = publish(&network, "/doc", 100, b"short");

        let consumer = Namespace::new(name("/doc"));
        consumer.set_face(network.create_face(), None).unwrap();
        let handler = GeneralizedObjectHandler::new(config(100)).unwrap();
        let later = Rc::new(Cell::new(0));
        let calls = Rc::new(Cell::new(0));
        let weak = Rc::downgrade(&handler);
        let to_remove = later.clone();
        handler.add_on_generalized_object(move |_, _| {
            if let Some(h) = weak.upgrade() {
                h.remove_callback(to_remove.get());
            }
        });
        let counter = calls.clone();
        later.set(handler.add_on_generalized_object(move |_, _| counter.set(counter.get() + 1)));
        consumer.set_handler(handler).unwrap();

        consumer.object_needed(false).unwrap();
        network.process_events();

        assert_eq!(consumer.blob_object().unwrap().as_ref(), b"short");
        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn test_undecodable_meta_falls_back_to_blob() {
        let consumer = Namespace::new(name("/doc"));
        let handler = GeneralizedObjectHandler::new(config(100)).unwrap();
        consumer.set_handler(handler).unwrap();

        let meta = consumer.get_child(META);
        meta.deserialize(Bytes::from_static(b"not cbor"), None);
        assert_eq!(meta.blob_object().unwrap().as_ref(), b"not cbor");
        assert!(consumer.object().is_none());
    }
}
