//! A stream of generalized objects named by sequence number.
//!
//! The producer answers interests for `<prefix>/_latest` with a fresh
//! versioned packet whose delegation points at the newest sequence number.
//! The consumer fetches `_latest`, then keeps a pipeline of generalized
//! object fetches running from that sequence number on.

use bytes::Bytes;
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::{Rc, Weak};
use std::time::Duration;

use cnl_core::{now_millis, ChildSelector, Component, ContentMetaInfo, DelegationSet};

use crate::callback::{invoke_guarded, next_callback_id};
use crate::config::{GeneralizedObjectConfig, GeneralizedStreamConfig};
use crate::error::{NamespaceError, Result};
use crate::handler::{Handler, HandlerBinding, OnDeserialized};
use crate::namespace::{Namespace, NeedOptions};
use crate::object::Object;
use crate::state::NamespaceState;

use super::object_handler::{GeneralizedObjectHandler, META};

/// Child answered with a pointer to the newest sequence number.
pub const LATEST: &str = "_latest";

/// `(handler, sequence number, content meta, object)`
pub type SequencedObjectFn = dyn Fn(&GeneralizedObjectStreamHandler, u64, &ContentMetaInfo, &Object);

pub struct GeneralizedObjectStreamHandler {
    binding: HandlerBinding,
    self_ref: Weak<Self>,
    pipeline_size: Cell<usize>,
    latest_packet_freshness: Cell<Duration>,
    object_config: GeneralizedObjectConfig,
    producer: Rc<GeneralizedObjectHandler>,
    produced_sequence_number: Cell<Option<u64>>,
    max_reported_sequence_number: Cell<Option<u64>>,
    last_version: Cell<u64>,
    on_sequenced_object: RefCell<BTreeMap<u64, Rc<SequencedObjectFn>>>,
}

impl GeneralizedObjectStreamHandler {
    pub fn new(config: GeneralizedStreamConfig) -> Result<Rc<Self>> {
        config.validate()?;
        let producer = GeneralizedObjectHandler::new(config.object.clone())?;
        Ok(Rc::new_cyclic(|self_ref| Self {
            binding: HandlerBinding::default(),
            self_ref: self_ref.clone(),
            pipeline_size: Cell::new(config.pipeline_size),
            latest_packet_freshness: Cell::new(config.latest_packet_freshness),
            object_config: config.object,
            producer,
            produced_sequence_number: Cell::new(None),
            max_reported_sequence_number: Cell::new(None),
            last_version: Cell::new(0),
            on_sequenced_object: RefCell::new(BTreeMap::new()),
        }))
    }

    /// Called for each fetched object with its sequence number. Objects can
    /// arrive out of order when the pipeline holds more than one fetch.
    pub fn add_on_sequenced_object(
        &self,
        callback: impl Fn(&GeneralizedObjectStreamHandler, u64, &ContentMetaInfo, &Object) + 'static,
    ) -> u64 {
        let id = next_callback_id();
        self.on_sequenced_object
            .borrow_mut()
            .insert(id, Rc::new(callback));
        id
    }

    pub fn remove_callback(&self, id: u64) {
        self.on_sequenced_object.borrow_mut().remove(&id);
    }

    pub fn namespace(&self) -> Option<Namespace> {
        self.binding.namespace()
    }

    pub fn pipeline_size(&self) -> usize {
        self.pipeline_size.get()
    }

    pub fn set_pipeline_size(&self, size: usize) -> Result<()> {
        if size < 1 {
            return Err(NamespaceError::InvalidConfig(
                "pipeline size must be at least 1".into(),
            ));
        }
        self.pipeline_size.set(size);
        Ok(())
    }

    pub fn latest_packet_freshness(&self) -> Duration {
        self.latest_packet_freshness.get()
    }

    pub fn set_latest_packet_freshness(&self, freshness: Duration) {
        self.latest_packet_freshness.set(freshness);
    }

    /// Newest sequence number published with [`set_object`](Self::set_object).
    pub fn produced_sequence_number(&self) -> Option<u64> {
        self.produced_sequence_number.get()
    }

    pub fn max_reported_sequence_number(&self) -> Option<u64> {
        self.max_reported_sequence_number.get()
    }

    /// Publish `content` as sequence number `sequence_number`. Later
    /// `_latest` interests point at it.
    pub fn set_object(&self, sequence_number: u64, content: Bytes, content_type: &str) -> Result<()> {
        let namespace = self.binding.require_namespace()?;
        let node = namespace.get_child(Component::from_sequence_number(sequence_number));
        self.producer.set_object(&node, content, content_type)?;
        self.produced_sequence_number.set(Some(sequence_number));
        tracing::debug!(name = %node.name(), "published sequenced object");
        Ok(())
    }

    /// Publish `content` as the next sequence number and return it.
    pub fn add_object(&self, content: Bytes, content_type: &str) -> Result<u64> {
        let next = self.produced_sequence_number.get().map_or(0, |n| n + 1);
        self.set_object(next, content, content_type)?;
        Ok(next)
    }

    fn latest(&self) -> Option<Namespace> {
        self.binding
            .namespace()
            .and_then(|ns| ns.find_child(&Component::from(LATEST)))
    }

    fn is_versioned_latest(&self, node: &Namespace) -> bool {
        node.name().last().is_some_and(Component::is_version)
            && node.parent().is_some_and(|p| Some(p) == self.latest())
    }

    fn on_object_needed(&self, needed: &Namespace) -> bool {
        let Some(namespace) = self.binding.namespace() else {
            return false;
        };
        if *needed == namespace {
            let latest = namespace.get_child(LATEST);
            let options = NeedOptions {
                must_be_fresh: true,
                can_be_prefix: true,
                child_selector: Some(ChildSelector::Rightmost),
            };
            if let Err(e) = latest.object_needed_with(options) {
                tracing::warn!(name = %latest.name(), error = %e, "cannot request latest");
            }
            return true;
        }
        if Some(needed) == self.latest().as_ref() {
            return self.publish_latest(&namespace, needed);
        }
        false
    }

    /// Answer `_latest` with a new version pointing at the newest sequence
    /// number. Nothing to answer before the first object is published.
    fn publish_latest(&self, namespace: &Namespace, latest: &Namespace) -> bool {
        let Some(sequence_number) = self.produced_sequence_number.get() else {
            return false;
        };
        let version = now_millis().max(self.last_version.get() + 1);
        self.last_version.set(version);

        let node = latest.get_child(Component::from_version(version));
        node.set_new_data_meta_info(
            latest
                .new_data_meta_info()
                .with_freshness_period(self.latest_packet_freshness.get()),
        );
        let mut delegations = DelegationSet::new();
        delegations.add(
            1,
            namespace
                .name()
                .clone()
                .append(Component::from_sequence_number(sequence_number)),
        );
        if let Err(e) = node.serialize_object(Object::Delegations(delegations)) {
            tracing::warn!(name = %node.name(), error = %e, "cannot publish latest");
            return false;
        }
        node.data().is_some()
    }

    fn on_state_changed(&self, changed: &Namespace, state: NamespaceState) {
        if state != NamespaceState::ObjectReady || !self.is_versioned_latest(changed) {
            return;
        }
        let Some(namespace) = self.binding.namespace() else {
            return;
        };
        let Some(target) = changed
            .object()
            .as_ref()
            .and_then(Object::as_delegations)
            .and_then(|d| d.get(0))
            .map(|d| d.name.clone())
        else {
            return;
        };

        let is_sequence_child = target.len() == namespace.name().len() + 1
            && namespace.name().is_prefix_of(&target)
            && target.last().is_some_and(Component::is_sequence_number);
        let Some(sequence_number) = target
            .last()
            .filter(|_| is_sequence_child)
            .and_then(|c| c.to_sequence_number().ok())
        else {
            tracing::warn!(latest = %changed.name(), target = %target, "latest delegation is not a sequence number of this stream");
            return;
        };

        let target_node = namespace.get_child(Component::from_sequence_number(sequence_number));
        if target_node.object().is_none() {
            self.max_reported_sequence_number
                .set(sequence_number.checked_sub(1));
            self.request_new_sequence_numbers();
        }
    }

    fn on_sequenced_object(&self, sequence_number: u64, meta: &ContentMetaInfo, object: &Object) {
        let callbacks: Vec<(u64, Rc<SequencedObjectFn>)> = self
            .on_sequenced_object
            .borrow()
            .iter()
            .map(|(id, cb)| (*id, Rc::clone(cb)))
            .collect();
        for (id, callback) in callbacks {
            if self.on_sequenced_object.borrow().contains_key(&id) {
                invoke_guarded("on_sequenced_object", || {
                    callback(self, sequence_number, meta, object)
                });
            }
        }
        if self
            .max_reported_sequence_number
            .get()
            .map_or(true, |max| sequence_number > max)
        {
            self.max_reported_sequence_number.set(Some(sequence_number));
        }
        self.request_new_sequence_numbers();
    }

    /// Start generalized object fetches until `pipeline_size` are in flight.
    fn request_new_sequence_numbers(&self) {
        let Some(namespace) = self.binding.namespace() else {
            return;
        };
        let meta = Component::from(META);
        let outstanding = namespace
            .children()
            .iter()
            .filter(|c| c.name().last().is_some_and(Component::is_sequence_number))
            .filter_map(|c| c.find_child(&meta))
            .filter(|m| {
                m.data().is_none()
                    && m.state() >= NamespaceState::InterestExpressed
                    && !m.state().is_failure()
            })
            .count();
        let mut free_slots = self.pipeline_size.get().saturating_sub(outstanding);

        let mut sequence_number = self.max_reported_sequence_number.get().map_or(0, |n| n + 1);
        while free_slots > 0 {
            let node = namespace.get_child(Component::from_sequence_number(sequence_number));
            let current = sequence_number;
            sequence_number += 1;

            let meta_node = node.get_child(META);
            if meta_node.data().is_some() || meta_node.state() >= NamespaceState::InterestExpressed {
                continue;
            }
            free_slots -= 1;

            let handler = match GeneralizedObjectHandler::new(self.object_config.clone()) {
                Ok(handler) => handler,
                Err(e) => {
                    tracing::warn!(error = %e, "cannot create object handler");
                    return;
                }
            };
            let weak = self.self_ref.clone();
            handler.add_on_generalized_object(move |meta, object| {
                if let Some(stream) = weak.upgrade() {
                    stream.on_sequenced_object(current, meta, object);
                }
            });
            if let Err(e) = node.set_handler(handler) {
                tracing::warn!(name = %node.name(), error = %e, "cannot attach object handler");
                continue;
            }
            if let Err(e) = node.object_needed(false) {
                tracing::warn!(name = %node.name(), error = %e, "cannot request sequenced object");
            }
        }
    }
}

impl Handler for GeneralizedObjectStreamHandler {
    fn on_namespace_set(self: Rc<Self>, namespace: &Namespace) -> Result<()> {
        self.binding.bind(namespace)?;
        namespace.get_child(LATEST);

        let weak = self.self_ref.clone();
        self.binding.track(namespace.add_on_object_needed(move |_, needed, _| {
            weak.upgrade().is_some_and(|h| h.on_object_needed(needed))
        }));
        let weak = self.self_ref.clone();
        self.binding.track(namespace.add_on_state_changed(move |_, changed, state, _| {
            if let Some(h) = weak.upgrade() {
                h.on_state_changed(changed, state);
            }
        }));
        Ok(())
    }

    /// Claims versioned children of `_latest` as delegation sets.
    fn can_deserialize(
        &self,
        namespace: &Namespace,
        blob: &Bytes,
        on_deserialized: OnDeserialized,
    ) -> bool {
        if !self.is_versioned_latest(namespace) {
            return false;
        }
        match DelegationSet::wire_decode(blob) {
            Ok(delegations) => {
                on_deserialized(Object::Delegations(delegations));
                true
            }
            Err(e) => {
                tracing::warn!(name = %namespace.name(), error = %e, "undecodable latest packet");
                false
            }
        }
    }
}
