//! Fetching a stream of segments in order.
//!
//! Attached to a node `N`, the handler fetches `N/seg=0`, `N/seg=1`, ...
//! keeping up to `interest_pipeline_size` interests outstanding, and reports
//! segments strictly in order. The final segment number is learned from the
//! `final_block_id` of any received segment; if the first segment does not
//! carry it, one rightmost probe is sent to find the last segment early.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::{Rc, Weak};

use cnl_core::{ChildSelector, Component, Data, Interest};
use cnl_face::{NetworkNack, OnData, OnNack, OnTimeout};

use crate::callback::{invoke_guarded, next_callback_id};
use crate::config::SegmentStreamConfig;
use crate::error::{NamespaceError, Result};
use crate::handler::{Handler, HandlerBinding};
use crate::namespace::Namespace;
use crate::state::NamespaceState;

/// `(handler, segment node or None at end of stream, callback id)`
pub type SegmentFn = dyn Fn(&SegmentStreamHandler, Option<&Namespace>, u64);

pub struct SegmentStreamHandler {
    binding: HandlerBinding,
    self_ref: Weak<Self>,
    interest_pipeline_size: Cell<usize>,
    initial_interest_count: Cell<usize>,
    max_reported: Cell<Option<u64>>,
    final_segment: Cell<Option<u64>>,
    probe_sent: Cell<bool>,
    finished: Cell<bool>,
    on_segment: RefCell<BTreeMap<u64, Rc<SegmentFn>>>,
}

impl SegmentStreamHandler {
    pub fn new(config: SegmentStreamConfig) -> Result<Rc<Self>> {
        config.validate()?;
        Ok(Rc::new_cyclic(|self_ref| Self {
            binding: HandlerBinding::default(),
            self_ref: self_ref.clone(),
            interest_pipeline_size: Cell::new(config.interest_pipeline_size),
            initial_interest_count: Cell::new(config.initial_interest_count),
            max_reported: Cell::new(None),
            final_segment: Cell::new(None),
            probe_sent: Cell::new(false),
            finished: Cell::new(false),
            on_segment: RefCell::new(BTreeMap::new()),
        }))
    }

    /// Called with each segment in order, then once with `None`.
    pub fn add_on_segment(
        &self,
        callback: impl Fn(&SegmentStreamHandler, Option<&Namespace>, u64) + 'static,
    ) -> u64 {
        let id = next_callback_id();
        self.on_segment.borrow_mut().insert(id, Rc::new(callback));
        id
    }

    pub fn remove_callback(&self, id: u64) {
        self.on_segment.borrow_mut().remove(&id);
    }

    pub fn namespace(&self) -> Option<Namespace> {
        self.binding.namespace()
    }

    pub fn interest_pipeline_size(&self) -> usize {
        self.interest_pipeline_size.get()
    }

    pub fn set_interest_pipeline_size(&self, size: usize) -> Result<()> {
        if size < 1 {
            return Err(NamespaceError::InvalidConfig(
                "interest pipeline size must be at least 1".into(),
            ));
        }
        self.interest_pipeline_size.set(size);
        Ok(())
    }

    pub fn initial_interest_count(&self) -> usize {
        self.initial_interest_count.get()
    }

    pub fn set_initial_interest_count(&self, count: usize) -> Result<()> {
        if count < 1 {
            return Err(NamespaceError::InvalidConfig(
                "initial interest count must be at least 1".into(),
            ));
        }
        self.initial_interest_count.set(count);
        Ok(())
    }

    /// Highest segment number reported so far.
    pub fn max_reported_segment(&self) -> Option<u64> {
        self.max_reported.get()
    }

    /// Final segment number, once known.
    pub fn final_segment(&self) -> Option<u64> {
        self.final_segment.get()
    }

    pub fn is_finished(&self) -> bool {
        self.finished.get()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Listeners
    // ─────────────────────────────────────────────────────────────────────────

    fn on_object_needed(&self, needed: &Namespace) -> bool {
        let Some(root) = self.binding.namespace() else {
            return false;
        };
        if *needed != root {
            return false;
        }
        self.request_new_segments(&root, self.initial_interest_count.get());
        true
    }

    fn on_state_changed(&self, changed: &Namespace, state: NamespaceState) {
        if state != NamespaceState::ObjectReady || self.finished.get() {
            return;
        }
        let Some(root) = self.binding.namespace() else {
            return;
        };
        if changed.parent().as_ref() != Some(&root)
            || !changed.name().last().is_some_and(Component::is_segment)
        {
            return;
        }

        if let Some(data) = changed.data() {
            if let Some(final_block_id) = &data.meta_info.final_block_id {
                match final_block_id.to_segment() {
                    Ok(n) => self.final_segment.set(Some(n)),
                    Err(e) => tracing::warn!(name = %data.name, error = %e, "bad final block id"),
                }
            }
        }

        loop {
            let next = self.max_reported.get().map_or(0, |m| m + 1);
            let Some(segment) = root.find_child(&Component::from_segment(next)) else {
                break;
            };
            if segment.object().is_none() {
                break;
            }
            self.max_reported.set(Some(next));
            self.fire_segment(Some(&segment));

            if self.final_segment.get() == Some(next) {
                self.finish();
                return;
            }
        }

        if self.final_segment.get().is_none() && !self.probe_sent.get() {
            self.probe_sent.set(true);
            self.send_rightmost_probe(&root);
        }

        self.request_new_segments(&root, self.interest_pipeline_size.get());
    }

    fn fire_segment(&self, segment: Option<&Namespace>) {
        let callbacks: Vec<(u64, Rc<SegmentFn>)> = self
            .on_segment
            .borrow()
            .iter()
            .map(|(id, cb)| (*id, Rc::clone(cb)))
            .collect();
        for (id, callback) in callbacks {
            if self.on_segment.borrow().contains_key(&id) {
                invoke_guarded("on_segment", || callback(self, segment, id));
            }
        }
    }

    fn finish(&self) {
        self.finished.set(true);
        tracing::debug!(final_segment = ?self.final_segment.get(), "segment stream finished");
        self.fire_segment(None);
        self.binding.release();
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Requests
    // ─────────────────────────────────────────────────────────────────────────

    /// Fill the pipeline: request segments after the last reported one until
    /// `max_requested` are outstanding or the final segment is reached.
    fn request_new_segments(&self, root: &Namespace, max_requested: usize) {
        let mut outstanding = root
            .children()
            .iter()
            .filter(|child| {
                child.name().last().is_some_and(Component::is_segment)
                    && child.data().is_none()
                    && child.state() >= NamespaceState::InterestExpressed
            })
            .count();

        let mut segment = self.max_reported.get().map_or(0, |m| m + 1);
        while outstanding < max_requested {
            if self.final_segment.get().is_some_and(|last| segment > last) {
                break;
            }
            let child = root.get_child(Component::from_segment(segment));
            segment += 1;
            if child.data().is_some() || child.state() >= NamespaceState::InterestExpressed {
                continue;
            }

            outstanding += 1;
            if let Err(e) = child.object_needed(false) {
                tracing::warn!(name = %child.name(), error = %e, "cannot request segment");
                break;
            }
        }
    }

    /// One interest for the rightmost segment under `root`. Its answer is
    /// handled like any other segment; a timeout or nack is only logged.
    fn send_rightmost_probe(&self, root: &Namespace) {
        let Some(face) = root.face() else { return };
        let interest = Interest::new(root.name().clone())
            .with_child_selector(ChildSelector::Rightmost)
            .with_must_be_fresh(true)
            .with_lifetime(root.interest_lifetime());

        let weak = root.downgrade();
        let on_data: OnData = Rc::new(move |_: &Interest, data: &Data| {
            if let Some(root) = weak.upgrade() {
                root.receive_descendant_data(data);
            }
        });
        let on_timeout: OnTimeout = Rc::new(|interest: &Interest| {
            tracing::debug!(name = %interest.name, "rightmost probe timed out");
        });
        let on_nack: OnNack = Rc::new(|interest: &Interest, nack: &NetworkNack| {
            tracing::debug!(name = %interest.name, reason = ?nack.reason, "rightmost probe nacked");
        });

        tracing::debug!(name = %root.name(), "sending rightmost probe");
        if let Err(e) = face.express_interest(&interest, on_data, on_timeout, on_nack) {
            tracing::warn!(name = %root.name(), error = %e, "rightmost probe failed");
        }
    }
}

impl Handler for SegmentStreamHandler {
    fn on_namespace_set(self: Rc<Self>, namespace: &Namespace) -> Result<()> {
        self.binding.bind(namespace)?;

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
}
