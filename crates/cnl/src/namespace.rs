//! The namespace tree.
//!
//! Every node represents one [`Name`] and carries the fetch/production state
//! of the packet and object at that name. Children are owned by their parent
//! and kept in canonical component order. Nodes refer upward through weak
//! pointers, so a tree lives as long as its root handle.
//!
//! Listeners registered on a node observe changes anywhere in its subtree:
//! a change is delivered to the node's own listeners first, then to each
//! ancestor's in turn, in registration order at each level.
//!
//! Configuration (face, signer, validator, decryptor, encryptor, default
//! [`MetaInfo`], interest lifetimes) is looked up on the node and then on its
//! ancestors; the nearest setting wins.

use bytes::Bytes;
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::fmt;
use std::rc::{Rc, Weak};
use std::time::{Duration, Instant};

use cnl_core::{
    ChildSelector, Component, Data, Decryptor, Encryptor, Interest, MetaInfo, Name, Signer,
    Validator,
};
use cnl_face::{
    express_with_backoff, Face, NetworkNack, OnData, OnInterest, OnNack, OnRegisterFailed,
    OnTimeout, ReplyChannel,
};

use crate::callback::{invoke_guarded, next_callback_id};
use crate::config::NamespaceConfig;
use crate::error::{NamespaceError, Result};
use crate::handler::{Handler, OnDeserialized};
use crate::object::Object;
use crate::pending_table::PendingIncomingInterestTable;
use crate::state::{NamespaceState, ValidateState};

/// `(listening node, added node, callback id)`
pub type NameAddedFn = dyn Fn(&Namespace, &Namespace, u64);
/// `(listening node, changed node, new state, callback id)`
pub type StateChangedFn = dyn Fn(&Namespace, &Namespace, NamespaceState, u64);
/// `(listening node, changed node, new validate state, callback id)`
pub type ValidateStateChangedFn = dyn Fn(&Namespace, &Namespace, ValidateState, u64);
/// `(listening node, needed node, callback id)`. Return true to take
/// responsibility for producing the object.
pub type ObjectNeededFn = dyn Fn(&Namespace, &Namespace, u64) -> bool;

/// Called with the deserialized object once a node reaches `ObjectReady`.
pub type OnObject = Rc<dyn Fn(&Object)>;

/// Options for [`Namespace::object_needed_with`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NeedOptions {
    pub must_be_fresh: bool,
    /// Accept data for any name under the node, not just the node itself.
    pub can_be_prefix: bool,
    pub child_selector: Option<ChildSelector>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Listener registry
// ─────────────────────────────────────────────────────────────────────────────

struct Listeners<C: ?Sized> {
    map: RefCell<BTreeMap<u64, Rc<C>>>,
}

impl<C: ?Sized> Default for Listeners<C> {
    fn default() -> Self {
        Self {
            map: RefCell::new(BTreeMap::new()),
        }
    }
}

impl<C: ?Sized> Listeners<C> {
    fn add(&self, callback: Rc<C>) -> u64 {
        let id = next_callback_id();
        self.map.borrow_mut().insert(id, callback);
        id
    }

    fn remove(&self, id: u64) -> bool {
        self.map.borrow_mut().remove(&id).is_some()
    }

    fn contains(&self, id: u64) -> bool {
        self.map.borrow().contains_key(&id)
    }

    /// Ids are allocated in increasing order, so this is registration order.
    fn snapshot(&self) -> Vec<(u64, Rc<C>)> {
        self.map
            .borrow()
            .iter()
            .map(|(id, cb)| (*id, Rc::clone(cb)))
            .collect()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Node
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Default)]
struct Settings {
    face: Option<Rc<dyn Face>>,
    signer: Option<Rc<dyn Signer>>,
    validator: Option<Rc<dyn Validator>>,
    decryptor: Option<Rc<dyn Decryptor>>,
    encryptor: Option<Rc<dyn Encryptor>>,
    new_data_meta_info: Option<MetaInfo>,
    interest_lifetime: Option<Duration>,
    max_interest_lifetime: Option<Duration>,
}

#[derive(Default)]
struct Errors {
    network_nack: Option<NetworkNack>,
    decryption: Option<String>,
    encryption: Option<String>,
    signing: Option<String>,
    validation: Option<String>,
}

struct Node {
    name: Name,
    parent: Option<Weak<Node>>,
    children: RefCell<BTreeMap<Component, Namespace>>,

    state: Cell<NamespaceState>,
    validate_state: Cell<ValidateState>,
    data: RefCell<Option<Rc<Data>>>,
    object: RefCell<Option<Object>>,
    fresh_until: Cell<Option<Instant>>,
    errors: RefCell<Errors>,

    settings: RefCell<Settings>,
    handler: RefCell<Option<Rc<dyn Handler>>>,
    pending_interests: RefCell<Option<Rc<PendingIncomingInterestTable>>>,

    on_name_added: Listeners<NameAddedFn>,
    on_state_changed: Listeners<StateChangedFn>,
    on_validate_state_changed: Listeners<ValidateStateChangedFn>,
    on_object_needed: Listeners<ObjectNeededFn>,
}

impl Node {
    fn new(name: Name, parent: Option<Weak<Node>>) -> Self {
        Self {
            name,
            parent,
            children: RefCell::new(BTreeMap::new()),
            state: Cell::new(NamespaceState::NameExists),
            validate_state: Cell::new(ValidateState::WaitingForData),
            data: RefCell::new(None),
            object: RefCell::new(None),
            fresh_until: Cell::new(None),
            errors: RefCell::new(Errors::default()),
            settings: RefCell::new(Settings::default()),
            handler: RefCell::new(None),
            pending_interests: RefCell::new(None),
            on_name_added: Listeners::default(),
            on_state_changed: Listeners::default(),
            on_validate_state_changed: Listeners::default(),
            on_object_needed: Listeners::default(),
        }
    }
}

/// A handle to one node of a namespace tree. Cloning is cheap and yields a
/// handle to the same node; equality is node identity.
#[derive(Clone)]
pub struct Namespace(Rc<Node>);

/// A non-owning handle, for callbacks that must not keep a tree alive.
#[derive(Clone)]
pub struct WeakNamespace(Weak<Node>);

impl WeakNamespace {
    pub fn upgrade(&self) -> Option<Namespace> {
        self.0.upgrade().map(Namespace)
    }
}

impl PartialEq for Namespace {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Namespace {}

impl fmt::Debug for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Namespace")
            .field("name", &self.0.name)
            .field("state", &self.0.state.get())
            .finish()
    }
}

impl Namespace {
    /// Create the root of a new tree.
    pub fn new(name: Name) -> Self {
        Namespace(Rc::new(Node::new(name, None)))
    }

    /// Create a root with explicit interest timing.
    pub fn with_config(name: Name, config: NamespaceConfig) -> Self {
        let root = Self::new(name);
        {
            let mut settings = root.0.settings.borrow_mut();
            settings.interest_lifetime = Some(config.interest_lifetime);
            settings.max_interest_lifetime = Some(config.max_interest_lifetime);
        }
        root
    }

    pub fn downgrade(&self) -> WeakNamespace {
        WeakNamespace(Rc::downgrade(&self.0))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Tree
    // ─────────────────────────────────────────────────────────────────────────

    pub fn name(&self) -> &Name {
        &self.0.name
    }

    pub fn parent(&self) -> Option<Namespace> {
        self.0.parent.as_ref().and_then(Weak::upgrade).map(Namespace)
    }

    pub fn root(&self) -> Namespace {
        let mut node = self.clone();
        while let Some(parent) = node.parent() {
            node = parent;
        }
        node
    }

    /// This node, then its parent, up to the root.
    pub fn self_and_ancestors(&self) -> impl Iterator<Item = Namespace> {
        std::iter::successors(Some(self.clone()), Namespace::parent)
    }

    /// Return the child for `component`, creating it if needed. A created
    /// child moves to `NameExists` and name-added listeners fire.
    pub fn get_child(&self, component: impl Into<Component>) -> Namespace {
        let (child, created) = self.child_or_create(component.into());
        if created {
            child.announce();
        }
        child
    }

    /// Resolve `name` under this node, creating missing nodes. Intermediate
    /// nodes are created silently; only a newly created leaf is announced.
    pub fn get_descendant(&self, name: &Name) -> Result<Namespace> {
        if !self.0.name.is_prefix_of(name) {
            return Err(NamespaceError::NotDescendant {
                name: name.clone(),
                prefix: self.0.name.clone(),
            });
        }

        let mut node = self.clone();
        let mut created_leaf = false;
        for component in &name.components()[self.0.name.len()..] {
            let (child, created) = node.child_or_create(component.clone());
            created_leaf = created;
            node = child;
        }
        if created_leaf {
            node.announce();
        }
        Ok(node)
    }

    pub fn find_child(&self, component: &Component) -> Option<Namespace> {
        self.0.children.borrow().get(component).cloned()
    }

    pub fn has_child(&self, component: &Component) -> bool {
        self.0.children.borrow().contains_key(component)
    }

    /// Whether `name` already exists at or under this node.
    pub fn has_descendant(&self, name: &Name) -> bool {
        if !self.0.name.is_prefix_of(name) {
            return false;
        }
        let mut node = self.clone();
        for component in &name.components()[self.0.name.len()..] {
            match node.find_child(component) {
                Some(child) => node = child,
                None => return false,
            }
        }
        true
    }

    /// Child components in canonical order.
    pub fn child_components(&self) -> Vec<Component> {
        self.0.children.borrow().keys().cloned().collect()
    }

    /// Children in canonical order.
    pub fn children(&self) -> Vec<Namespace> {
        self.0.children.borrow().values().cloned().collect()
    }

    fn child_or_create(&self, component: Component) -> (Namespace, bool) {
        if let Some(child) = self.find_child(&component) {
            return (child, false);
        }
        let name = self.0.name.clone().append(component.clone());
        let child = Namespace(Rc::new(Node::new(name, Some(Rc::downgrade(&self.0)))));
        self.0
            .children
            .borrow_mut()
            .insert(component, child.clone());
        (child, true)
    }

    fn announce(&self) {
        self.set_state(NamespaceState::NameExists);
        self.notify(
            "on_name_added",
            |n| &n.on_name_added,
            |listener, cb: &NameAddedFn, id| cb(listener, self, id),
        );
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Accessors
    // ─────────────────────────────────────────────────────────────────────────

    pub fn state(&self) -> NamespaceState {
        self.0.state.get()
    }

    pub fn validate_state(&self) -> ValidateState {
        self.0.validate_state.get()
    }

    pub fn data(&self) -> Option<Rc<Data>> {
        self.0.data.borrow().clone()
    }

    pub fn object(&self) -> Option<Object> {
        self.0.object.borrow().clone()
    }

    /// The object's bytes, if the object is a blob.
    pub fn blob_object(&self) -> Option<Bytes> {
        self.0.object.borrow().as_ref().and_then(|o| o.as_blob().cloned())
    }

    pub fn network_nack(&self) -> Option<NetworkNack> {
        self.0.errors.borrow().network_nack.clone()
    }

    pub fn decryption_error(&self) -> Option<String> {
        self.0.errors.borrow().decryption.clone()
    }

    pub fn encryption_error(&self) -> Option<String> {
        self.0.errors.borrow().encryption.clone()
    }

    pub fn signing_error(&self) -> Option<String> {
        self.0.errors.borrow().signing.clone()
    }

    pub fn validation_error(&self) -> Option<String> {
        self.0.errors.borrow().validation.clone()
    }

    /// Whether the attached data is still within its freshness period.
    /// Data without a freshness period never goes stale.
    pub fn is_fresh(&self) -> bool {
        self.is_fresh_at(self.now())
    }

    fn is_fresh_at(&self, now: Instant) -> bool {
        self.0.fresh_until.get().map_or(true, |until| now < until)
    }

    /// The face clock, or the system clock when no face is set.
    pub fn now(&self) -> Instant {
        self.face().map_or_else(Instant::now, |face| face.now())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Inherited settings
    // ─────────────────────────────────────────────────────────────────────────

    fn inherited<T>(&self, get: impl Fn(&Settings) -> Option<T>) -> Option<T> {
        self.self_and_ancestors()
            .find_map(|ns| get(&ns.0.settings.borrow()))
    }

    pub fn face(&self) -> Option<Rc<dyn Face>> {
        self.inherited(|s| s.face.clone())
    }

    pub fn signer(&self) -> Option<Rc<dyn Signer>> {
        self.inherited(|s| s.signer.clone())
    }

    pub fn validator(&self) -> Option<Rc<dyn Validator>> {
        self.inherited(|s| s.validator.clone())
    }

    pub fn decryptor(&self) -> Option<Rc<dyn Decryptor>> {
        self.inherited(|s| s.decryptor.clone())
    }

    pub fn encryptor(&self) -> Option<Rc<dyn Encryptor>> {
        self.inherited(|s| s.encryptor.clone())
    }

    /// Meta info applied to packets produced at this node.
    pub fn new_data_meta_info(&self) -> MetaInfo {
        self.inherited(|s| s.new_data_meta_info.clone())
            .unwrap_or_default()
    }

    pub fn interest_lifetime(&self) -> Duration {
        self.inherited(|s| s.interest_lifetime)
            .unwrap_or_else(|| NamespaceConfig::default().interest_lifetime)
    }

    pub fn max_interest_lifetime(&self) -> Duration {
        self.inherited(|s| s.max_interest_lifetime)
            .unwrap_or_else(|| NamespaceConfig::default().max_interest_lifetime)
    }

    pub fn set_signer(&self, signer: Rc<dyn Signer>) {
        self.0.settings.borrow_mut().signer = Some(signer);
    }

    pub fn set_validator(&self, validator: Rc<dyn Validator>) {
        self.0.settings.borrow_mut().validator = Some(validator);
    }

    pub fn set_decryptor(&self, decryptor: Rc<dyn Decryptor>) {
        self.0.settings.borrow_mut().decryptor = Some(decryptor);
    }

    pub fn set_encryptor(&self, encryptor: Rc<dyn Encryptor>) {
        self.0.settings.borrow_mut().encryptor = Some(encryptor);
    }

    pub fn set_new_data_meta_info(&self, meta_info: MetaInfo) {
        self.0.settings.borrow_mut().new_data_meta_info = Some(meta_info);
    }

    pub fn set_interest_lifetime(&self, lifetime: Duration) {
        self.0.settings.borrow_mut().interest_lifetime = Some(lifetime);
    }

    pub fn set_max_interest_lifetime(&self, lifetime: Duration) {
        self.0.settings.borrow_mut().max_interest_lifetime = Some(lifetime);
    }

    /// Set the face used by this subtree. With `on_register_failed`, also
    /// register this node's name so incoming interests are answered from
    /// the tree.
    pub fn set_face(
        &self,
        face: Rc<dyn Face>,
        on_register_failed: Option<OnRegisterFailed>,
    ) -> Result<()> {
        self.0.settings.borrow_mut().face = Some(Rc::clone(&face));
        let Some(on_register_failed) = on_register_failed else {
            return Ok(());
        };

        *self.0.pending_interests.borrow_mut() = Some(Rc::new(PendingIncomingInterestTable::new()));
        let weak = self.downgrade();
        let on_interest: OnInterest = Rc::new(
            move |_prefix: &Name, interest: &Interest, reply: Rc<dyn ReplyChannel>, _id: u64| {
                if let Some(ns) = weak.upgrade() {
                    ns.on_incoming_interest(interest, reply);
                }
            },
        );
        face.register_prefix(&self.0.name, on_interest, on_register_failed, None)?;
        tracing::debug!(prefix = %self.0.name, "registered prefix");
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Callbacks
    // ─────────────────────────────────────────────────────────────────────────

    pub fn add_on_name_added(
        &self,
        callback: impl Fn(&Namespace, &Namespace, u64) + 'static,
    ) -> u64 {
        self.0.on_name_added.add(Rc::new(callback))
    }

    pub fn add_on_state_changed(
        &self,
        callback: impl Fn(&Namespace, &Namespace, NamespaceState, u64) + 'static,
    ) -> u64 {
        self.0.on_state_changed.add(Rc::new(callback))
    }

    pub fn add_on_validate_state_changed(
        &self,
        callback: impl Fn(&Namespace, &Namespace, ValidateState, u64) + 'static,
    ) -> u64 {
        self.0.on_validate_state_changed.add(Rc::new(callback))
    }

    pub fn add_on_object_needed(
        &self,
        callback: impl Fn(&Namespace, &Namespace, u64) -> bool + 'static,
    ) -> u64 {
        self.0.on_object_needed.add(Rc::new(callback))
    }

    /// Remove a callback of any kind registered on this node. Unknown ids
    /// are ignored.
    pub fn remove_callback(&self, id: u64) {
        let node = &self.0;
        let _ = node.on_name_added.remove(id)
            || node.on_state_changed.remove(id)
            || node.on_validate_state_changed.remove(id)
            || node.on_object_needed.remove(id);
    }

    /// Deliver to listeners on this node and then on each ancestor. Each
    /// level is snapshotted first; a listener removed during the fan-out is
    /// skipped.
    fn notify<C: ?Sized>(
        &self,
        label: &'static str,
        select: fn(&Node) -> &Listeners<C>,
        call: impl Fn(&Namespace, &C, u64),
    ) {
        for ns in self.self_and_ancestors() {
            let listeners = select(&ns.0);
            for (id, callback) in listeners.snapshot() {
                if listeners.contains(id) {
                    invoke_guarded(label, || call(&ns, &*callback, id));
                }
            }
        }
    }

    pub(crate) fn set_state(&self, state: NamespaceState) {
        self.0.state.set(state);
        tracing::debug!(name = %self.0.name, ?state, "state changed");
        self.notify(
            "on_state_changed",
            |n| &n.on_state_changed,
            |listener, cb: &StateChangedFn, id| cb(listener, self, state, id),
        );
    }

    pub(crate) fn set_validate_state(&self, state: ValidateState) {
        self.0.validate_state.set(state);
        tracing::debug!(name = %self.0.name, ?state, "validate state changed");
        self.notify(
            "on_validate_state_changed",
            |n| &n.on_validate_state_changed,
            |listener, cb: &ValidateStateChangedFn, id| cb(listener, self, state, id),
        );
    }

    /// Ask object-needed listeners here and upward. Every listener is asked.
    fn ask_producers(&self) -> bool {
        let claimed = Cell::new(false);
        self.notify(
            "on_object_needed",
            |n| &n.on_object_needed,
            |listener, cb: &ObjectNeededFn, id| {
                if cb(listener, self, id) {
                    claimed.set(true);
                }
            },
        );
        claimed.get()
    }

    pub(crate) fn fail_validation(&self, message: String) {
        tracing::warn!(name = %self.0.name, error = %message, "validation failed");
        self.0.errors.borrow_mut().validation = Some(message);
        self.set_validate_state(ValidateState::ValidateFailure);
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Handler
    // ─────────────────────────────────────────────────────────────────────────

    /// Attach `handler` to this node. A node holds at most one handler.
    pub fn set_handler(&self, handler: Rc<dyn Handler>) -> Result<()> {
        if self.0.handler.borrow().is_some() {
            return Err(NamespaceError::HandlerAlreadySet(self.0.name.clone()));
        }
        *self.0.handler.borrow_mut() = Some(Rc::clone(&handler));
        if let Err(e) = handler.on_namespace_set(self) {
            *self.0.handler.borrow_mut() = None;
            return Err(e);
        }
        Ok(())
    }

    pub fn handler(&self) -> Option<Rc<dyn Handler>> {
        self.0.handler.borrow().clone()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Data and objects
    // ─────────────────────────────────────────────────────────────────────────

    /// Attach `data` to the node named by `data.name` under this node.
    /// Returns `false` if that node already had data that is still fresh.
    pub fn set_data(&self, data: Data) -> Result<bool> {
        let target = self.get_descendant(&data.name)?;
        Ok(target.attach_data(data).is_some())
    }

    /// Store the data, answer pending interests, then announce
    /// `DataReceived`. Attached data is only replaced once its freshness
    /// period has run out; the old object and error messages go with it.
    fn attach_data(&self, data: Data) -> Option<Rc<Data>> {
        let now = self.now();
        if self.0.data.borrow().is_some() {
            if self.is_fresh_at(now) {
                return None;
            }
            tracing::debug!(name = %self.0.name, "replacing stale data");
            *self.0.object.borrow_mut() = None;
            *self.0.errors.borrow_mut() = Errors::default();
        }
        let data = Rc::new(data);
        *self.0.data.borrow_mut() = Some(Rc::clone(&data));

        let table = self
            .self_and_ancestors()
            .find_map(|ns| ns.0.pending_interests.borrow().clone());
        if let Some(table) = table {
            table.satisfy(&data, now);
        }

        self.0
            .fresh_until
            .set(data.meta_info.freshness_period.map(|period| now + period));
        self.set_state(NamespaceState::DataReceived);
        Some(data)
    }

    /// Set the object directly, without a packet, and announce
    /// `ObjectReady`.
    pub fn set_object(&self, object: Object) {
        *self.0.object.borrow_mut() = Some(object);
        self.set_state(NamespaceState::ObjectReady);
    }

    /// Turn `blob` into this node's object. The nearest handler at or above
    /// this node that claims the blob decodes it; otherwise the blob itself
    /// becomes the object. `on_object` runs after `ObjectReady` fires.
    pub fn deserialize(&self, blob: Bytes, on_object: Option<OnObject>) {
        self.set_state(NamespaceState::Deserializing);

        let weak = self.downgrade();
        let on_deserialized: OnDeserialized = Rc::new(move |object: Object| {
            let Some(ns) = weak.upgrade() else { return };
            ns.set_object(object.clone());
            if let Some(on_object) = &on_object {
                invoke_guarded("on_object", || on_object(&object));
            }
        });

        for ns in self.self_and_ancestors() {
            let handler = ns.handler();
            if let Some(handler) = handler {
                if handler.can_deserialize(self, &blob, Rc::clone(&on_deserialized)) {
                    return;
                }
            }
        }
        on_deserialized(Object::Blob(blob));
    }

    /// Handle data that arrived from the network for this node.
    pub(crate) fn receive_data(&self, data: Data) {
        let Some(data) = self.attach_data(data) else {
            if self.object().is_some() {
                self.set_state(NamespaceState::ObjectReady);
            }
            return;
        };

        self.set_validate_state(ValidateState::Validating);
        if let Some(validator) = self.validator() {
            if let Err(e) = validator.validate(&data) {
                self.fail_validation(e.to_string());
                return;
            }
            self.set_validate_state(ValidateState::ValidateSuccess);
        }

        let Some(decryptor) = self.decryptor() else {
            self.deserialize(data.content.clone(), None);
            return;
        };

        self.set_state(NamespaceState::Decrypting);
        let on_plaintext = {
            let weak = self.downgrade();
            Box::new(move |plaintext: Bytes| {
                if let Some(ns) = weak.upgrade() {
                    ns.deserialize(plaintext, None);
                }
            })
        };
        let on_error = {
            let weak = self.downgrade();
            Box::new(move |code: cnl_core::DecryptErrorCode, message: String| {
                let Some(ns) = weak.upgrade() else { return };
                let message = format!("{code:?}: {message}");
                tracing::warn!(name = %ns.0.name, error = %message, "decryption failed");
                ns.0.errors.borrow_mut().decryption = Some(message);
                ns.set_state(NamespaceState::DecryptionError);
            })
        };
        decryptor.decrypt(&data.content, on_plaintext, on_error);
    }

    /// Resolve `data.name` under this node and hand the data to that node.
    pub(crate) fn receive_descendant_data(&self, data: &Data) {
        match self.get_descendant(&data.name) {
            Ok(node) => node.receive_data(data.clone()),
            Err(e) => tracing::warn!(error = %e, "ignoring data outside the namespace"),
        }
    }

    /// Produce a signed packet for `object` at this node using the
    /// inherited signer.
    pub fn serialize_object(&self, object: Object) -> Result<()> {
        self.serialize_with(object, None)
    }

    /// Like [`Namespace::serialize_object`] with an explicit signer.
    ///
    /// Encryption and signing failures are reported through
    /// `EncryptionError` / `SigningError` states, not as `Err`.
    pub fn serialize_with(&self, object: Object, signer: Option<Rc<dyn Signer>>) -> Result<()> {
        let content = object
            .to_bytes()?
            .ok_or_else(|| NamespaceError::Unserializable(self.0.name.clone()))?;
        self.set_state(NamespaceState::Serializing);

        let content = match self.encryptor() {
            Some(encryptor) => {
                self.set_state(NamespaceState::Encrypting);
                match encryptor.encrypt(&content) {
                    Ok(ciphertext) => ciphertext,
                    Err(e) => {
                        tracing::warn!(name = %self.0.name, error = %e, "encryption failed");
                        self.0.errors.borrow_mut().encryption = Some(e.to_string());
                        self.set_state(NamespaceState::EncryptionError);
                        return Ok(());
                    }
                }
            }
            None => content,
        };

        let mut data = Data::new(self.0.name.clone())
            .with_meta_info(self.new_data_meta_info())
            .with_content(content);

        self.set_state(NamespaceState::Signing);
        let signed = match signer.or_else(|| self.signer()) {
            Some(signer) => signer.sign(&mut data).map_err(|e| e.to_string()),
            None => Err("no signer configured".to_string()),
        };
        if let Err(message) = signed {
            tracing::warn!(name = %self.0.name, error = %message, "signing failed");
            self.0.errors.borrow_mut().signing = Some(message);
            self.set_state(NamespaceState::SigningError);
            return Ok(());
        }

        self.attach_data(data);
        self.set_object(object);
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Fetching
    // ─────────────────────────────────────────────────────────────────────────

    /// Ask for this node's object: reuse a cached object, else let a local
    /// producer make it, else express an interest for exactly this name.
    pub fn object_needed(&self, must_be_fresh: bool) -> Result<()> {
        self.object_needed_with(NeedOptions {
            must_be_fresh,
            ..NeedOptions::default()
        })
    }

    pub fn object_needed_with(&self, options: NeedOptions) -> Result<()> {
        let mut interest = Interest::new(self.0.name.clone())
            .with_must_be_fresh(options.must_be_fresh)
            .with_can_be_prefix(options.can_be_prefix)
            .with_lifetime(self.interest_lifetime());
        if let Some(selector) = options.child_selector {
            interest = interest.with_child_selector(selector);
        }

        let now = self.now();
        let cached = if self.object().is_some() {
            Some(self.clone())
        } else {
            let any_age = interest.clone().with_must_be_fresh(false);
            self.find_best_match(&any_age, now)
                .filter(|m| m.object().is_some())
        };
        if let Some(cached) = cached {
            if !options.must_be_fresh || cached.is_fresh_at(now) {
                cached.set_state(NamespaceState::ObjectReady);
                return Ok(());
            }
            cached.set_state(NamespaceState::ObjectReadyButStale);
        }

        if self.ask_producers() {
            self.set_state(NamespaceState::ProducingObject);
            return Ok(());
        }

        self.express(interest)
    }

    fn express(&self, interest: Interest) -> Result<()> {
        let face = self
            .face()
            .ok_or_else(|| NamespaceError::NoFace(self.0.name.clone()))?;

        let on_data: OnData = {
            let weak = self.downgrade();
            Rc::new(move |_: &Interest, data: &Data| {
                if let Some(ns) = weak.upgrade() {
                    ns.receive_descendant_data(data);
                }
            })
        };
        let on_timeout: OnTimeout = {
            let weak = self.downgrade();
            Rc::new(move |_: &Interest| {
                let Some(ns) = weak.upgrade() else { return };
                if ns.data().is_none() {
                    ns.set_state(NamespaceState::InterestTimeout);
                }
            })
        };
        let on_nack: OnNack = {
            let weak = self.downgrade();
            Rc::new(move |_: &Interest, nack: &NetworkNack| {
                let Some(ns) = weak.upgrade() else { return };
                if ns.data().is_none() {
                    tracing::debug!(name = %ns.0.name, reason = ?nack.reason, "interest nacked");
                    ns.0.errors.borrow_mut().network_nack = Some(nack.clone());
                    ns.set_state(NamespaceState::InterestNetworkNack);
                }
            })
        };

        self.set_state(NamespaceState::InterestExpressed);
        express_with_backoff(
            face,
            &interest,
            self.max_interest_lifetime(),
            on_data,
            on_timeout,
            on_nack,
        )?;
        Ok(())
    }

    /// The node at or under this one whose data best satisfies `interest`.
    /// Longer names win; among equal lengths the leftmost wins, or the
    /// rightmost with [`ChildSelector::Rightmost`].
    pub fn find_best_match(&self, interest: &Interest, now: Instant) -> Option<Namespace> {
        let rightmost = interest.child_selector == Some(ChildSelector::Rightmost);
        let mut best: Option<Namespace> = None;
        for child in self.children() {
            if let Some(candidate) = child.find_best_match(interest, now) {
                let better = match &best {
                    None => true,
                    Some(b) if rightmost => candidate.0.name.len() >= b.0.name.len(),
                    Some(b) => candidate.0.name.len() > b.0.name.len(),
                };
                if better {
                    best = Some(candidate);
                }
            }
        }
        if best.is_some() {
            return best;
        }

        let data = self.data()?;
        let fresh_enough = !interest.must_be_fresh || self.is_fresh_at(now);
        (interest.matches_data(&data) && fresh_enough).then(|| self.clone())
    }

    fn on_incoming_interest(&self, interest: &Interest, reply: Rc<dyn ReplyChannel>) {
        let mut lookup = interest.name.clone();
        if lookup.last().is_some_and(Component::is_implicit_digest) {
            lookup = lookup.prefix(lookup.len() - 1);
        }
        let target = match self.get_descendant(&lookup) {
            Ok(target) => target,
            Err(e) => {
                tracing::warn!(error = %e, "interest outside the registered prefix");
                return;
            }
        };

        let now = self.now();
        if let Some(best) = target.find_best_match(interest, now) {
            if let Some(data) = best.data() {
                if let Err(e) = reply.put_data(&data) {
                    tracing::warn!(name = %data.name, error = %e, "failed to send data");
                }
                return;
            }
        }

        let table = self.0.pending_interests.borrow().clone();
        if let Some(table) = table {
            table.add(interest.clone(), reply, now);
        }
        if target.ask_producers() {
            target.set_state(NamespaceState::ProducingObject);
        }
    }
}
