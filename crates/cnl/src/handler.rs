//! Handlers: pluggable behavior attached to a namespace node.

use bytes::Bytes;
use std::cell::RefCell;
use std::rc::Rc;

use crate::error::{NamespaceError, Result};
use crate::namespace::{Namespace, WeakNamespace};
use crate::object::Object;

/// Delivers the object a handler decoded from a blob.
pub type OnDeserialized = Rc<dyn Fn(Object)>;

/// Behavior attached to a node with [`Namespace::set_handler`].
pub trait Handler {
    /// Called once when the handler is attached. Handlers register their
    /// listeners here.
    fn on_namespace_set(self: Rc<Self>, _namespace: &Namespace) -> Result<()> {
        Ok(())
    }

    /// Offered every blob deserialized at or below the handler's node.
    /// Return true to take it; the handler must then call
    /// `on_deserialized`, now or later.
    fn can_deserialize(
        &self,
        _namespace: &Namespace,
        _blob: &Bytes,
        _on_deserialized: OnDeserialized,
    ) -> bool {
        false
    }
}

/// The node a handler is bound to and the listeners it registered there.
#[derive(Default)]
pub struct HandlerBinding {
    namespace: RefCell<Option<WeakNamespace>>,
    callback_ids: RefCell<Vec<u64>>,
}

impl HandlerBinding {
    /// Bind to `namespace`. A handler binds at most once.
    pub fn bind(&self, namespace: &Namespace) -> Result<()> {
        if let Some(existing) = self.namespace() {
            return Err(NamespaceError::HandlerAlreadyAttached(existing.name().clone()));
        }
        *self.namespace.borrow_mut() = Some(namespace.downgrade());
        Ok(())
    }

    pub fn namespace(&self) -> Option<Namespace> {
        self.namespace.borrow().as_ref().and_then(WeakNamespace::upgrade)
    }

    pub fn require_namespace(&self) -> Result<Namespace> {
        self.namespace().ok_or(NamespaceError::HandlerNotAttached)
    }

    /// Remember a callback registered on the bound node.
    pub fn track(&self, id: u64) {
        self.callback_ids.borrow_mut().push(id);
    }

    /// Remove every tracked callback. The binding itself is kept.
    pub fn release(&self) {
        let ids = std::mem::take(&mut *self.callback_ids.borrow_mut());
        if let Some(namespace) = self.namespace() {
            for id in ids {
                namespace.remove_callback(id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_bind_once() {
        let root = Namespace::new("/a".parse().unwrap());
        let binding = HandlerBinding::default();
        binding.bind(&root).unwrap();
        assert!(matches!(
            binding.bind(&root.get_child("b")),
            Err(NamespaceError::HandlerAlreadyAttached(_))
        ));
        assert_eq!(binding.namespace(), Some(root));
    }

    #[test]
    fn test_release_removes_listeners() {
        let root = Namespace::new("/a".parse().unwrap());
        let binding = HandlerBinding::default();
        binding.bind(&root).unwrap();

        let calls = Rc::new(Cell::new(0));
        let counter = calls.clone();
        binding.track(root.add_on_state_changed(move |_, _, _, _| counter.set(counter.get() + 1)));
        root.set_object(Object::from("x"));
        binding.release();
        root.set_object(Object::from("y"));
        assert_eq!(calls.get(), 1);
    }

    struct Refusing;
    impl Handler for Refusing {
        fn on_namespace_set(self: Rc<Self>, _namespace: &Namespace) -> Result<()> {
            Err(NamespaceError::InvalidConfig("refused".into()))
        }
    }

    #[test]
    fn test_failed_attach_leaves_slot_empty() {
        let root = Namespace::new("/a".parse().unwrap());
        assert!(root.set_handler(Rc::new(Refusing)).is_err());
        assert!(root.handler().is_none());

        let stream = crate::SegmentStreamHandler::new(Default::default()).unwrap();
        root.set_handler(stream).unwrap();
        assert!(matches!(
            root.set_handler(Rc::new(Refusing)),
            Err(NamespaceError::HandlerAlreadySet(_))
        ));
    }
}
