//! The deserialized value held by a namespace node.

use bytes::Bytes;
use std::any::Any;
use std::fmt;
use std::rc::Rc;

use cnl_core::{ContentMetaInfo, DelegationSet};

/// A node's object: raw bytes unless a handler decoded them into something
/// richer.
#[derive(Clone)]
pub enum Object {
    Blob(Bytes),
    ContentMeta(ContentMetaInfo),
    Delegations(DelegationSet),
    /// Application-defined type produced by a custom handler.
    Custom(Rc<dyn Any>),
}

impl Object {
    pub fn as_blob(&self) -> Option<&Bytes> {
        match self {
            Object::Blob(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_content_meta(&self) -> Option<&ContentMetaInfo> {
        match self {
            Object::ContentMeta(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_delegations(&self) -> Option<&DelegationSet> {
        match self {
            Object::Delegations(d) => Some(d),
            _ => None,
        }
    }

    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        match self {
            Object::Custom(any) => any.downcast_ref::<T>(),
            _ => None,
        }
    }

    /// Wire form for publishing. `None` for custom objects, which have no
    /// generic encoding.
    pub fn to_bytes(&self) -> cnl_core::Result<Option<Bytes>> {
        Ok(match self {
            Object::Blob(b) => Some(b.clone()),
            Object::ContentMeta(m) => Some(m.wire_encode()?),
            Object::Delegations(d) => Some(d.wire_encode()),
            Object::Custom(_) => None,
        })
    }
}

impl From<Bytes> for Object {
    fn from(b: Bytes) -> Self {
        Object::Blob(b)
    }
}

impl From<&'static str> for Object {
    fn from(s: &'static str) -> Self {
        Object::Blob(Bytes::from_static(s.as_bytes()))
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Object::Blob(b) => write!(f, "Blob({} bytes)", b.len()),
            Object::ContentMeta(m) => f.debug_tuple("ContentMeta").field(m).finish(),
            Object::Delegations(d) => f.debug_tuple("Delegations").field(d).finish(),
            Object::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}
