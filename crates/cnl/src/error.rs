//! Error types for the namespace tree and its handlers.

use cnl_core::Name;
use thiserror::Error;

use crate::state::NamespaceState;

/// Errors returned to the caller of a namespace or handler operation.
///
/// Network and crypto failures during a fetch are not reported here; they
/// become node states (see [`NamespaceState`]).
#[derive(Debug, Error)]
pub enum NamespaceError {
    /// The name is not under the node it was resolved against.
    #[error("{name} is not a descendant of {prefix}")]
    NotDescendant { name: Name, prefix: Name },

    /// The node already has a handler.
    #[error("namespace {0} already has a handler")]
    HandlerAlreadySet(Name),

    /// The handler is already attached to another node.
    #[error("handler is already attached to {0}")]
    HandlerAlreadyAttached(Name),

    /// The handler has not been attached to a node yet.
    #[error("handler is not attached to a namespace")]
    HandlerNotAttached,

    /// A configuration value is out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Neither the node nor any ancestor has a face.
    #[error("no face is set for {0}")]
    NoFace(Name),

    /// The object cannot be turned into bytes.
    #[error("object at {0} cannot be serialized")]
    Unserializable(Name),

    /// Producing a packet left the node without data.
    #[error("producing {name} failed in state {state:?}")]
    ProductionFailed { name: Name, state: NamespaceState },

    /// A fetch ended in a terminal failure state.
    #[error("fetching {name} failed in state {state:?}")]
    FetchFailed { name: Name, state: NamespaceState },

    /// Received data failed validation.
    #[error("validation failed for {0}")]
    ValidationFailed(Name),

    /// The tree was dropped before the fetch completed.
    #[error("fetch was cancelled")]
    Cancelled,

    /// Core error.
    #[error("core error: {0}")]
    Core(#[from] cnl_core::CoreError),

    /// Face error.
    #[error("face error: {0}")]
    Face(#[from] cnl_face::FaceError),
}

/// Result type for namespace operations.
pub type Result<T> = std::result::Result<T, NamespaceError>;
