//! Error types for the face layer.

use thiserror::Error;

/// Errors raised by a face or reply channel.
#[derive(Debug, Error)]
pub enum FaceError {
    /// Transport-level failure.
    #[error("transport error: {0}")]
    TransportError(String),

    /// The network behind this face is gone.
    #[error("face is closed")]
    Closed,

    /// Prefix registration was refused.
    #[error("prefix registration failed: {0}")]
    RegistrationFailed(String),

    /// A packet could not be encoded or decoded.
    #[error("codec error: {0}")]
    Codec(#[from] cnl_core::CoreError),
}

/// Result type for face operations.
pub type Result<T> = std::result::Result<T, FaceError>;
