//! Error types for CNL core.

use thiserror::Error;

/// Errors from name parsing, packet encoding and signing.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid name: {0}")]
    InvalidName(String),

    #[error("invalid name component: {0}")]
    InvalidComponent(String),

    #[error("component type mismatch: expected {expected}, got {actual}")]
    ComponentTypeMismatch { expected: u16, actual: u16 },

    #[error("invalid signature")]
    InvalidSignature,

    #[error("invalid public key")]
    InvalidPublicKey,

    #[error("unsupported signature kind: {0}")]
    UnsupportedSignature(String),

    #[error("signing failed: {0}")]
    SigningFailed(String),

    #[error("encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("encoding error: {0}")]
    EncodingError(String),

    #[error("decoding error: {0}")]
    DecodingError(String),
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
