//! Error types for content encryption.

use thiserror::Error;

/// Errors that can occur while encrypting, decrypting or granting keys.
#[derive(Debug, Error)]
pub enum AccessError {
    /// Encryption error.
    #[error("encryption error: {0}")]
    EncryptionError(String),

    /// Decryption error.
    #[error("decryption error: {0}")]
    DecryptionError(String),

    /// An envelope or grant could not be (de)serialized.
    #[error("serialization error: {0}")]
    SerializationError(String),

    /// No content key is known for the envelope's key id.
    #[error("unknown content key: {0}")]
    UnknownKey(String),

    /// Core error.
    #[error("core error: {0}")]
    Core(#[from] cnl_core::CoreError),
}

/// Result type for access operations.
pub type Result<T> = std::result::Result<T, AccessError>;
