//! # CNL Access
//!
//! Content encryption for namespace objects.
//!
//! ## Overview
//!
//! Encrypted content uses a two-layer key model:
//!
//! 1. **Content Key**: a symmetric ChaCha20-Poly1305 key that seals each
//!    object into an [`EncryptedContent`] envelope
//! 2. **Key Grants**: the content key wrapped for one reader via X25519
//!
//! [`ContentKeyEncryptor`] and [`ContentKeyDecryptor`] plug into a namespace
//! node through `set_encryptor` / `set_decryptor`.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use cnl_access::{ContentKey, ContentKeyDecryptor, ContentKeyEncryptor, KeyGrant, X25519StaticSecret};
//!
//! let reader = X25519StaticSecret::generate();
//! let content_key = ContentKey::generate();
//!
//! // Producer side
//! let encryptor = ContentKeyEncryptor::new(content_key.clone());
//! let grant = KeyGrant::create(&"/alice/video".parse().unwrap(), &content_key, &reader.public_key()).unwrap();
//!
//! // Reader side
//! let decryptor = ContentKeyDecryptor::new();
//! decryptor.accept_grant(&grant, &reader).unwrap();
//! ```

pub mod crypto;
pub mod decryptor;
pub mod envelope;
pub mod error;
pub mod grant;

pub use crypto::{
    ContentKey, ContentNonce, EphemeralKeyPair, SharedKey, X25519PublicKey, X25519StaticSecret,
};
pub use decryptor::{ContentKeyDecryptor, ContentKeyEncryptor};
pub use envelope::{EncryptedContent, EncryptionFormat};
pub use error::{AccessError, Result};
pub use grant::KeyGrant;
