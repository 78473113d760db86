//! # CNL Core
//!
//! Pure primitives for the CNL object model: names, packets, canonical
//! encoding, and the signing/encryption capability traits.
//!
//! This crate contains no I/O and no networking.
//!
//! ## Key Types
//!
//! - [`Name`] / [`Component`] - Hierarchical names with typed components
//! - [`Interest`] / [`Data`] - Request and response packets
//! - [`ContentMetaInfo`] - The `_meta` record of a generalized object
//! - [`DelegationSet`] - Forwarding pointers used by `_latest`
//! - [`Signer`], [`Validator`], [`Encryptor`], [`Decryptor`] - Pluggable security
//!
//! ## Canonicalization
//!
//! Packets encode as deterministic CBOR. See the [`canonical`] module.

pub mod canonical;
pub mod content_meta;
pub mod crypto;
pub mod delegation;
pub mod error;
pub mod name;
pub mod packet;
pub mod security;

pub use content_meta::{now_millis, ContentMetaInfo};
pub use crypto::{Blake3Hash, Ed25519PublicKey, Keypair, DIGEST_LEN};
pub use delegation::{Delegation, DelegationSet};
pub use error::{CoreError, Result};
pub use name::{component_type, Component, Name};
pub use packet::{
    ChildSelector, Data, Interest, MetaInfo, SignatureInfo, SignatureKind,
    DEFAULT_INTEREST_LIFETIME,
};
pub use security::{
    DecryptErrorCode, Decryptor, DigestSigner, DigestValidator, Ed25519Signer, Ed25519Validator,
    Encryptor, OnDecryptError, OnPlaintext, PlaceholderSigner, Signer, Validator,
};
