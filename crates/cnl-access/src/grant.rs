//! Key grants: a content key wrapped for one reader.
//!
//! The grantor generates an ephemeral X25519 key, agrees a secret with the
//! reader's public key and seals the content key under a wrap key derived
//! from that secret and the name of the content being granted.

use serde::{Deserialize, Serialize};

use cnl_core::Name;

use crate::crypto::{ContentKey, ContentNonce, EphemeralKeyPair, X25519PublicKey, X25519StaticSecret};
use crate::error::{AccessError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyGrant {
    /// URI of the content the key is for. Bound into the wrap key.
    pub scope: String,
    pub ephemeral_public: X25519PublicKey,
    pub wrapped_key: Vec<u8>,
    pub nonce: ContentNonce,
}

impl KeyGrant {
    pub fn create(
        scope: &Name,
        content_key: &ContentKey,
        reader_public: &X25519PublicKey,
    ) -> Result<Self> {
        let scope = scope.to_uri();
        let ephemeral = EphemeralKeyPair::generate();
        let ephemeral_public = ephemeral.public_key();
        let wrap_key = ephemeral
            .diffie_hellman(reader_public)
            .derive_wrap_key(scope.as_bytes());

        let nonce = ContentNonce::generate();
        let wrapped_key = wrap_key.encrypt(content_key.as_bytes(), &nonce)?;
        Ok(Self {
            scope,
            ephemeral_public,
            wrapped_key,
            nonce,
        })
    }

    /// Unwrap the content key with the reader's secret.
    pub fn open(&self, reader_secret: &X25519StaticSecret) -> Result<ContentKey> {
        let wrap_key = reader_secret
            .diffie_hellman(&self.ephemeral_public)
            .derive_wrap_key(self.scope.as_bytes());
        let key_bytes = wrap_key.decrypt(&self.wrapped_key, &self.nonce)?;

        let key: [u8; 32] = key_bytes.as_slice().try_into().map_err(|_| {
            AccessError::DecryptionError(format!(
                "invalid key length: expected 32, got {}",
                key_bytes.len()
            ))
        })?;
        Ok(ContentKey::from_bytes(key))
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(self, &mut buf)
            .map_err(|e| AccessError::SerializationError(e.to_string()))?;
        Ok(buf)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        ciborium::from_reader(bytes).map_err(|e| AccessError::SerializationError(e.to_string()))
    }
}
