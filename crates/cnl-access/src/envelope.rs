//! The encrypted content envelope carried in a data packet's content.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::crypto::{ContentKey, ContentNonce};
use crate::error::{AccessError, Result};

/// Cipher used for an envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum EncryptionFormat {
    ChaCha20Poly1305 = 1,
}

/// Ciphertext plus everything except the key needed to open it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedContent {
    pub format: EncryptionFormat,
    /// [`ContentKey::key_id`] of the key that sealed this envelope.
    pub key_id: [u8; 16],
    pub nonce: ContentNonce,
    /// Includes the authentication tag.
    pub ciphertext: Vec<u8>,
}

impl EncryptedContent {
    /// Seal `plaintext` under `key` with a fresh nonce.
    pub fn seal(plaintext: &[u8], key: &ContentKey) -> Result<Self> {
        let nonce = ContentNonce::generate();
        let ciphertext = key.encrypt(plaintext, &nonce)?;
        Ok(Self {
            format: EncryptionFormat::ChaCha20Poly1305,
            key_id: key.key_id(),
            nonce,
            ciphertext,
        })
    }

    pub fn open(&self, key: &ContentKey) -> Result<Vec<u8>> {
        match self.format {
            EncryptionFormat::ChaCha20Poly1305 => key.decrypt(&self.ciphertext, &self.nonce),
        }
    }

    pub fn to_bytes(&self) -> Result<Bytes> {
        let mut buf = Vec::new();
        ciborium::into_writer(self, &mut buf)
            .map_err(|e| AccessError::SerializationError(e.to_string()))?;
        Ok(Bytes::from(buf))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        ciborium::from_reader(bytes).map_err(|e| AccessError::SerializationError(e.to_string()))
    }
}
