//! [`Encryptor`] and [`Decryptor`] implementations backed by content keys.

use bytes::Bytes;
use std::cell::RefCell;
use std::collections::HashMap;

use cnl_core::{CoreError, DecryptErrorCode, Decryptor, Encryptor, OnDecryptError, OnPlaintext};

use crate::crypto::{ContentKey, X25519StaticSecret};
use crate::envelope::EncryptedContent;
use crate::error::Result;
use crate::grant::KeyGrant;

/// Seals every object under one content key.
pub struct ContentKeyEncryptor {
    key: ContentKey,
}

impl ContentKeyEncryptor {
    pub fn new(key: ContentKey) -> Self {
        Self { key }
    }

    pub fn key(&self) -> &ContentKey {
        &self.key
    }
}

impl Encryptor for ContentKeyEncryptor {
    fn encrypt(&self, plaintext: &[u8]) -> cnl_core::Result<Bytes> {
        EncryptedContent::seal(plaintext, &self.key)
            .and_then(|envelope| envelope.to_bytes())
            .map_err(|e| CoreError::EncryptionFailed(e.to_string()))
    }
}

/// Opens envelopes with any content key it has been given, looked up by
/// key id. Decryption completes synchronously.
#[derive(Default)]
pub struct ContentKeyDecryptor {
    keys: RefCell<HashMap<[u8; 16], ContentKey>>,
}

impl ContentKeyDecryptor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_key(&self, key: ContentKey) {
        self.keys.borrow_mut().insert(key.key_id(), key);
    }

    /// Unwrap a grant with the reader's secret and remember the key.
    pub fn accept_grant(&self, grant: &KeyGrant, reader_secret: &X25519StaticSecret) -> Result<()> {
        let key = grant.open(reader_secret)?;
        tracing::debug!(scope = %grant.scope, "accepted content key grant");
        self.add_key(key);
        Ok(())
    }

    pub fn key_count(&self) -> usize {
        self.keys.borrow().len()
    }
}

impl Decryptor for ContentKeyDecryptor {
    fn decrypt(&self, content: &Bytes, on_plaintext: OnPlaintext, on_error: OnDecryptError) {
        let envelope = match EncryptedContent::from_bytes(content) {
            Ok(envelope) => envelope,
            Err(e) => return on_error(DecryptErrorCode::InvalidEncryptedFormat, e.to_string()),
        };

        let key = self.keys.borrow().get(&envelope.key_id).cloned();
        let Some(key) = key else {
            return on_error(DecryptErrorCode::KeyNotFound, "no key for envelope".into());
        };

        match envelope.open(&key) {
            Ok(plaintext) => on_plaintext(Bytes::from(plaintext)),
            Err(e) => on_error(DecryptErrorCode::DecryptionFailure, e.to_string()),
        }
    }
}
