//! Hashing and Ed25519 key material.

use bytes::Bytes;
use ed25519_dalek::{Signature, Signer as _, SigningKey, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{CoreError, Result};

/// Length of a manifest entry and of a digest signature value.
pub const DIGEST_LEN: usize = 32;

/// A Blake3 digest. Packet digests double as implicit-digest name
/// components and as manifest entries.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Blake3Hash(pub [u8; DIGEST_LEN]);

impl Blake3Hash {
    pub fn hash(data: &[u8]) -> Self {
        Self(*blake3::hash(data).as_bytes())
    }

    pub const fn as_bytes(&self) -> &[u8; DIGEST_LEN] {
        &self.0
    }

    /// True if `entry` holds exactly this digest.
    pub fn matches(&self, entry: &[u8]) -> bool {
        entry == self.0.as_slice()
    }

    pub fn to_bytes(&self) -> Bytes {
        Bytes::copy_from_slice(&self.0)
    }
}

impl fmt::Debug for Blake3Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sha256digest={}", hex::encode(&self.0[..8]))
    }
}

impl AsRef<[u8]> for Blake3Hash {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Public half of a packet signing key.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Ed25519PublicKey(pub [u8; 32]);

impl Ed25519PublicKey {
    /// Check a data packet's signature value against its signed portion.
    pub fn verify(&self, signed_portion: &[u8], signature_value: &Bytes) -> Result<()> {
        let key = VerifyingKey::from_bytes(&self.0).map_err(|_| CoreError::InvalidPublicKey)?;
        let raw: [u8; 64] = signature_value
            .as_ref()
            .try_into()
            .map_err(|_| CoreError::InvalidSignature)?;
        key.verify(signed_portion, &Signature::from_bytes(&raw))
            .map_err(|_| CoreError::InvalidSignature)
    }
}

impl fmt::Debug for Ed25519PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Ed25519PublicKey({})", hex::encode(&self.0[..8]))
    }
}

/// Key used by a producer to sign the data it publishes.
#[derive(Clone)]
pub struct Keypair {
    signing_key: SigningKey,
}

impl Keypair {
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::generate(&mut rand::thread_rng()),
        }
    }

    /// Deterministic keypair, used by fixtures and golden vectors.
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(seed),
        }
    }

    pub fn public_key(&self) -> Ed25519PublicKey {
        Ed25519PublicKey(self.signing_key.verifying_key().to_bytes())
    }

    /// Signature value for a packet's signed portion.
    pub fn sign(&self, signed_portion: &[u8]) -> Bytes {
        Bytes::copy_from_slice(&self.signing_key.sign(signed_portion).to_bytes())
    }
}

impl fmt::Debug for Keypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Keypair").field(&self.public_key()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_covers_every_byte() {
        let keypair = Keypair::from_seed(&[0x42; 32]);
        let value = keypair.sign(b"segment payload");
        let key = keypair.public_key();

        assert!(key.verify(b"segment payload", &value).is_ok());
        assert!(key.verify(b"segment payloaD", &value).is_err());
        assert!(key.verify(b"segment payload", &value.slice(..63)).is_err());
    }

    #[test]
    fn test_digest_matches_only_full_entry() {
        let digest = Blake3Hash::hash(b"x");
        assert!(digest.matches(digest.as_bytes()));
        assert!(!digest.matches(&digest.as_bytes()[..31]));
        assert!(!digest.matches(Blake3Hash::hash(b"y").as_bytes()));
    }
}
