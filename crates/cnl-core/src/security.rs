//! Signing, validation and encryption capabilities.
//!
//! The namespace tree never signs, verifies or decrypts on its own. It calls
//! whichever capability the node (or its nearest ancestor) is configured
//! with. This module defines those seams and the signers the rest of the
//! workspace uses.

use bytes::Bytes;

use crate::crypto::{Blake3Hash, Ed25519PublicKey, Keypair};
use crate::error::{CoreError, Result};
use crate::name::Name;
use crate::packet::{Data, SignatureKind};

/// Length of the all-zero placeholder signature.
pub const PLACEHOLDER_SIGNATURE_LEN: usize = 32;

/// Signs outgoing data packets.
pub trait Signer {
    /// Fill in `data.signature`. Must not touch any other field.
    fn sign(&self, data: &mut Data) -> Result<()>;

    /// The key name placed in the key locator, if any.
    fn key_name(&self) -> Option<Name> {
        None
    }
}

/// Verifies incoming data packets.
pub trait Validator {
    fn validate(&self, data: &Data) -> Result<()>;
}

/// Why a decryption attempt failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecryptErrorCode {
    InvalidEncryptedFormat,
    KeyNotFound,
    DecryptionFailure,
    General,
}

pub type OnPlaintext = Box<dyn FnOnce(Bytes)>;
pub type OnDecryptError = Box<dyn FnOnce(DecryptErrorCode, String)>;

/// Decrypts received content. Exactly one of the two callbacks is invoked,
/// possibly later.
pub trait Decryptor {
    fn decrypt(&self, content: &Bytes, on_plaintext: OnPlaintext, on_error: OnDecryptError);
}

/// Encrypts content before it is signed.
pub trait Encryptor {
    fn encrypt(&self, plaintext: &[u8]) -> Result<Bytes>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Signers
// ─────────────────────────────────────────────────────────────────────────────

/// Ed25519 signer with a named key.
#[derive(Debug, Clone)]
pub struct Ed25519Signer {
    keypair: Keypair,
    key_name: Name,
}

impl Ed25519Signer {
    pub fn new(keypair: Keypair, key_name: Name) -> Self {
        Self { keypair, key_name }
    }

    pub fn public_key(&self) -> Ed25519PublicKey {
        self.keypair.public_key()
    }
}

impl Signer for Ed25519Signer {
    fn sign(&self, data: &mut Data) -> Result<()> {
        data.signature.kind = SignatureKind::Ed25519;
        data.signature.key_locator = Some(self.key_name.clone());
        data.signature.value = self.keypair.sign(&data.signed_portion());
        Ok(())
    }

    fn key_name(&self) -> Option<Name> {
        Some(self.key_name.clone())
    }
}

/// Keyless integrity: the signature value is the Blake3 digest of the
/// signed portion.
#[derive(Debug, Clone, Copy, Default)]
pub struct DigestSigner;

impl Signer for DigestSigner {
    fn sign(&self, data: &mut Data) -> Result<()> {
        data.signature.kind = SignatureKind::DigestBlake3;
        data.signature.key_locator = None;
        let digest = Blake3Hash::hash(&data.signed_portion());
        data.signature.value = digest.to_bytes();
        Ok(())
    }
}

/// Writes a fixed all-zero signature. Packets signed this way are only
/// trustworthy through a manifest that lists their digests.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaceholderSigner;

impl Signer for PlaceholderSigner {
    fn sign(&self, data: &mut Data) -> Result<()> {
        data.signature.kind = SignatureKind::Placeholder;
        data.signature.key_locator = None;
        data.signature.value = Bytes::from_static(&[0u8; PLACEHOLDER_SIGNATURE_LEN]);
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Validators
// ─────────────────────────────────────────────────────────────────────────────

/// Accepts Ed25519 signatures from one public key and digest signatures.
#[derive(Debug, Clone, Copy)]
pub struct Ed25519Validator {
    public_key: Ed25519PublicKey,
}

impl Ed25519Validator {
    pub fn new(public_key: Ed25519PublicKey) -> Self {
        Self { public_key }
    }
}

impl Validator for Ed25519Validator {
    fn validate(&self, data: &Data) -> Result<()> {
        match data.signature.kind {
            SignatureKind::Ed25519 => self
                .public_key
                .verify(&data.signed_portion(), &data.signature.value),
            SignatureKind::DigestBlake3 => DigestValidator.validate(data),
            SignatureKind::Placeholder => Err(CoreError::UnsupportedSignature(
                "placeholder signatures need a manifest".into(),
            )),
        }
    }
}

/// Checks digest signatures only.
#[derive(Debug, Clone, Copy, Default)]
pub struct DigestValidator;

impl Validator for DigestValidator {
    fn validate(&self, data: &Data) -> Result<()> {
        if data.signature.kind != SignatureKind::DigestBlake3 {
            return Err(CoreError::UnsupportedSignature(format!(
                "{:?}",
                data.signature.kind
            )));
        }
        let digest = Blake3Hash::hash(&data.signed_portion());
        if digest.matches(&data.signature.value) {
            Ok(())
        } else {
            Err(CoreError::InvalidSignature)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data() -> Data {
        Data::new("/app/object".parse().unwrap()).with_content(&b"hello"[..])
    }

    #[test]
    fn test_ed25519_sign_and_validate() {
        let signer = Ed25519Signer::new(Keypair::from_seed(&[1; 32]), "/app/KEY/1".parse().unwrap());
        let validator = Ed25519Validator::new(signer.public_key());

        let mut packet = data();
        signer.sign(&mut packet).unwrap();
        assert_eq!(packet.signature.key_locator, signer.key_name());
        validator.validate(&packet).unwrap();

        packet.content = Bytes::from_static(b"tampered");
        assert!(validator.validate(&packet).is_err());
    }

    #[test]
    fn test_wrong_key_rejected() {
        let signer = Ed25519Signer::new(Keypair::from_seed(&[1; 32]), "/k".parse().unwrap());
        let other = Keypair::from_seed(&[2; 32]);
        let mut packet = data();
        signer.sign(&mut packet).unwrap();
        assert!(Ed25519Validator::new(other.public_key()).validate(&packet).is_err());
    }

    #[test]
    fn test_digest_signer() {
        let mut packet = data();
        DigestSigner.sign(&mut packet).unwrap();
        DigestValidator.validate(&packet).unwrap();
        packet.content = Bytes::from_static(b"x");
        assert!(DigestValidator.validate(&packet).is_err());
    }

    #[test]
    fn test_placeholder_is_all_zero() {
        let mut packet = data();
        PlaceholderSigner.sign(&mut packet).unwrap();
        assert_eq!(packet.signature.kind, SignatureKind::Placeholder);
        assert!(packet.signature.value.iter().all(|b| *b == 0));
        assert!(Ed25519Validator::new(Keypair::from_seed(&[1; 32]).public_key())
            .validate(&packet)
            .is_err());
    }
}
