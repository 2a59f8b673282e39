//! Cryptographic key pairs and signatures.
//!
//! Mock nodes never touch an OS entropy source for their identities: every
//! key is derived from an integer "entropy" value so that test runs are
//! reproducible, and so that two nodes can be given colliding identities on
//! purpose.

use ed25519_dalek::{Signer, Verifier};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Entropy value behind [`dummy_notary_key`].
pub const DUMMY_NOTARY_ENTROPY: u64 = 20;

/// An ed25519 key pair.
#[derive(Clone)]
pub struct KeyPair(ed25519_dalek::SigningKey);

impl KeyPair {
    /// Derive a key pair deterministically from an entropy value.
    ///
    /// The seed is the Blake3 hash of the little-endian entropy bytes, so equal
    /// entropy always yields the same key pair.
    pub fn from_entropy(entropy: u64) -> Self {
        let seed = blake3::hash(&entropy.to_le_bytes());
        Self::from_seed(seed.as_bytes())
    }

    /// Build a key pair from a raw 32-byte seed.
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        KeyPair(ed25519_dalek::SigningKey::from_bytes(seed))
    }

    /// Sign a message.
    pub fn sign(&self, message: &[u8]) -> Signature {
        Signature(self.0.sign(message).to_bytes())
    }

    /// Get the public key.
    pub fn public_key(&self) -> PublicKey {
        PublicKey(self.0.verifying_key().to_bytes())
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("KeyPair").field(&self.public_key()).finish()
    }
}

impl PartialEq for KeyPair {
    fn eq(&self, other: &Self) -> bool {
        self.public_key() == other.public_key()
    }
}

impl Eq for KeyPair {}

/// The well-known key used by default for the notary of
/// `create_some_nodes`-style topologies.
pub fn dummy_notary_key() -> KeyPair {
    KeyPair::from_entropy(DUMMY_NOTARY_ENTROPY)
}

/// An ed25519 public key (32 bytes).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PublicKey(pub [u8; 32]);

impl PublicKey {
    /// Verify a signature.
    pub fn verify(&self, message: &[u8], signature: &Signature) -> bool {
        let key = match ed25519_dalek::VerifyingKey::from_bytes(&self.0) {
            Ok(key) => key,
            Err(_) => return false,
        };
        let sig = ed25519_dalek::Signature::from_bytes(&signature.0);
        key.verify(message, &sig).is_ok()
    }

    /// Get bytes as slice reference.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Short hex form used in logs.
    pub fn short_hex(&self) -> String {
        hex::encode(&self.0[..4])
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({}..)", self.short_hex())
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

/// An ed25519 signature (64 bytes).
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Signature(pub [u8; 64]);

impl Signature {
    /// Get the raw signature bytes.
    pub fn to_bytes(&self) -> [u8; 64] {
        self.0
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({}..)", &hex::encode(self.0)[..16])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_verify() {
        let keypair = KeyPair::from_entropy(7);
        let message = b"test message";

        let signature = keypair.sign(message);
        assert!(keypair.public_key().verify(message, &signature));
        assert!(!keypair.public_key().verify(b"wrong message", &signature));
    }

    #[test]
    fn test_from_entropy_is_deterministic() {
        let kp1 = KeyPair::from_entropy(7);
        let kp2 = KeyPair::from_entropy(7);
        let kp3 = KeyPair::from_entropy(8);

        let msg = b"test";
        assert_eq!(kp1.sign(msg).to_bytes(), kp2.sign(msg).to_bytes());
        assert_eq!(kp1.public_key(), kp2.public_key());
        assert_ne!(kp1.public_key(), kp3.public_key());
    }

    #[test]
    fn test_dummy_notary_key_is_stable() {
        assert_eq!(dummy_notary_key(), KeyPair::from_entropy(DUMMY_NOTARY_ENTROPY));
    }

    #[test]
    fn test_signature_from_other_key_rejected() {
        let signer = KeyPair::from_entropy(1);
        let other = KeyPair::from_entropy(2);
        let sig = signer.sign(b"payload");
        assert!(!other.public_key().verify(b"payload", &sig));
    }
}
