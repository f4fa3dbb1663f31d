//! Cryptographic operations for the ledger
//!
//! This module provides:
//! - Ed25519 key pair generation, signing, and verification
//! - SHA-256 hashing for transactions
//! - Deterministic storage key derivation from seeds

use crate::types::{Identity, Signature};
use crate::{Error, Result};
use ed25519_dalek::{Signature as DalekSignature, Signer, SigningKey, Verifier, VerifyingKey};
use sha2::{Digest, Sha256};

/// Ed25519 key pair for signing
#[derive(Debug)]
pub struct KeyPair {
    signing_key: SigningKey,
    verifying_key: VerifyingKey,
}

impl KeyPair {
    /// Generate a new random key pair
    pub fn generate() -> Self {
        let signing_key = SigningKey::from_bytes(&rand::random::<[u8; 32]>());
        let verifying_key = signing_key.verifying_key();

        Self {
            signing_key,
            verifying_key,
        }
    }

    /// Create from seed (32 bytes) - deterministic generation
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        let signing_key = SigningKey::from_bytes(seed);
        let verifying_key = signing_key.verifying_key();

        Self {
            signing_key,
            verifying_key,
        }
    }

    /// Parse a hex encoded 32-byte seed
    pub fn from_seed_hex(seed_hex: &str) -> Result<Self> {
        let bytes = hex::decode(seed_hex.trim())
            .map_err(|e| Error::Config(format!("Invalid seed hex: {}", e)))?;
        let seed: [u8; 32] = bytes
            .try_into()
            .map_err(|_| Error::Config("Seed must be 32 bytes".to_string()))?;
        Ok(Self::from_seed(&seed))
    }

    /// Identity (public key) of this key pair
    pub fn identity(&self) -> Identity {
        Identity::new(self.verifying_key.to_bytes())
    }

    /// Sign a message
    pub fn sign(&self, message: &[u8]) -> Signature {
        let signature = self.signing_key.sign(message);
        Signature::from_bytes(signature.to_bytes())
    }

    /// Verify a signature made by this key pair
    pub fn verify(&self, message: &[u8], signature: &Signature) -> Result<()> {
        let dalek_sig = DalekSignature::from_bytes(signature.as_bytes());
        self.verifying_key
            .verify(message, &dalek_sig)
            .map_err(|e| Error::Unauthorized(format!("Verification failed: {}", e)))
    }
}

impl Clone for KeyPair {
    fn clone(&self) -> Self {
        Self::from_seed(&self.signing_key.to_bytes())
    }
}

/// Verify a signature against an identity's public key
pub fn verify_signature(message: &[u8], signature: &Signature, signer: &Identity) -> bool {
    let dalek_sig = DalekSignature::from_bytes(signature.as_bytes());

    let verifying_key = match VerifyingKey::from_bytes(signer.as_bytes()) {
        Ok(key) => key,
        Err(_) => return false,
    };

    verifying_key.verify(message, &dalek_sig).is_ok()
}

/// Hash arbitrary bytes using SHA-256
pub fn hash_bytes(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Derive a storage address from a domain tag and seeds
///
/// `SHA-256(tag || seed_0 || seed_1 || ...)`. Seeds are fixed width at every
/// call site, so concatenation is unambiguous.
pub fn derive_key(tag: &[u8], seeds: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(tag);
    for seed in seeds {
        hasher.update(seed);
    }
    hasher.finalize().into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keypair_from_seed() {
        let seed = [42u8; 32];
        let keypair1 = KeyPair::from_seed(&seed);
        let keypair2 = KeyPair::from_seed(&seed);

        assert_eq!(keypair1.identity(), keypair2.identity());
    }

    #[test]
    fn test_keypair_from_seed_hex() {
        let keypair = KeyPair::from_seed_hex(&"07".repeat(32)).unwrap();
        assert_eq!(keypair.identity(), KeyPair::from_seed(&[7u8; 32]).identity());

        assert!(KeyPair::from_seed_hex("abcd").is_err());
        assert!(KeyPair::from_seed_hex("not hex").is_err());
    }

    #[test]
    fn test_sign_and_verify() {
        let keypair = KeyPair::generate();
        let message = b"transfer 40";

        let signature = keypair.sign(message);
        assert!(keypair.verify(message, &signature).is_ok());
        assert!(keypair.verify(b"transfer 400", &signature).is_err());
    }

    #[test]
    fn test_verify_signature_wrong_identity() {
        let keypair = KeyPair::generate();
        let message = b"withdraw 20";
        let signature = keypair.sign(message);

        assert!(verify_signature(message, &signature, &keypair.identity()));

        let other = KeyPair::generate();
        assert!(!verify_signature(message, &signature, &other.identity()));
    }

    #[test]
    fn test_clone_keeps_identity() {
        let keypair = KeyPair::generate();
        let cloned = keypair.clone();
        assert_eq!(keypair.identity(), cloned.identity());
    }

    #[test]
    fn test_derive_key_separates_domains() {
        let owner = [9u8; 32];
        let account = derive_key(b"account", &[&owner]);
        let wallet = derive_key(b"wallet", &[&owner]);

        assert_ne!(account, wallet);
        assert_eq!(account, derive_key(b"account", &[&owner]));
    }
}
