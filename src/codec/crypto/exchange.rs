//! X25519 keys and Diffie-Hellman agreement.
//!
//! Endpoints and the session manager each own a keypair. Managers hold a
//! long-lived one; endpoints may supply their own or let the engine generate
//! an ephemeral pair for a single handshake.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use x25519_dalek::{PublicKey as X25519Public, StaticSecret};
use zeroize::Zeroize;

use super::entropy::{EntropyError, EntropySource};
use super::keyring::{hex_decode, hex_encode, KeyMaterial};
use super::KEY_SIZE;

/// Errors from key exchange operations
#[derive(Debug, Error)]
pub enum KeyExchangeError {
    /// Invalid public key
    #[error("Invalid public key: {0}")]
    InvalidPublicKey(String),

    /// Invalid secret key
    #[error("Invalid secret key: {0}")]
    InvalidSecretKey(String),

    /// Peer key is a low-order point and yields no shared secret
    #[error("Non-contributory key agreement")]
    NonContributory,

    /// Key generation failed
    #[error("Key generation failed: {0}")]
    GenerationFailed(#[source] EntropyError),
}

/// X25519 public key (32 bytes)
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PublicKey([u8; KEY_SIZE]);

impl PublicKey {
    /// Create from bytes
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }

    /// Create from a slice
    pub fn from_slice(slice: &[u8]) -> Result<Self, KeyExchangeError> {
        let bytes: [u8; KEY_SIZE] = slice.try_into().map_err(|_| {
            KeyExchangeError::InvalidPublicKey(format!(
                "Expected {KEY_SIZE} bytes, got {}",
                slice.len()
            ))
        })?;
        Ok(Self(bytes))
    }

    /// Parse from a hex string
    pub fn from_hex(hex: &str) -> Result<Self, KeyExchangeError> {
        let bytes = hex_decode(hex).map_err(|e| KeyExchangeError::InvalidPublicKey(e.into()))?;
        Self::from_slice(&bytes)
    }

    /// Render as lowercase hex
    pub fn to_hex(&self) -> String {
        hex_encode(&self.0)
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey([{}...])", hex_encode(&self.0[..4]))
    }
}

/// X25519 key pair (private + public)
#[derive(Clone)]
pub struct KeyPair {
    /// Secret key
    secret: StaticSecret,
    /// Public key
    public: PublicKey,
}

impl KeyPair {
    /// Generate a new key pair from the injected entropy source
    pub fn generate<E: EntropySource + ?Sized>(entropy: &mut E) -> Result<Self, KeyExchangeError> {
        let mut secret_bytes = [0u8; KEY_SIZE];
        entropy
            .fill(&mut secret_bytes)
            .map_err(KeyExchangeError::GenerationFailed)?;
        let pair = Self::from_secret(secret_bytes);
        secret_bytes.zeroize();
        Ok(pair)
    }

    /// Create from a secret key (32 bytes)
    pub fn from_secret(secret_bytes: [u8; KEY_SIZE]) -> Self {
        let secret = StaticSecret::from(secret_bytes);
        let public = X25519Public::from(&secret);

        Self {
            secret,
            public: PublicKey::from_bytes(public.to_bytes()),
        }
    }

    /// Create from a secret key slice
    pub fn from_secret_slice(slice: &[u8]) -> Result<Self, KeyExchangeError> {
        let mut bytes: [u8; KEY_SIZE] = slice.try_into().map_err(|_| {
            KeyExchangeError::InvalidSecretKey(format!(
                "Expected {KEY_SIZE} bytes, got {}",
                slice.len()
            ))
        })?;
        let pair = Self::from_secret(bytes);
        bytes.zeroize();
        Ok(pair)
    }

    /// Create from explicit public and private halves, checking they match
    pub fn from_parts(public: PublicKey, secret_bytes: [u8; KEY_SIZE]) -> Result<Self, KeyExchangeError> {
        let pair = Self::from_secret(secret_bytes);
        if pair.public != public {
            return Err(KeyExchangeError::InvalidSecretKey(
                "secret key does not match public key".to_string(),
            ));
        }
        Ok(pair)
    }

    /// Get the public key
    pub fn public_key(&self) -> &PublicKey {
        &self.public
    }

    /// Export the secret scalar bytes
    pub fn secret_bytes(&self) -> [u8; KEY_SIZE] {
        self.secret.to_bytes()
    }

    /// Perform Diffie-Hellman key exchange
    ///
    /// Low-order peer keys are rejected.
    pub fn diffie_hellman(&self, peer_public: &PublicKey) -> Result<KeyMaterial, KeyExchangeError> {
        let peer = X25519Public::from(*peer_public.as_bytes());
        let shared = self.secret.diffie_hellman(&peer);

        if !shared.was_contributory() {
            return Err(KeyExchangeError::NonContributory);
        }

        Ok(KeyMaterial::new(shared.as_bytes().to_vec()))
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("public", &self.public)
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

/// Generate a fresh 32-byte public/private key pair
pub fn generate_key_pair<E: EntropySource + ?Sized>(entropy: &mut E) -> Result<KeyPair, KeyExchangeError> {
    KeyPair::generate(entropy)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::crypto::OsEntropy;

    #[test]
    fn test_key_pair_generation() {
        let kp = KeyPair::generate(&mut OsEntropy).unwrap();
        let other = KeyPair::generate(&mut OsEntropy).unwrap();
        assert_ne!(kp.public_key(), other.public_key());
    }

    #[test]
    fn test_diffie_hellman_symmetric() {
        let alice = KeyPair::generate(&mut OsEntropy).unwrap();
        let bob = KeyPair::generate(&mut OsEntropy).unwrap();

        let alice_shared = alice.diffie_hellman(bob.public_key()).unwrap();
        let bob_shared = bob.diffie_hellman(alice.public_key()).unwrap();

        assert_eq!(alice_shared.as_bytes(), bob_shared.as_bytes());
    }

    #[test]
    fn test_low_order_point_rejected() {
        let alice = KeyPair::generate(&mut OsEntropy).unwrap();
        let zero = PublicKey::from_bytes([0u8; KEY_SIZE]);
        assert!(matches!(
            alice.diffie_hellman(&zero),
            Err(KeyExchangeError::NonContributory)
        ));
    }

    #[test]
    fn test_public_key_from_slice() {
        let bytes = [0x42u8; 32];
        let pk = PublicKey::from_slice(&bytes).unwrap();
        assert_eq!(pk.as_bytes(), &bytes);
        assert!(PublicKey::from_slice(&[0u8; 16]).is_err());
    }

    #[test]
    fn test_public_key_hex_roundtrip() {
        let kp = KeyPair::generate(&mut OsEntropy).unwrap();
        let hex = kp.public_key().to_hex();
        assert_eq!(hex.len(), 64);
        assert_eq!(&PublicKey::from_hex(&hex).unwrap(), kp.public_key());
    }

    #[test]
    fn test_key_pair_from_secret() {
        let secret = [0x42u8; 32];
        let kp1 = KeyPair::from_secret(secret);
        let kp2 = KeyPair::from_secret(secret);
        assert_eq!(kp1.public_key(), kp2.public_key());

        assert!(KeyPair::from_parts(*kp1.public_key(), secret).is_ok());
        assert!(KeyPair::from_parts(PublicKey::from_bytes([9; 32]), secret).is_err());
    }

    #[test]
    fn test_key_pair_debug_redacts_secret() {
        let kp = KeyPair::from_secret([0x42u8; 32]);
        let debug = format!("{kp:?}");
        assert!(debug.contains("REDACTED"));
        assert!(!debug.contains("4242424242"));
    }
}
