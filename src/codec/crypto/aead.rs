//! XChaCha20-Poly1305 AEAD encryption for packages.
//!
//! Provides authenticated encryption with associated data (AEAD).
//! The nonce is prepended and the auth tag appended to the ciphertext.

use chacha20poly1305::{
    aead::{Aead, KeyInit, Payload},
    XChaCha20Poly1305, XNonce,
};
use thiserror::Error;

use super::entropy::{EntropyError, EntropySource};
use super::keyring::KeyMaterial;
use super::{AEAD_TAG_SIZE, KEY_SIZE, NONCE_SIZE};

/// Errors from AEAD operations
#[derive(Debug, Error)]
pub enum AeadError {
    /// Invalid key
    #[error("Invalid AEAD key: {0}")]
    InvalidKey(String),

    /// Encryption failed
    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    /// Decryption failed (auth tag mismatch or corrupted data)
    #[error("Decryption failed: {0}")]
    DecryptionFailed(String),

    /// Data too short to hold nonce and tag
    #[error("Ciphertext too short: {0} bytes")]
    DataTooShort(usize),

    /// Nonce could not be drawn
    #[error("Nonce generation failed: {0}")]
    Nonce(#[source] EntropyError),
}

/// XChaCha20-Poly1305 cipher for authenticated encryption
#[derive(Debug, Clone)]
pub struct AeadCipher {
    /// Key material (exactly 32 bytes)
    key: KeyMaterial,
}

impl AeadCipher {
    /// Create a new AEAD cipher with the given key
    pub fn new(key: KeyMaterial) -> Result<Self, AeadError> {
        if key.len() != KEY_SIZE {
            return Err(AeadError::InvalidKey(format!(
                "Key has {} bytes (need {})",
                key.len(),
                KEY_SIZE
            )));
        }
        Ok(Self { key })
    }

    fn cipher(&self) -> Result<XChaCha20Poly1305, AeadError> {
        XChaCha20Poly1305::new_from_slice(self.key.as_bytes())
            .map_err(|e| AeadError::InvalidKey(e.to_string()))
    }

    /// Encrypt plaintext with the given nonce and associated data
    ///
    /// Returns: nonce || ciphertext || tag
    pub fn encrypt(
        &self,
        plaintext: &[u8],
        nonce: &[u8; NONCE_SIZE],
        associated_data: &[u8],
    ) -> Result<Vec<u8>, AeadError> {
        let payload = Payload {
            msg: plaintext,
            aad: associated_data,
        };

        let ciphertext = self
            .cipher()?
            .encrypt(XNonce::from_slice(nonce), payload)
            .map_err(|e| AeadError::EncryptionFailed(e.to_string()))?;

        let mut result = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        result.extend_from_slice(nonce);
        result.extend_from_slice(&ciphertext);

        Ok(result)
    }

    /// Encrypt with a fresh nonce drawn from `entropy`
    pub fn seal<E: EntropySource + ?Sized>(
        &self,
        entropy: &mut E,
        plaintext: &[u8],
        associated_data: &[u8],
    ) -> Result<Vec<u8>, AeadError> {
        let mut nonce = [0u8; NONCE_SIZE];
        entropy.fill(&mut nonce).map_err(AeadError::Nonce)?;
        self.encrypt(plaintext, &nonce, associated_data)
    }

    /// Decrypt ciphertext
    ///
    /// Input format: nonce || ciphertext || tag
    pub fn decrypt(
        &self,
        ciphertext_with_nonce: &[u8],
        associated_data: &[u8],
    ) -> Result<Vec<u8>, AeadError> {
        if ciphertext_with_nonce.len() < NONCE_SIZE + AEAD_TAG_SIZE {
            return Err(AeadError::DataTooShort(ciphertext_with_nonce.len()));
        }

        let (nonce, ciphertext) = ciphertext_with_nonce.split_at(NONCE_SIZE);

        let payload = Payload {
            msg: ciphertext,
            aad: associated_data,
        };

        self.cipher()?
            .decrypt(XNonce::from_slice(nonce), payload)
            .map_err(|e| AeadError::DecryptionFailed(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::crypto::OsEntropy;

    fn test_key() -> KeyMaterial {
        KeyMaterial::new(vec![0x42u8; 32])
    }

    fn test_nonce() -> [u8; NONCE_SIZE] {
        let mut nonce = [0u8; NONCE_SIZE];
        for (i, b) in nonce.iter_mut().enumerate() {
            *b = i as u8 + 1;
        }
        nonce
    }

    #[test]
    fn test_aead_encrypt_decrypt() {
        let cipher = AeadCipher::new(test_key()).unwrap();
        let plaintext = b"Hello, World!";
        let aad = b"associated data";

        let ciphertext = cipher.encrypt(plaintext, &test_nonce(), aad).unwrap();
        assert_eq!(
            ciphertext.len(),
            NONCE_SIZE + plaintext.len() + AEAD_TAG_SIZE
        );

        let decrypted = cipher.decrypt(&ciphertext, aad).unwrap();
        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn test_aead_tamper_detection() {
        let cipher = AeadCipher::new(test_key()).unwrap();
        let mut ciphertext = cipher.encrypt(b"Hello", &test_nonce(), b"").unwrap();

        let last = ciphertext.len() - 1;
        ciphertext[last] ^= 0x01;

        let result = cipher.decrypt(&ciphertext, b"");
        assert!(matches!(result, Err(AeadError::DecryptionFailed(_))));
    }

    #[test]
    fn test_aead_wrong_aad() {
        let cipher = AeadCipher::new(test_key()).unwrap();
        let ciphertext = cipher
            .encrypt(b"Hello", &test_nonce(), b"correct aad")
            .unwrap();
        assert!(cipher.decrypt(&ciphertext, b"wrong aad").is_err());
    }

    #[test]
    fn test_aead_wrong_key() {
        let cipher1 = AeadCipher::new(KeyMaterial::new(vec![1u8; 32])).unwrap();
        let cipher2 = AeadCipher::new(KeyMaterial::new(vec![2u8; 32])).unwrap();

        let ciphertext = cipher1.encrypt(b"Hello", &test_nonce(), b"").unwrap();
        assert!(cipher2.decrypt(&ciphertext, b"").is_err());
    }

    #[test]
    fn test_aead_key_wrong_size() {
        assert!(AeadCipher::new(KeyMaterial::new(vec![0u8; 16])).is_err());
        assert!(AeadCipher::new(KeyMaterial::new(vec![0u8; 33])).is_err());
    }

    #[test]
    fn test_aead_data_too_short() {
        let cipher = AeadCipher::new(test_key()).unwrap();
        let result = cipher.decrypt(&[0u8; 10], b"");
        assert!(matches!(result, Err(AeadError::DataTooShort(10))));
    }

    #[test]
    fn test_aead_seal_draws_fresh_nonce() {
        let cipher = AeadCipher::new(test_key()).unwrap();
        let mut entropy = OsEntropy;

        let ciphertext1 = cipher.seal(&mut entropy, b"same", b"").unwrap();
        let ciphertext2 = cipher.seal(&mut entropy, b"same", b"").unwrap();

        assert_ne!(ciphertext1[..NONCE_SIZE], ciphertext2[..NONCE_SIZE]);
        assert_eq!(cipher.decrypt(&ciphertext1, b"").unwrap(), b"same");
        assert_eq!(cipher.decrypt(&ciphertext2, b"").unwrap(), b"same");
    }
}
