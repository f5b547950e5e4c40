//! Secret key material and HKDF derivation.
//!
//! Uses HKDF-SHA256 to expand Diffie-Hellman outputs into the symmetric keys
//! used by the box primitive and by established sessions.

use std::fmt;

use hkdf::Hkdf;
use sha2::Sha256;
use thiserror::Error;
use zeroize::Zeroize;

/// Errors from key material handling
#[derive(Debug, Error)]
pub enum KeyError {
    /// Key material is empty
    #[error("Key material is empty")]
    Empty,

    /// Key material has the wrong length
    #[error("Invalid key length: {got} bytes (need {expected})")]
    InvalidLength {
        /// Required length
        expected: usize,
        /// Supplied length
        got: usize,
    },

    /// Key derivation failed
    #[error("Key derivation failed: {0}")]
    DerivationFailed(String),
}

/// Key material (secret bytes), zeroized on drop
#[derive(Clone)]
pub struct KeyMaterial {
    /// The raw key bytes
    bytes: Vec<u8>,
}

impl KeyMaterial {
    /// Create new key material from bytes
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    /// Get the key bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Get the key length
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Check if the key is empty
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Copy out a 32-byte key
    pub fn to_array(&self) -> Result<[u8; 32], KeyError> {
        self.bytes
            .as_slice()
            .try_into()
            .map_err(|_| KeyError::InvalidLength {
                expected: 32,
                got: self.bytes.len(),
            })
    }

    /// Derive a new key using HKDF-SHA256 (extract with `salt`, then expand).
    ///
    /// An empty salt is equivalent to HKDF's all-zero default salt.
    pub fn derive(
        &self,
        salt: &[u8],
        info: &[u8],
        output_len: usize,
    ) -> Result<KeyMaterial, KeyError> {
        if self.bytes.is_empty() {
            return Err(KeyError::Empty);
        }

        let hk = Hkdf::<Sha256>::new(Some(salt), &self.bytes);
        let mut okm = vec![0u8; output_len];

        hk.expand(info, &mut okm)
            .map_err(|e| KeyError::DerivationFailed(format!("HKDF expand failed: {e}")))?;

        Ok(KeyMaterial::new(okm))
    }

    /// Split into two halves (first, second); length must be even
    pub fn split(&self) -> (KeyMaterial, KeyMaterial) {
        let mid = self.bytes.len() / 2;
        (
            KeyMaterial::new(self.bytes[..mid].to_vec()),
            KeyMaterial::new(self.bytes[mid..].to_vec()),
        )
    }
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Don't leak key material in debug output
        write!(f, "KeyMaterial([REDACTED, {} bytes])", self.bytes.len())
    }
}

impl Drop for KeyMaterial {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

/// Simple hex decoder
pub(crate) fn hex_decode(hex: &str) -> Result<Vec<u8>, &'static str> {
    let hex = hex.trim();
    if hex.len() % 2 != 0 {
        return Err("Invalid hex string length");
    }

    hex.as_bytes()
        .chunks(2)
        .map(|chunk| {
            let high = hex_char_to_nibble(chunk[0])?;
            let low = hex_char_to_nibble(chunk[1])?;
            Ok((high << 4) | low)
        })
        .collect()
}

fn hex_char_to_nibble(c: u8) -> Result<u8, &'static str> {
    match c {
        b'0'..=b'9' => Ok(c - b'0'),
        b'a'..=b'f' => Ok(c - b'a' + 10),
        b'A'..=b'F' => Ok(c - b'A' + 10),
        _ => Err("Invalid hex character"),
    }
}

/// Simple hex encoder
pub(crate) fn hex_encode(bytes: &[u8]) -> String {
    use std::fmt::Write;
    bytes
        .iter()
        .fold(String::with_capacity(bytes.len() * 2), |mut s, b| {
            let _ = write!(s, "{b:02x}");
            s
        })
}


/// RFC 5869 HKDF Test Vectors
///
/// These tests validate the HKDF-SHA256 wrapper against the official
/// test vectors from RFC 5869 Appendix A.
#[cfg(test)]
mod rfc5869_tests {
    use super::*;
    use hex_literal::hex;

    /// Test Case 1: Basic test case with SHA-256
    ///
    /// From RFC 5869 Appendix A.1
    #[test]
    fn test_rfc5869_case1_sha256_basic() {
        let ikm = hex!("0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b");
        let salt = hex!("000102030405060708090a0b0c");
        let info = hex!("f0f1f2f3f4f5f6f7f8f9");
        let expected_okm = hex!(
            "3cb25f25faacd57a90434f64d0362f2a"
            "2d2d0a90cf1a5a4c5db02d56ecc4c5bf"
            "34007208d5b887185865"
        );

        let okm = KeyMaterial::new(ikm.to_vec())
            .derive(&salt, &info, expected_okm.len())
            .unwrap();
        assert_eq!(okm.as_bytes(), expected_okm);
    }

    /// Test Case 3: Test with SHA-256 and zero-length salt/info
    ///
    /// From RFC 5869 Appendix A.3
    #[test]
    fn test_rfc5869_case3_sha256_zero_salt() {
        let ikm = hex!("0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b");
        let expected_okm = hex!(
            "8da4e775a563c18f715f802a063c5a31"
            "b8a11f5c5ee1879ec3454e5f3c738d2d"
            "9d201395faa4b61a96c8"
        );

        let okm = KeyMaterial::new(ikm.to_vec())
            .derive(&[], &[], expected_okm.len())
            .unwrap();
        assert_eq!(okm.as_bytes(), expected_okm);
    }
}
