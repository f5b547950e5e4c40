//! Unified cryptographic error type.
//!
//! Aggregates all crypto-related errors, preserving the error chain through
//! `#[source]`.
//!
//! | Error      | Meaning                                       |
//! |------------|-----------------------------------------------|
//! | `Aead`     | Data was not authentic or not well-formed     |
//! | `Key`      | Key material was invalid or derivation failed |
//! | `Exchange` | Key agreement parameters were invalid         |
//! | `Entropy`  | The injected entropy source failed            |
//! | `Replay`   | Sequence number did not advance               |

use thiserror::Error;

use super::aead::AeadError;
use super::entropy::EntropyError;
use super::exchange::KeyExchangeError;
use super::keyring::KeyError;

/// Unified error type for all cryptographic operations.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// AEAD encryption/decryption error.
    #[error("AEAD: {0}")]
    Aead(#[source] AeadError),

    /// Key material error (empty, wrong size, derivation).
    #[error("Key: {0}")]
    Key(#[source] KeyError),

    /// Key exchange error (X25519).
    #[error("Key exchange: {0}")]
    Exchange(#[source] KeyExchangeError),

    /// Entropy source failure.
    #[error("Entropy: {0}")]
    Entropy(#[source] EntropyError),

    /// A stale or replayed package was presented.
    #[error("Replayed package: sequence {received} does not follow {last}")]
    Replay {
        /// Sequence number carried by the package.
        received: u64,
        /// Highest sequence number already accepted.
        last: u64,
    },
}

impl CryptoError {
    /// Whether this is an authentication failure (tag mismatch).
    pub fn is_authentication_failure(&self) -> bool {
        matches!(self, CryptoError::Aead(AeadError::DecryptionFailed(_)))
    }
}

impl From<AeadError> for CryptoError {
    fn from(err: AeadError) -> Self {
        match err {
            AeadError::Nonce(e) => CryptoError::Entropy(e),
            other => CryptoError::Aead(other),
        }
    }
}

impl From<KeyError> for CryptoError {
    fn from(err: KeyError) -> Self {
        CryptoError::Key(err)
    }
}

impl From<KeyExchangeError> for CryptoError {
    fn from(err: KeyExchangeError) -> Self {
        match err {
            KeyExchangeError::GenerationFailed(e) => CryptoError::Entropy(e),
            other => CryptoError::Exchange(other),
        }
    }
}

impl From<EntropyError> for CryptoError {
    fn from(err: EntropyError) -> Self {
        CryptoError::Entropy(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aead_error_conversion() {
        let crypto_err: CryptoError = AeadError::DataTooShort(3).into();
        assert!(matches!(crypto_err, CryptoError::Aead(_)));
        assert!(crypto_err.to_string().contains("AEAD"));
    }

    #[test]
    fn test_nonce_failure_becomes_entropy() {
        let crypto_err: CryptoError = AeadError::Nonce(EntropyError::new("empty pool")).into();
        assert!(matches!(crypto_err, CryptoError::Entropy(_)));
    }

    #[test]
    fn test_error_source_chain() {
        use std::error::Error;

        let crypto_err: CryptoError = AeadError::DecryptionFailed("bad tag".to_string()).into();
        assert!(crypto_err.is_authentication_failure());
        let source = crypto_err.source().unwrap();
        assert!(source.to_string().contains("bad tag"));
    }
}
