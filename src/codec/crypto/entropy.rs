//! Injected entropy capability.
//!
//! Every nonce, ephemeral key and session identifier the engine produces is
//! drawn from an [`EntropySource`] supplied by the host. There is no fallback
//! to a non-cryptographic generator: if the source fails, the operation fails.

use rand::{CryptoRng, RngCore};
use thiserror::Error;

/// The entropy source could not fill the requested buffer.
#[derive(Debug, Error)]
#[error("entropy source failed: {reason}")]
pub struct EntropyError {
    reason: String,
}

impl EntropyError {
    /// Create a new entropy error with a reason.
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// A cryptographically suitable source of random bytes.
///
/// Implementations must fill the whole buffer or fail.
pub trait EntropySource {
    /// Fill `dest` completely with random bytes.
    fn fill(&mut self, dest: &mut [u8]) -> Result<(), EntropyError>;

    /// Draw a fixed-size random array.
    fn array<const N: usize>(&mut self) -> Result<[u8; N], EntropyError>
    where
        Self: Sized,
    {
        let mut out = [0u8; N];
        self.fill(&mut out)?;
        Ok(out)
    }
}

impl<T: EntropySource + ?Sized> EntropySource for &mut T {
    fn fill(&mut self, dest: &mut [u8]) -> Result<(), EntropyError> {
        (**self).fill(dest)
    }
}

/// The operating system CSPRNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsEntropy;

impl EntropySource for OsEntropy {
    fn fill(&mut self, dest: &mut [u8]) -> Result<(), EntropyError> {
        rand::rngs::OsRng
            .try_fill_bytes(dest)
            .map_err(|e| EntropyError::new(e.to_string()))
    }
}

/// Adapter exposing any cryptographic RNG as an [`EntropySource`].
///
/// Useful for seeding a deterministic generator in tests.
#[derive(Debug, Clone)]
pub struct RngEntropy<R>(R);

impl<R: RngCore + CryptoRng> RngEntropy<R> {
    /// Wrap an RNG.
    pub fn new(rng: R) -> Self {
        Self(rng)
    }

    /// Unwrap the RNG.
    pub fn into_inner(self) -> R {
        self.0
    }
}

impl<R: RngCore + CryptoRng> EntropySource for RngEntropy<R> {
    fn fill(&mut self, dest: &mut [u8]) -> Result<(), EntropyError> {
        self.0
            .try_fill_bytes(dest)
            .map_err(|e| EntropyError::new(e.to_string()))
    }
}
