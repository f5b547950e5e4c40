//! Cryptographic primitives for protected sessions.
//!
//! - **X25519**: static and ephemeral keypairs, Diffie-Hellman agreement
//! - **XChaCha20-Poly1305 AEAD**: authenticated encryption with 24-byte nonces
//! - **HKDF-SHA256**: box keys and directional session keys
//! - **Box**: public-key authenticated encryption used by handshake packages
//!   and device cross-signatures
//! - **Entropy**: the injected randomness capability every nonce and key
//!   is drawn from
//!
//! # Wire Format
//!
//! ```text
//! nonce:24 || ciphertext || auth_tag:16
//! ```
//!
//! Nonces are random per encryption. With 192-bit nonces the collision
//! probability stays negligible for any realistic number of packages under
//! one key.

mod aead;
mod entropy;
mod error;
mod exchange;
mod keyring;
pub mod sealed;

pub use aead::{AeadCipher, AeadError};
pub use entropy::{EntropyError, EntropySource, OsEntropy, RngEntropy};
pub use error::CryptoError;
pub use exchange::{generate_key_pair, KeyExchangeError, KeyPair, PublicKey};
pub use keyring::{KeyError, KeyMaterial};

pub(crate) use keyring::{hex_decode, hex_encode};

/// X25519 key size and symmetric key size (256 bits)
pub const KEY_SIZE: usize = 32;

/// Nonce size for XChaCha20-Poly1305 (192 bits)
pub const NONCE_SIZE: usize = 24;

/// Authentication tag size for Poly1305 (128 bits)
pub const AEAD_TAG_SIZE: usize = 16;

/// Bytes a sealed message adds to its plaintext (nonce + tag)
pub const SEALED_OVERHEAD: usize = NONCE_SIZE + AEAD_TAG_SIZE;
