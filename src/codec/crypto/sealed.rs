//! Public-key authenticated encryption ("box").
//!
//! A box is keyed by the X25519 agreement between the sender's secret and the
//! recipient's public key, expanded with HKDF-SHA256 (salted by both public
//! keys, sender first) into an XChaCha20-Poly1305 key:
//!
//! ```text
//! shared = X25519(sk_sender, pk_recipient) = X25519(sk_recipient, pk_sender)
//! key    = HKDF(salt = pk_sender || pk_recipient, ikm = shared, info = BOX_INFO)
//! box    = nonce:24 || XChaCha20-Poly1305(key, nonce, plaintext, aad) || tag:16
//! ```
//!
//! Only the holder of either secret can open or forge a box, which is what
//! greeting/response packages and device cross-signatures rely on.

use super::aead::AeadCipher;
use super::entropy::EntropySource;
use super::error::CryptoError;
use super::exchange::{KeyPair, PublicKey};
use super::KEY_SIZE;

const BOX_INFO: &[u8] = b"psess/v2/box";

fn box_cipher(
    ours: &KeyPair,
    theirs: &PublicKey,
    sender: &PublicKey,
    recipient: &PublicKey,
) -> Result<AeadCipher, CryptoError> {
    let shared = ours.diffie_hellman(theirs)?;

    let mut salt = [0u8; KEY_SIZE * 2];
    salt[..KEY_SIZE].copy_from_slice(sender.as_bytes());
    salt[KEY_SIZE..].copy_from_slice(recipient.as_bytes());

    let key = shared.derive(&salt, BOX_INFO, KEY_SIZE)?;
    Ok(AeadCipher::new(key)?)
}

/// Encrypt `plaintext` from `sender` to `recipient` with a fresh nonce.
pub fn seal<E: EntropySource + ?Sized>(
    entropy: &mut E,
    sender: &KeyPair,
    recipient: &PublicKey,
    plaintext: &[u8],
    associated_data: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    let cipher = box_cipher(sender, recipient, sender.public_key(), recipient)?;
    Ok(cipher.seal(entropy, plaintext, associated_data)?)
}

/// Decrypt a box produced by `sender` for `recipient`.
pub fn open(
    recipient: &KeyPair,
    sender: &PublicKey,
    sealed: &[u8],
    associated_data: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    let cipher = box_cipher(recipient, sender, sender, recipient.public_key())?;
    Ok(cipher.decrypt(sealed, associated_data)?)
}
