//! Device identifier cross-signing.
//!
//! A subject device proves contact with a requestor by boxing the
//! requestor's identifier from its own key pair to the verifier (normally the
//! authority). The box carries a fresh nonce, so every call yields a
//! different 72-byte signature, and only the verifier can check it:
//!
//! ```text
//! signature = nonce:24 || box(signer -> verifier, device_id):32 || tag:16
//! ```

use super::error::{AtmiError, Result};
use super::messages::{CrossSignature, DeviceId, CROSS_SIGNATURE_BYTES};
use crate::codec::crypto::{sealed, CryptoError, EntropySource, KeyPair, PublicKey};

const CROSS_SIGN_AAD: &[u8] = b"atmi/xsign";

/// Cross-sign `device_id` with `signer`'s key pair for `verifier`.
pub fn cross_sign<E: EntropySource + ?Sized>(
    entropy: &mut E,
    device_id: &DeviceId,
    signer: &KeyPair,
    verifier: &PublicKey,
) -> Result<CrossSignature> {
    let boxed = sealed::seal(entropy, signer, verifier, device_id.as_bytes(), CROSS_SIGN_AAD)
        .map_err(crypto)?;
    if boxed.len() != CROSS_SIGNATURE_BYTES {
        return Err(AtmiError::Crypto(format!(
            "cross-signature is {} bytes, expected {CROSS_SIGNATURE_BYTES}",
            boxed.len()
        )));
    }
    CrossSignature::from_slice(&boxed)
}

/// Check that `signature` binds `device_id` and was produced by the holder of
/// `signer`'s secret key.
pub fn verify(
    signature: &CrossSignature,
    device_id: &DeviceId,
    signer: &PublicKey,
    verifier: &KeyPair,
) -> Result<()> {
    let opened = sealed::open(verifier, signer, signature.as_bytes(), CROSS_SIGN_AAD)
        .map_err(crypto)?;
    if opened.as_slice() != device_id.as_bytes() {
        return Err(AtmiError::Crypto(
            "cross-signature binds a different device id".to_string(),
        ));
    }
    Ok(())
}

fn crypto(err: CryptoError) -> AtmiError {
    AtmiError::Crypto(err.to_string())
}
