//! Worst-case output sizes for each package type.
//!
//! Every formula shares one encoding-overhead term that inflates a raw length
//! by one eighth plus 128 bytes, on top of a fixed per-type framing constant:
//!
//! | Package  | Required output bytes                  |
//! |----------|----------------------------------------|
//! | Plain    | `203 + olen(payload)`                  |
//! | Greeting | `203 + olen(id + payload + 43)`        |
//! | Response | `203 + olen(session_id + payload + 117)`|
//! | Data     | `40 + olen(session_id + payload + 6)`  |
//! | Stop     | `203 + olen(session_id + payload + 3)` |
//!
//! where `olen(x) = x + x / 8 + 128`. Encoders refuse any output buffer
//! shorter than these values before doing cryptographic work, so callers must
//! size buffers through this module.

use super::header::PackageType;
use super::package::Package;
use crate::error::{PsError, Result};

/// Framing for packages that carry handshake-sized headers.
const HANDSHAKE_FRAMING: usize = 171 + 32;

/// Framing for data packages.
const DATA_FRAMING: usize = 8 + 32;

/// Extra inner bytes per package type (added before the encoding overhead).
const GREETING_INNER: usize = 43;
const RESPONSE_INNER: usize = 117;
const DATA_INNER: usize = 6;
const STOP_INNER: usize = 3;

/// Encoding overhead: `len + len / 8 + 128`.
pub fn encoding_overhead(len: usize) -> Result<usize> {
    len.checked_add(len / 8)
        .and_then(|n| n.checked_add(128))
        .ok_or_else(overflow)
}

fn overflow() -> PsError {
    PsError::Argument("package size computation overflowed".to_string())
}

fn framed(framing: usize, inner: &[usize]) -> Result<usize> {
    let raw = inner
        .iter()
        .try_fold(0usize, |acc, n| acc.checked_add(*n))
        .ok_or_else(overflow)?;
    framing
        .checked_add(encoding_overhead(raw)?)
        .ok_or_else(overflow)
}

/// Required output length for a plain package.
pub fn plain_package_size(payload_len: usize) -> Result<usize> {
    framed(HANDSHAKE_FRAMING, &[payload_len])
}

/// Required output length for a greeting package.
pub fn greeting_package_size(endpoint_id_len: usize, payload_len: usize) -> Result<usize> {
    framed(HANDSHAKE_FRAMING, &[endpoint_id_len, payload_len, GREETING_INNER])
}

/// Required output length for a response (reply) package.
pub fn response_package_size(session_id_len: usize, payload_len: usize) -> Result<usize> {
    framed(HANDSHAKE_FRAMING, &[session_id_len, payload_len, RESPONSE_INNER])
}

/// Required output length for a data package.
pub fn data_package_size(session_id_len: usize, payload_len: usize) -> Result<usize> {
    framed(DATA_FRAMING, &[session_id_len, payload_len, DATA_INNER])
}

/// Required output length for a stop package.
pub fn stop_package_size(session_id_len: usize, payload_len: usize) -> Result<usize> {
    framed(HANDSHAKE_FRAMING, &[session_id_len, payload_len, STOP_INNER])
}

/// Required output length for `kind`.
///
/// `id_len` is the endpoint identifier length for greetings, the session
/// identifier length for response/data/stop packages, and ignored for plain
/// packages.
pub fn required_size(kind: PackageType, id_len: usize, payload_len: usize) -> Result<usize> {
    match kind {
        PackageType::Plain => plain_package_size(payload_len),
        PackageType::Greeting => greeting_package_size(id_len, payload_len),
        PackageType::Response => response_package_size(id_len, payload_len),
        PackageType::Data => data_package_size(id_len, payload_len),
        PackageType::Stop => stop_package_size(id_len, payload_len),
    }
}

/// Fail with `OutputTooSmall` unless `provided >= required`.
pub(crate) fn ensure_capacity(required: usize, provided: usize) -> Result<()> {
    if provided < required {
        return Err(PsError::OutputTooSmall { required, provided });
    }
    Ok(())
}

/// An owned output buffer allocated to exactly the size its package type
/// requires.
#[derive(Debug, Clone)]
pub struct PackageBuffer {
    kind: PackageType,
    required: usize,
    bytes: Vec<u8>,
}

impl PackageBuffer {
    /// Allocate a buffer for `kind` with the given identifier and payload
    /// lengths.
    pub fn new(kind: PackageType, id_len: usize, payload_len: usize) -> Result<Self> {
        let required = required_size(kind, id_len, payload_len)?;
        Ok(Self {
            kind,
            required,
            bytes: vec![0u8; required],
        })
    }

    /// Package type this buffer was sized for.
    pub fn kind(&self) -> PackageType {
        self.kind
    }

    /// Minimum length computed by the sizing formula.
    pub fn required(&self) -> usize {
        self.required
    }

    /// Borrow the buffer as a package for `payload`.
    pub fn package<'a>(&'a mut self, payload: &'a [u8]) -> Package<'a> {
        Package::new(payload, &mut self.bytes)
    }

    /// Raw buffer.
    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    /// Raw buffer, mutable.
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.bytes
    }
}
