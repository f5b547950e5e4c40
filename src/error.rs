//! Protected session error types.
//!
//! # Error Classification
//!
//! Every engine failure is returned to the immediate caller; the engine never
//! logs and never retries. Each variant carries a recovery stance:
//!
//! | Variant          | Code | Stance                                         |
//! |------------------|------|------------------------------------------------|
//! | `Entropy`        | -1   | Host entropy source failed; fatal for the call |
//! | `Incomplete`     | -2   | Await more bytes, the session is untouched     |
//! | `Argument`       | -3   | Caller bug, never retried internally           |
//! | `Crypto`         | -4   | Session-fatal for handshakes, drop for data    |
//! | `BadData`        | -5   | Same stance as `Crypto`                        |
//! | `InputTooSmall`  | -6   | Malformed peer input, discard the package      |
//! | `InputTooBig`    | -7   | Malformed peer input, discard the package      |
//! | `OutputTooSmall` | -8   | Re-size the buffer and retry                   |
//! | `CallbackAborted`| -9   | Consumer vetoed, no state mutation             |
//! | `WrongState`     | -10  | Caller bug or stale session                    |
//! | `Incompatible`   | -11  | Needs a protocol upgrade                       |
//!
//! The `Crypto` and `CallbackAborted` variants preserve the full error chain
//! via `#[source]`.

use thiserror::Error;

use crate::codec::crypto::{AeadError, CryptoError, EntropyError, KeyError, KeyExchangeError};
use crate::protocol::{CallbackError, SessionPhase};

/// Success.
pub const ERR_OK: i32 = 0;
/// Generic failure (entropy source).
pub const ERR_ERROR: i32 = -1;
/// Input shorter than a valid package.
pub const ERR_INCOMPLETE: i32 = -2;
/// Invalid argument.
pub const ERR_ARGUMENT: i32 = -3;
/// Authentication or decryption failure.
pub const ERR_CRYPTO: i32 = -4;
/// Structurally invalid decoded content.
pub const ERR_BAD_DATA: i32 = -5;
/// Input below a bound.
pub const ERR_INPUT_TOO_SMALL: i32 = -6;
/// Input above a bound.
pub const ERR_INPUT_TOO_BIG: i32 = -7;
/// Output buffer too small.
pub const ERR_OUTPUT_TOO_SMALL: i32 = -8;
/// Callback vetoed the operation.
pub const ERR_CALLBACK: i32 = -9;
/// Session in the wrong phase.
pub const ERR_WRONG_STATE: i32 = -10;
/// Version or format mismatch.
pub const ERR_INCOMPATIBLE: i32 = -11;

/// Protected session errors.
#[derive(Error, Debug)]
pub enum PsError {
    /// Invalid input shape supplied by the caller.
    #[error("Invalid argument: {0}")]
    Argument(String),

    /// Input is shorter than a valid package requires.
    #[error("Incomplete package: need at least {needed} bytes, got {got}")]
    Incomplete {
        /// Minimum bytes required to make progress.
        needed: usize,
        /// Bytes supplied.
        got: usize,
    },

    /// Input is below a required bound.
    #[error("Input too small: {0}")]
    InputTooSmall(String),

    /// Input exceeds a configured bound.
    #[error("Input too big: {len} bytes (max {max})")]
    InputTooBig {
        /// Supplied length.
        len: usize,
        /// Allowed maximum.
        max: usize,
    },

    /// Caller-provided output buffer is smaller than the sizing formula.
    #[error("Output buffer too small: need {required} bytes, got {provided}")]
    OutputTooSmall {
        /// Bytes required by the sizing formula.
        required: usize,
        /// Bytes provided.
        provided: usize,
    },

    /// Authentication or decryption failed.
    #[error("Crypto error: {0}")]
    Crypto(#[source] CryptoError),

    /// The injected entropy source failed.
    #[error("Entropy error: {0}")]
    Entropy(#[source] EntropyError),

    /// Decoded content is structurally invalid.
    #[error("Bad data: {0}")]
    BadData(String),

    /// A consumer callback vetoed the operation.
    #[error("Callback aborted: {0}")]
    CallbackAborted(#[source] CallbackError),

    /// Operation attempted in an incompatible session phase.
    #[error("Wrong state: {operation} not allowed in {phase:?}")]
    WrongState {
        /// Operation that was attempted.
        operation: &'static str,
        /// Phase the session was in.
        phase: SessionPhase,
    },

    /// Package version does not match this implementation.
    #[error("Incompatible package version {found} (expected {expected})")]
    Incompatible {
        /// Version byte found on the wire.
        found: u8,
        /// Version this build speaks.
        expected: u8,
    },

    /// Configuration error.
    #[error("Config error: {0}")]
    Config(String),

    /// I/O error while loading configuration or keys.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for protected session operations
pub type Result<T> = std::result::Result<T, PsError>;

impl PsError {
    /// Signed wire-compatible error code (negative = failure).
    pub fn code(&self) -> i32 {
        match self {
            PsError::Entropy(_) | PsError::Config(_) | PsError::Io(_) => ERR_ERROR,
            PsError::Incomplete { .. } => ERR_INCOMPLETE,
            PsError::Argument(_) => ERR_ARGUMENT,
            PsError::Crypto(_) => ERR_CRYPTO,
            PsError::BadData(_) => ERR_BAD_DATA,
            PsError::InputTooSmall(_) => ERR_INPUT_TOO_SMALL,
            PsError::InputTooBig { .. } => ERR_INPUT_TOO_BIG,
            PsError::OutputTooSmall { .. } => ERR_OUTPUT_TOO_SMALL,
            PsError::CallbackAborted(_) => ERR_CALLBACK,
            PsError::WrongState { .. } => ERR_WRONG_STATE,
            PsError::Incompatible { .. } => ERR_INCOMPATIBLE,
        }
    }

    /// Whether the error means "wait for more bytes" rather than failure.
    pub fn is_incomplete(&self) -> bool {
        matches!(self, PsError::Incomplete { .. })
    }

    /// Whether a handshake that hit this error must be abandoned.
    ///
    /// Data and stop packages that fail with one of these are simply dropped;
    /// the established session survives.
    pub fn is_session_fatal_during_handshake(&self) -> bool {
        matches!(
            self,
            PsError::Crypto(_) | PsError::BadData(_) | PsError::Incompatible { .. }
        )
    }

    pub(crate) fn wrong_state(operation: &'static str, phase: SessionPhase) -> Self {
        PsError::WrongState { operation, phase }
    }
}

impl From<CryptoError> for PsError {
    fn from(err: CryptoError) -> Self {
        match err {
            CryptoError::Entropy(e) => PsError::Entropy(e),
            other => PsError::Crypto(other),
        }
    }
}

impl From<AeadError> for PsError {
    fn from(err: AeadError) -> Self {
        CryptoError::from(err).into()
    }
}

impl From<KeyExchangeError> for PsError {
    fn from(err: KeyExchangeError) -> Self {
        CryptoError::from(err).into()
    }
}

impl From<KeyError> for PsError {
    fn from(err: KeyError) -> Self {
        CryptoError::from(err).into()
    }
}

impl From<EntropyError> for PsError {
    fn from(err: EntropyError) -> Self {
        PsError::Entropy(err)
    }
}

impl From<CallbackError> for PsError {
    fn from(err: CallbackError) -> Self {
        PsError::CallbackAborted(err)
    }
}

impl From<serde_json::Error> for PsError {
    fn from(err: serde_json::Error) -> Self {
        PsError::BadData(format!("session state: {err}"))
    }
}

impl From<toml::de::Error> for PsError {
    fn from(err: toml::de::Error) -> Self {
        PsError::Config(err.to_string())
    }
}
