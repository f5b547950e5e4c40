//! Application-layer error codes.
//!
//! Engine failures are folded into four errno-style kinds, returned as
//! negative integers by [`AtmiError::code`]:
//!
//! | Kind              | Code  | Meaning                                        |
//! |-------------------|-------|------------------------------------------------|
//! | `InvalidArgument` | -22   | Bad input shape or buffer (`EINVAL`)           |
//! | `NotFound`        | -2    | No packet of the expected kind (`ENOENT`)      |
//! | `Malformed`       | -9    | Bad length or integrity check (`EBADF`)        |
//! | `Crypto`          | -14   | Encryption/decryption failed (`EFAULT`)        |

use thiserror::Error;

use crate::error::PsError;

/// `EINVAL`
pub const ATMI_EINVAL: i32 = -22;
/// `ENOENT`
pub const ATMI_ENOENT: i32 = -2;
/// `EBADF`
pub const ATMI_EBADF: i32 = -9;
/// `EFAULT`
pub const ATMI_EFAULT: i32 = -14;

/// Application message layer errors
#[derive(Debug, Error)]
pub enum AtmiError {
    /// Invalid arguments
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Input holds no packet of the expected kind
    #[error("Packet not found: {0}")]
    NotFound(String),

    /// Packet found but its length or checksum is wrong
    #[error("Malformed packet: {0}")]
    Malformed(String),

    /// Payload could not be encrypted or decrypted
    #[error("Crypto failure: {0}")]
    Crypto(String),

    /// Failure reported by the session engine
    #[error("Session engine: {0}")]
    Engine(#[source] PsError),
}

/// Result type alias for application message operations
pub type Result<T> = std::result::Result<T, AtmiError>;

impl AtmiError {
    /// Signed errno-style code
    pub fn code(&self) -> i32 {
        match self {
            AtmiError::InvalidArgument(_) => ATMI_EINVAL,
            AtmiError::NotFound(_) => ATMI_ENOENT,
            AtmiError::Malformed(_) => ATMI_EBADF,
            AtmiError::Crypto(_) => ATMI_EFAULT,
            AtmiError::Engine(e) => engine_code(e),
        }
    }
}

fn engine_code(err: &PsError) -> i32 {
    match err {
        PsError::Crypto(_) | PsError::Entropy(_) => ATMI_EFAULT,
        PsError::BadData(_) | PsError::Incompatible { .. } => ATMI_ENOENT,
        PsError::Incomplete { .. } | PsError::InputTooSmall(_) | PsError::InputTooBig { .. } => {
            ATMI_EBADF
        }
        _ => ATMI_EINVAL,
    }
}

impl From<PsError> for AtmiError {
    fn from(err: PsError) -> Self {
        AtmiError::Engine(err)
    }
}
