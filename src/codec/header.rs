//! Package header and session identifier.
//!
//! Every package starts with a fixed 4-byte header:
//!
//! ```text
//! magic:2 ("PS") | version:1 | type:1
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{PsError, Result};

/// Header magic bytes
pub const MAGIC: [u8; 2] = *b"PS";

/// Wire version this build speaks
pub const VERSION: u8 = 0x02;

/// Fixed header size in bytes
pub const HEADER_SIZE: usize = 4;

/// Session identifier size in bytes
pub const SESSION_ID_BYTES: usize = 16;

/// Package type identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PackageType {
    /// Session-less boxed payload
    Plain = 0x01,
    /// Endpoint -> manager handshake
    Greeting = 0x02,
    /// Manager -> endpoint handshake reply
    Response = 0x03,
    /// Established-session payload
    Data = 0x04,
    /// Session teardown
    Stop = 0x05,
}

impl PackageType {
    /// Parse a type byte
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0x01 => Some(PackageType::Plain),
            0x02 => Some(PackageType::Greeting),
            0x03 => Some(PackageType::Response),
            0x04 => Some(PackageType::Data),
            0x05 => Some(PackageType::Stop),
            _ => None,
        }
    }

    /// Type byte
    pub fn as_byte(&self) -> u8 {
        *self as u8
    }
}

/// Fixed package header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackageHeader {
    /// Wire version
    pub version: u8,
    /// Package type
    pub package_type: PackageType,
}

impl PackageHeader {
    /// Header for the current wire version
    pub fn new(package_type: PackageType) -> Self {
        Self {
            version: VERSION,
            package_type,
        }
    }

    /// Encode to bytes
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        [MAGIC[0], MAGIC[1], self.version, self.package_type.as_byte()]
    }

    /// Decode from bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_SIZE {
            return Err(PsError::Incomplete {
                needed: HEADER_SIZE,
                got: bytes.len(),
            });
        }

        if bytes[..2] != MAGIC {
            return Err(PsError::BadData(format!(
                "bad package magic {:02x}{:02x}",
                bytes[0], bytes[1]
            )));
        }

        if bytes[2] != VERSION {
            return Err(PsError::Incompatible {
                found: bytes[2],
                expected: VERSION,
            });
        }

        let package_type = PackageType::from_byte(bytes[3])
            .ok_or_else(|| PsError::BadData(format!("unknown package type 0x{:02x}", bytes[3])))?;

        Ok(Self {
            version: bytes[2],
            package_type,
        })
    }
}

/// Read only the package type of an encoded package
pub fn peek_type(input: &[u8]) -> Result<PackageType> {
    PackageHeader::from_bytes(input).map(|h| h.package_type)
}

/// Fixed-size opaque session token, assigned by the manager.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId([u8; SESSION_ID_BYTES]);

impl SessionId {
    /// Create from raw bytes
    pub fn from_bytes(bytes: [u8; SESSION_ID_BYTES]) -> Self {
        Self(bytes)
    }

    /// Create from a slice of exactly `SESSION_ID_BYTES`
    pub fn from_slice(slice: &[u8]) -> Result<Self> {
        let bytes: [u8; SESSION_ID_BYTES] = slice.try_into().map_err(|_| {
            PsError::Argument(format!(
                "session id must be {SESSION_ID_BYTES} bytes, got {}",
                slice.len()
            ))
        })?;
        Ok(Self(bytes))
    }

    /// Build a random (version 4) identifier from entropy bytes
    pub fn from_random(random: [u8; SESSION_ID_BYTES]) -> Self {
        Self(*uuid::Builder::from_random_bytes(random).as_uuid().as_bytes())
    }

    /// Raw bytes
    pub fn as_bytes(&self) -> &[u8; SESSION_ID_BYTES] {
        &self.0
    }

    /// Identifier rendered as a UUID
    pub fn as_uuid(&self) -> uuid::Uuid {
        uuid::Uuid::from_bytes(self.0)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_uuid())
    }
}

impl fmt::Debug for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionId({})", self.as_uuid())
    }
}

impl AsRef<[u8]> for SessionId {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_roundtrip() {
        let header = PackageHeader::new(PackageType::Data);
        let bytes = header.to_bytes();
        assert_eq!(&bytes[..2], b"PS");
        assert_eq!(PackageHeader::from_bytes(&bytes).unwrap(), header);
    }

    #[test]
    fn test_header_short_input_is_incomplete() {
        let err = PackageHeader::from_bytes(b"PS").unwrap_err();
        assert!(err.is_incomplete());
    }

    #[test]
    fn test_header_bad_magic() {
        let err = PackageHeader::from_bytes(&[b'X', b'Y', VERSION, 0x04]).unwrap_err();
        assert!(matches!(err, PsError::BadData(_)));
    }

    #[test]
    fn test_header_version_mismatch() {
        let err = PackageHeader::from_bytes(&[b'P', b'S', 0x01, 0x04]).unwrap_err();
        assert!(matches!(
            err,
            PsError::Incompatible {
                found: 1,
                expected: VERSION
            }
        ));
    }

    #[test]
    fn test_header_unknown_type() {
        let err = peek_type(&[b'P', b'S', VERSION, 0x77]).unwrap_err();
        assert!(matches!(err, PsError::BadData(_)));
    }

    #[test]
    fn test_session_id_is_uuid_v4() {
        let id = SessionId::from_random([0xAB; SESSION_ID_BYTES]);
        assert_eq!(id.as_uuid().get_version_num(), 4);
        assert_eq!(id.to_string().len(), 36);
        assert!(SessionId::from_slice(&[0u8; 15]).is_err());
        assert_eq!(SessionId::from_slice(id.as_bytes()).unwrap(), id);
    }
}
