//! Fixed-layout device identity messages.
//!
//! Each message travels as the payload of a protected-session package:
//!
//! ```text
//! magic:2 ("AT") | version:1 | type:1 | body | crc32:4
//! ```
//!
//! Integers are little-endian and the CRC-32 covers header and body. Bodies
//! have a fixed length per message type.
//!
//! | Type                 | Byte | Body                                          |
//! |----------------------|------|-----------------------------------------------|
//! | Activation request   | 0x01 | requestor:32                                  |
//! | Validation request   | 0x02 | requestor:32, requestor_xsigned:72, subject:32|
//! | Reputation request   | 0x03 | requestor:32, subject:32, token:16, repinfo:8 |
//! | Activation response  | 0x81 | success:i32                                   |
//! | Validation response  | 0x82 | success:i32, token:16, counters:16            |
//! | Reputation response  | 0x83 | success:i32                                   |

use std::fmt;

use bytes::{Buf, BufMut, BytesMut};

use super::error::{AtmiError, Result};
use crate::codec::crypto::hex_encode;

/// Message magic
pub const ATMI_MAGIC: [u8; 2] = *b"AT";

/// Message format version
pub const ATMI_VERSION: u8 = 1;

/// Reputation description version written into every reputation request
pub const REPINFO_VERSION: u8 = 1;

/// Device identifier size
pub const DEVICE_ID_BYTES: usize = 32;

/// Cross-signature size
pub const CROSS_SIGNATURE_BYTES: usize = 72;

/// Reputation token size
pub const REPUTATION_TOKEN_BYTES: usize = 16;

const HEADER_LEN: usize = 4;
const CRC_LEN: usize = 4;

/// Message type byte
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageType {
    /// Device activation request
    ActivationRequest = 0x01,
    /// Device-device validation request
    ValidationRequest = 0x02,
    /// Reputation amendment request
    ReputationRequest = 0x03,
    /// Device activation response
    ActivationResponse = 0x81,
    /// Device-device validation response
    ValidationResponse = 0x82,
    /// Reputation amendment response
    ReputationResponse = 0x83,
}

impl MessageType {
    /// Parse a type byte
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0x01 => Some(MessageType::ActivationRequest),
            0x02 => Some(MessageType::ValidationRequest),
            0x03 => Some(MessageType::ReputationRequest),
            0x81 => Some(MessageType::ActivationResponse),
            0x82 => Some(MessageType::ValidationResponse),
            0x83 => Some(MessageType::ReputationResponse),
            _ => None,
        }
    }

    /// Type byte
    pub fn as_byte(&self) -> u8 {
        *self as u8
    }

    /// Response type answering this request type
    pub fn response_type(&self) -> Option<Self> {
        match self {
            MessageType::ActivationRequest => Some(MessageType::ActivationResponse),
            MessageType::ValidationRequest => Some(MessageType::ValidationResponse),
            MessageType::ReputationRequest => Some(MessageType::ReputationResponse),
            _ => None,
        }
    }
}

macro_rules! fixed_bytes {
    ($(#[$meta:meta])* $name:ident, $len:expr) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash)]
        pub struct $name(pub [u8; $len]);

        impl $name {
            /// Create from a slice of exactly the right length
            pub fn from_slice(slice: &[u8]) -> Result<Self> {
                let bytes: [u8; $len] = slice.try_into().map_err(|_| {
                    AtmiError::InvalidArgument(format!(
                        "{} must be {} bytes, got {}",
                        stringify!($name),
                        $len,
                        slice.len()
                    ))
                })?;
                Ok(Self(bytes))
            }

            /// Raw bytes
            pub fn as_bytes(&self) -> &[u8; $len] {
                &self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), hex_encode(&self.0))
            }
        }
    };
}

fixed_bytes!(
    /// 32-byte device identifier
    DeviceId,
    DEVICE_ID_BYTES
);

fixed_bytes!(
    /// Device identifier boxed by another device, see [`super::crosssign`]
    CrossSignature,
    CROSS_SIGNATURE_BYTES
);

fixed_bytes!(
    /// One-time credential issued by a validation response
    ReputationToken,
    REPUTATION_TOKEN_BYTES
);

/// A fixed-layout message body
pub trait Message: Sized {
    /// Type byte on the wire
    const TYPE: MessageType;

    /// Body length in bytes
    const BODY_LEN: usize;

    /// Append the body
    fn put_body(&self, buf: &mut BytesMut);

    /// Read the body; `body` holds exactly `BODY_LEN` bytes
    fn get_body(body: &mut &[u8]) -> Result<Self>;
}

/// Encode a message with header and checksum
pub fn encode<M: Message>(message: &M) -> Vec<u8> {
    let mut buf = BytesMut::with_capacity(HEADER_LEN + M::BODY_LEN + CRC_LEN);
    buf.put_slice(&ATMI_MAGIC);
    buf.put_u8(ATMI_VERSION);
    buf.put_u8(M::TYPE.as_byte());
    message.put_body(&mut buf);
    let crc = crc32fast::hash(&buf);
    buf.put_u32_le(crc);
    buf.to_vec()
}

/// Read only the type of an encoded message
pub fn peek_message_type(bytes: &[u8]) -> Result<MessageType> {
    if bytes.len() < HEADER_LEN {
        return Err(AtmiError::NotFound(format!(
            "{} bytes cannot hold a message header",
            bytes.len()
        )));
    }
    if bytes[..2] != ATMI_MAGIC {
        return Err(AtmiError::NotFound("bad message magic".to_string()));
    }
    if bytes[2] != ATMI_VERSION {
        return Err(AtmiError::NotFound(format!(
            "unsupported message version {}",
            bytes[2]
        )));
    }
    MessageType::from_byte(bytes[3])
        .ok_or_else(|| AtmiError::NotFound(format!("unknown message type 0x{:02x}", bytes[3])))
}

/// Decode a message of type `M`, checking header, length and checksum
pub fn decode<M: Message>(bytes: &[u8]) -> Result<M> {
    let found = peek_message_type(bytes)?;
    if found != M::TYPE {
        return Err(AtmiError::NotFound(format!(
            "expected {:?}, found {:?}",
            M::TYPE,
            found
        )));
    }

    let expected_len = HEADER_LEN + M::BODY_LEN + CRC_LEN;
    if bytes.len() != expected_len {
        return Err(AtmiError::Malformed(format!(
            "{:?} must be {expected_len} bytes, got {}",
            M::TYPE,
            bytes.len()
        )));
    }

    let (covered, mut trailer) = bytes.split_at(HEADER_LEN + M::BODY_LEN);
    let crc = trailer.get_u32_le();
    let computed = crc32fast::hash(covered);
    if crc != computed {
        return Err(AtmiError::Malformed(format!(
            "checksum mismatch: expected {crc:08x}, got {computed:08x}"
        )));
    }

    let mut body = &covered[HEADER_LEN..];
    M::get_body(&mut body)
}

fn get_array<const N: usize>(body: &mut &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    body.copy_to_slice(&mut out);
    out
}

/// Device activation request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivationRequest {
    /// Requestor's device id
    pub requestor: DeviceId,
}

impl Message for ActivationRequest {
    const TYPE: MessageType = MessageType::ActivationRequest;
    const BODY_LEN: usize = DEVICE_ID_BYTES;

    fn put_body(&self, buf: &mut BytesMut) {
        buf.put_slice(&self.requestor.0);
    }

    fn get_body(body: &mut &[u8]) -> Result<Self> {
        Ok(Self {
            requestor: DeviceId(get_array(body)),
        })
    }
}

/// Device-device validation request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationRequest {
    /// Requestor's device id
    pub requestor: DeviceId,
    /// Requestor's id cross-signed by the subject
    pub requestor_xsigned: CrossSignature,
    /// Subject's device id
    pub subject: DeviceId,
}

impl Message for ValidationRequest {
    const TYPE: MessageType = MessageType::ValidationRequest;
    const BODY_LEN: usize = DEVICE_ID_BYTES * 2 + CROSS_SIGNATURE_BYTES;

    fn put_body(&self, buf: &mut BytesMut) {
        buf.put_slice(&self.requestor.0);
        buf.put_slice(&self.requestor_xsigned.0);
        buf.put_slice(&self.subject.0);
    }

    fn get_body(body: &mut &[u8]) -> Result<Self> {
        Ok(Self {
            requestor: DeviceId(get_array(body)),
            requestor_xsigned: CrossSignature(get_array(body)),
            subject: DeviceId(get_array(body)),
        })
    }
}

/// Reputation amendment request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReputationRequest {
    /// Requestor's device id
    pub requestor: DeviceId,
    /// Subject's device id
    pub subject: DeviceId,
    /// Token from an earlier validation response
    pub token: ReputationToken,
    /// Reputation description version; always written as [`REPINFO_VERSION`]
    pub repinfo_version: u8,
    /// Whether the requestor initiated the communication
    pub comms_initiator: bool,
    /// Whether a reply was received
    pub comms_reply_received: bool,
    /// Whether the communication succeeded
    pub comms_successful: bool,
    /// Time allowed for a reply, in seconds; only meaningful when no reply
    /// was received
    pub comms_no_reply_timeout_s: u32,
}

impl ReputationRequest {
    /// Request with all outcome flags cleared
    pub fn new(requestor: DeviceId, subject: DeviceId, token: ReputationToken) -> Self {
        Self {
            requestor,
            subject,
            token,
            repinfo_version: REPINFO_VERSION,
            comms_initiator: false,
            comms_reply_received: false,
            comms_successful: false,
            comms_no_reply_timeout_s: 0,
        }
    }
}

impl Message for ReputationRequest {
    const TYPE: MessageType = MessageType::ReputationRequest;
    const BODY_LEN: usize = DEVICE_ID_BYTES * 2 + REPUTATION_TOKEN_BYTES + 4 + 4;

    fn put_body(&self, buf: &mut BytesMut) {
        buf.put_slice(&self.requestor.0);
        buf.put_slice(&self.subject.0);
        buf.put_slice(&self.token.0);
        buf.put_u8(REPINFO_VERSION);
        buf.put_u8(self.comms_initiator as u8);
        buf.put_u8(self.comms_reply_received as u8);
        buf.put_u8(self.comms_successful as u8);
        buf.put_u32_le(self.comms_no_reply_timeout_s);
    }

    fn get_body(body: &mut &[u8]) -> Result<Self> {
        let requestor = DeviceId(get_array(body));
        let subject = DeviceId(get_array(body));
        let token = ReputationToken(get_array(body));
        let repinfo_version = body.get_u8();
        if repinfo_version != REPINFO_VERSION {
            return Err(AtmiError::Malformed(format!(
                "unsupported reputation description version {repinfo_version}"
            )));
        }

        Ok(Self {
            requestor,
            subject,
            token,
            repinfo_version,
            comms_initiator: body.get_u8() != 0,
            comms_reply_received: body.get_u8() != 0,
            comms_successful: body.get_u8() != 0,
            comms_no_reply_timeout_s: body.get_u32_le(),
        })
    }
}

/// Device activation response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActivationResponse {
    /// 0 on success, negative on error
    pub success: i32,
}

impl Message for ActivationResponse {
    const TYPE: MessageType = MessageType::ActivationResponse;
    const BODY_LEN: usize = 4;

    fn put_body(&self, buf: &mut BytesMut) {
        buf.put_i32_le(self.success);
    }

    fn get_body(body: &mut &[u8]) -> Result<Self> {
        Ok(Self {
            success: body.get_i32_le(),
        })
    }
}

/// Aggregate reputation counters for a subject device
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReputationCounters {
    /// Subject's reputation score
    pub reputation: i32,
    /// Devices that reported contact with the subject
    pub contacts: u32,
    /// Successful communications reported
    pub successful: u32,
    /// Failed communications reported
    pub failed: u32,
}

/// Device-device validation response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationResponse {
    /// 0 on success, negative on error
    pub success: i32,
    /// One-time token for a later reputation amendment
    pub token: ReputationToken,
    /// Subject's counters
    pub counters: ReputationCounters,
}

impl ValidationResponse {
    /// Failed validation with an empty token
    pub fn failure(code: i32) -> Self {
        Self {
            success: code,
            token: ReputationToken([0u8; REPUTATION_TOKEN_BYTES]),
            counters: ReputationCounters::default(),
        }
    }
}

impl Message for ValidationResponse {
    const TYPE: MessageType = MessageType::ValidationResponse;
    const BODY_LEN: usize = 4 + REPUTATION_TOKEN_BYTES + 16;

    fn put_body(&self, buf: &mut BytesMut) {
        buf.put_i32_le(self.success);
        buf.put_slice(&self.token.0);
        buf.put_i32_le(self.counters.reputation);
        buf.put_u32_le(self.counters.contacts);
        buf.put_u32_le(self.counters.successful);
        buf.put_u32_le(self.counters.failed);
    }

    fn get_body(body: &mut &[u8]) -> Result<Self> {
        Ok(Self {
            success: body.get_i32_le(),
            token: ReputationToken(get_array(body)),
            counters: ReputationCounters {
                reputation: body.get_i32_le(),
                contacts: body.get_u32_le(),
                successful: body.get_u32_le(),
                failed: body.get_u32_le(),
            },
        })
    }
}

/// Reputation amendment response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReputationResponse {
    /// 0 on success, negative on error
    pub success: i32,
}

impl Message for ReputationResponse {
    const TYPE: MessageType = MessageType::ReputationResponse;
    const BODY_LEN: usize = 4;

    fn put_body(&self, buf: &mut BytesMut) {
        buf.put_i32_le(self.success);
    }

    fn get_body(body: &mut &[u8]) -> Result<Self> {
        Ok(Self {
            success: body.get_i32_le(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reputation_request() -> ReputationRequest {
        let mut request = ReputationRequest::new(
            DeviceId([1u8; 32]),
            DeviceId([2u8; 32]),
            ReputationToken([3u8; 16]),
        );
        request.comms_initiator = true;
        request.comms_successful = true;
        request.comms_no_reply_timeout_s = 30;
        request
    }

    #[test]
    fn test_layout() {
        let bytes = encode(&ActivationRequest {
            requestor: DeviceId([0xAA; 32]),
        });
        assert_eq!(bytes.len(), 4 + 32 + 4);
        assert_eq!(&bytes[..4], &[b'A', b'T', ATMI_VERSION, 0x01]);

        let crc = crc32fast::hash(&bytes[..36]);
        assert_eq!(&bytes[36..], &crc.to_le_bytes());
    }

    #[test]
    fn test_reputation_request_roundtrip() {
        let request = reputation_request();
        let decoded: ReputationRequest = decode(&encode(&request)).unwrap();
        assert_eq!(decoded, request);
    }

    #[test]
    fn test_repinfo_version_is_auto_populated() {
        let mut request = reputation_request();
        request.repinfo_version = 99;
        let decoded: ReputationRequest = decode(&encode(&request)).unwrap();
        assert_eq!(decoded.repinfo_version, REPINFO_VERSION);
    }

    #[test]
    fn test_validation_response_roundtrip() {
        let response = ValidationResponse {
            success: 0,
            token: ReputationToken([7u8; 16]),
            counters: ReputationCounters {
                reputation: -5,
                contacts: 10,
                successful: 8,
                failed: 2,
            },
        };
        let bytes = encode(&response);
        assert_eq!(bytes.len(), 4 + 36 + 4);
        assert_eq!(decode::<ValidationResponse>(&bytes).unwrap(), response);
    }

    #[test]
    fn test_wrong_type_is_not_found() {
        let bytes = encode(&ActivationResponse { success: 0 });
        let err = decode::<ReputationResponse>(&bytes).unwrap_err();
        assert!(matches!(err, AtmiError::NotFound(_)));
    }

    #[test]
    fn test_bad_header_is_not_found() {
        let mut bytes = encode(&ActivationResponse { success: 0 });
        bytes[0] = b'X';
        assert!(matches!(
            decode::<ActivationResponse>(&bytes),
            Err(AtmiError::NotFound(_))
        ));
        assert!(matches!(peek_message_type(b"AT"), Err(AtmiError::NotFound(_))));
    }

    #[test]
    fn test_corruption_is_malformed() {
        let mut bytes = encode(&ActivationResponse { success: -3 });
        bytes[5] ^= 0x10;
        assert!(matches!(
            decode::<ActivationResponse>(&bytes),
            Err(AtmiError::Malformed(_))
        ));

        let mut bytes = encode(&ActivationResponse { success: -3 });
        bytes.push(0);
        assert!(matches!(
            decode::<ActivationResponse>(&bytes),
            Err(AtmiError::Malformed(_))
        ));
    }

    #[test]
    fn test_response_types() {
        assert_eq!(
            MessageType::ValidationRequest.response_type(),
            Some(MessageType::ValidationResponse)
        );
        assert_eq!(MessageType::ActivationResponse.response_type(), None);
        assert_eq!(MessageType::from_byte(0x83), Some(MessageType::ReputationResponse));
        assert_eq!(MessageType::from_byte(0x04), None);
    }

    #[test]
    fn test_device_id_from_slice() {
        assert!(DeviceId::from_slice(&[0u8; 31]).is_err());
        let id = DeviceId::from_slice(&[9u8; 32]).unwrap();
        assert!(format!("{id:?}").starts_with("DeviceId(0909"));
    }
}
