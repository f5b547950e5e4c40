//! Package codec.
//!
//! Stateless encode/decode of a single package over explicit keys, session
//! identifiers and sequence numbers. Session bookkeeping lives in
//! [`crate::protocol`]; this module only knows bytes.
//!
//! # Layouts
//!
//! ```text
//! Plain:    hdr | sender_pk:32   | box(payload)
//! Greeting: hdr | endpoint_pk:32 | box(id_len:u16 | id | payload)
//! Response: hdr | session_id:16  | response_pk:32 | box(payload)
//! Data:     hdr | session_id:16  | aead(seq:u64 | payload)
//! Stop:     hdr | session_id:16  | aead(seq:u64 | reason:u8 | payload)
//! ```
//!
//! Everything in front of the ciphertext is bound as associated data.
//! Boxes and AEAD blocks both start with their 24-byte nonce. A response
//! additionally binds the nonce of the greeting it answers, so it only opens
//! for that one greeting.

use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use super::crypto::{
    sealed, AeadCipher, EntropySource, KeyPair, PublicKey, KEY_SIZE, NONCE_SIZE, SEALED_OVERHEAD,
};
use super::header::{PackageHeader, PackageType, SessionId, HEADER_SIZE, SESSION_ID_BYTES};
use super::sizing::{self, ensure_capacity};
use crate::error::{PsError, Result};

const SEQ_SIZE: usize = 8;
const ID_LEN_SIZE: usize = 2;

const PLAIN_PREFIX: usize = HEADER_SIZE + KEY_SIZE;
const GREETING_PREFIX: usize = HEADER_SIZE + KEY_SIZE;
const RESPONSE_PREFIX: usize = HEADER_SIZE + SESSION_ID_BYTES + KEY_SIZE;
const SESSION_PREFIX: usize = HEADER_SIZE + SESSION_ID_BYTES;

/// One package being produced: the payload going in, the caller's output
/// buffer, and how many bytes ended up written.
#[derive(Debug)]
pub struct Package<'a> {
    payload: &'a [u8],
    out: &'a mut [u8],
    written: usize,
}

impl<'a> Package<'a> {
    /// Wrap a payload and an output buffer.
    pub fn new(payload: &'a [u8], out: &'a mut [u8]) -> Self {
        Self {
            payload,
            out,
            written: 0,
        }
    }

    /// Input payload.
    pub fn payload(&self) -> &[u8] {
        self.payload
    }

    /// Output buffer length.
    pub fn capacity(&self) -> usize {
        self.out.len()
    }

    /// Bytes written by the last encode, zero before.
    pub fn written(&self) -> usize {
        self.written
    }

    /// The encoded package.
    pub fn as_bytes(&self) -> &[u8] {
        &self.out[..self.written]
    }

    fn write(&mut self, parts: &[&[u8]]) -> Result<()> {
        let total: usize = parts.iter().map(|p| p.len()).sum();
        ensure_capacity(total, self.out.len())?;

        let mut pos = 0;
        for part in parts {
            self.out[pos..pos + part.len()].copy_from_slice(part);
            pos += part.len();
        }
        self.written = total;
        Ok(())
    }
}

/// Nonce of the greeting box a response answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GreetingBinding([u8; NONCE_SIZE]);

impl GreetingBinding {
    fn from_box(boxed: &[u8]) -> Result<Self> {
        let nonce = boxed
            .get(..NONCE_SIZE)
            .ok_or_else(|| PsError::BadData("greeting box shorter than its nonce".to_string()))?;
        let mut bytes = [0u8; NONCE_SIZE];
        bytes.copy_from_slice(nonce);
        Ok(Self(bytes))
    }

    /// Raw nonce bytes
    pub fn as_bytes(&self) -> &[u8; NONCE_SIZE] {
        &self.0
    }
}

/// Decrypted greeting.
#[derive(Debug)]
pub struct GreetingContents {
    /// Public key the endpoint greeted with
    pub endpoint_public: PublicKey,
    /// What the response to this greeting must be bound to
    pub binding: GreetingBinding,
    /// Endpoint identifier
    pub endpoint_id: Vec<u8>,
    /// First-message payload
    pub payload: Zeroizing<Vec<u8>>,
}

/// Decrypted response.
#[derive(Debug)]
pub struct ResponseContents {
    /// Identifier assigned by the manager
    pub session_id: SessionId,
    /// Manager's per-session public key
    pub response_public: PublicKey,
    /// Response payload
    pub payload: Zeroizing<Vec<u8>>,
}

/// Decrypted data package.
#[derive(Debug)]
pub struct DataContents {
    /// Session the package belongs to
    pub session_id: SessionId,
    /// Sender's sequence number
    pub seq: u64,
    /// Payload
    pub payload: Zeroizing<Vec<u8>>,
}

/// Decrypted stop package.
#[derive(Debug)]
pub struct StopContents {
    /// Session being stopped
    pub session_id: SessionId,
    /// Sender's sequence number
    pub seq: u64,
    /// Raw reason byte
    pub reason: u8,
    /// Payload
    pub payload: Zeroizing<Vec<u8>>,
}

/// Decrypted plain package.
#[derive(Debug)]
pub struct PlainContents {
    /// Sender's public key
    pub sender: PublicKey,
    /// Payload
    pub payload: Zeroizing<Vec<u8>>,
}

fn check_type(input: &[u8], expected: PackageType) -> Result<()> {
    let header = PackageHeader::from_bytes(input)?;
    if header.package_type != expected {
        return Err(PsError::BadData(format!(
            "expected {:?} package, found {:?}",
            expected, header.package_type
        )));
    }
    Ok(())
}

fn check_len(input: &[u8], needed: usize) -> Result<()> {
    if input.len() < needed {
        return Err(PsError::Incomplete {
            needed,
            got: input.len(),
        });
    }
    Ok(())
}

fn read_public(bytes: &[u8]) -> Result<PublicKey> {
    Ok(PublicKey::from_slice(bytes)?)
}

fn read_seq(plaintext: &[u8]) -> u64 {
    let mut seq = [0u8; SEQ_SIZE];
    seq.copy_from_slice(&plaintext[..SEQ_SIZE]);
    u64::from_le_bytes(seq)
}

/// Session identifier of a response, data or stop package, without
/// decrypting it.
pub fn peek_session_id(input: &[u8]) -> Result<SessionId> {
    let header = PackageHeader::from_bytes(input)?;
    match header.package_type {
        PackageType::Response | PackageType::Data | PackageType::Stop => {
            check_len(input, SESSION_PREFIX)?;
            SessionId::from_slice(&input[HEADER_SIZE..SESSION_PREFIX])
        }
        other => Err(PsError::BadData(format!(
            "{other:?} packages carry no session id"
        ))),
    }
}

/// Encode a plain package from `sender` to `recipient`.
pub fn seal_plain<E: EntropySource + ?Sized>(
    entropy: &mut E,
    sender: &KeyPair,
    recipient: &PublicKey,
    package: &mut Package<'_>,
) -> Result<()> {
    let required = sizing::plain_package_size(package.payload.len())?;
    ensure_capacity(required, package.capacity())?;

    let mut prefix = [0u8; PLAIN_PREFIX];
    prefix[..HEADER_SIZE].copy_from_slice(&PackageHeader::new(PackageType::Plain).to_bytes());
    prefix[HEADER_SIZE..].copy_from_slice(sender.public_key().as_bytes());

    let boxed = sealed::seal(entropy, sender, recipient, package.payload, &prefix)?;
    package.write(&[&prefix, &boxed])
}

/// Decode a plain package addressed to `recipient`.
pub fn open_plain(recipient: &KeyPair, input: &[u8]) -> Result<PlainContents> {
    check_type(input, PackageType::Plain)?;
    check_len(input, PLAIN_PREFIX + SEALED_OVERHEAD)?;

    let (prefix, boxed) = input.split_at(PLAIN_PREFIX);
    let sender = read_public(&prefix[HEADER_SIZE..])?;
    let payload = Zeroizing::new(sealed::open(recipient, &sender, boxed, prefix)?);

    Ok(PlainContents { sender, payload })
}

/// Encode a greeting carrying `endpoint_id` and the package payload.
///
/// Returns the binding the manager's response has to carry.
pub fn encode_greeting<E: EntropySource + ?Sized>(
    entropy: &mut E,
    endpoint: &KeyPair,
    manager: &PublicKey,
    endpoint_id: &[u8],
    package: &mut Package<'_>,
) -> Result<GreetingBinding> {
    if endpoint_id.is_empty() {
        return Err(PsError::Argument("endpoint id must not be empty".to_string()));
    }
    let id_len = u16::try_from(endpoint_id.len()).map_err(|_| PsError::InputTooBig {
        len: endpoint_id.len(),
        max: u16::MAX as usize,
    })?;

    let required = sizing::greeting_package_size(endpoint_id.len(), package.payload.len())?;
    ensure_capacity(required, package.capacity())?;

    let mut prefix = [0u8; GREETING_PREFIX];
    prefix[..HEADER_SIZE].copy_from_slice(&PackageHeader::new(PackageType::Greeting).to_bytes());
    prefix[HEADER_SIZE..].copy_from_slice(endpoint.public_key().as_bytes());

    let mut plaintext =
        Zeroizing::new(Vec::with_capacity(ID_LEN_SIZE + endpoint_id.len() + package.payload.len()));
    plaintext.extend_from_slice(&id_len.to_le_bytes());
    plaintext.extend_from_slice(endpoint_id);
    plaintext.extend_from_slice(package.payload);

    let boxed = sealed::seal(entropy, endpoint, manager, &plaintext, &prefix)?;
    let binding = GreetingBinding::from_box(&boxed)?;
    package.write(&[&prefix, &boxed])?;
    Ok(binding)
}

/// Decode a greeting addressed to `manager`.
pub fn decode_greeting(manager: &KeyPair, input: &[u8]) -> Result<GreetingContents> {
    check_type(input, PackageType::Greeting)?;
    check_len(input, GREETING_PREFIX + SEALED_OVERHEAD + ID_LEN_SIZE)?;

    let (prefix, boxed) = input.split_at(GREETING_PREFIX);
    let endpoint_public = read_public(&prefix[HEADER_SIZE..])?;
    let plaintext = Zeroizing::new(sealed::open(manager, &endpoint_public, boxed, prefix)?);

    if plaintext.len() < ID_LEN_SIZE {
        return Err(PsError::BadData("greeting body too short".to_string()));
    }
    let id_len = u16::from_le_bytes([plaintext[0], plaintext[1]]) as usize;
    let body = &plaintext[ID_LEN_SIZE..];
    if id_len == 0 {
        return Err(PsError::InputTooSmall("greeting carries an empty endpoint id".to_string()));
    }
    if id_len > body.len() {
        return Err(PsError::BadData(format!(
            "endpoint id length {id_len} exceeds greeting body of {} bytes",
            body.len()
        )));
    }

    Ok(GreetingContents {
        endpoint_public,
        binding: GreetingBinding::from_box(boxed)?,
        endpoint_id: body[..id_len].to_vec(),
        payload: Zeroizing::new(body[id_len..].to_vec()),
    })
}

fn response_aad(prefix: &[u8], binding: &GreetingBinding) -> [u8; RESPONSE_PREFIX + NONCE_SIZE] {
    let mut aad = [0u8; RESPONSE_PREFIX + NONCE_SIZE];
    aad[..RESPONSE_PREFIX].copy_from_slice(prefix);
    aad[RESPONSE_PREFIX..].copy_from_slice(binding.as_bytes());
    aad
}

/// Encode the manager's response to the greeting identified by `binding`.
pub fn encode_response<E: EntropySource + ?Sized>(
    entropy: &mut E,
    manager: &KeyPair,
    endpoint: &PublicKey,
    binding: &GreetingBinding,
    session_id: &SessionId,
    response_public: &PublicKey,
    package: &mut Package<'_>,
) -> Result<()> {
    let required = sizing::response_package_size(SESSION_ID_BYTES, package.payload.len())?;
    ensure_capacity(required, package.capacity())?;

    let mut prefix = [0u8; RESPONSE_PREFIX];
    prefix[..HEADER_SIZE].copy_from_slice(&PackageHeader::new(PackageType::Response).to_bytes());
    prefix[HEADER_SIZE..SESSION_PREFIX].copy_from_slice(session_id.as_bytes());
    prefix[SESSION_PREFIX..].copy_from_slice(response_public.as_bytes());

    let aad = response_aad(&prefix, binding);
    let boxed = sealed::seal(entropy, manager, endpoint, package.payload, &aad)?;
    package.write(&[&prefix, &boxed])
}

/// Decode a response sent by `manager` to `endpoint` for the greeting
/// identified by `binding`. A response to any other greeting fails to
/// authenticate.
pub fn decode_response(
    endpoint: &KeyPair,
    manager: &PublicKey,
    binding: &GreetingBinding,
    input: &[u8],
) -> Result<ResponseContents> {
    check_type(input, PackageType::Response)?;
    check_len(input, RESPONSE_PREFIX + SEALED_OVERHEAD)?;

    let (prefix, boxed) = input.split_at(RESPONSE_PREFIX);
    let aad = response_aad(prefix, binding);
    let payload = Zeroizing::new(sealed::open(endpoint, manager, boxed, &aad)?);

    Ok(ResponseContents {
        session_id: SessionId::from_slice(&prefix[HEADER_SIZE..SESSION_PREFIX])?,
        response_public: read_public(&prefix[SESSION_PREFIX..])?,
        payload,
    })
}

fn session_prefix(package_type: PackageType, session_id: &SessionId) -> [u8; SESSION_PREFIX] {
    let mut prefix = [0u8; SESSION_PREFIX];
    prefix[..HEADER_SIZE].copy_from_slice(&PackageHeader::new(package_type).to_bytes());
    prefix[HEADER_SIZE..].copy_from_slice(session_id.as_bytes());
    prefix
}

/// Encode a data package under an established session key.
pub fn encode_data<E: EntropySource + ?Sized>(
    entropy: &mut E,
    key: &AeadCipher,
    session_id: &SessionId,
    seq: u64,
    package: &mut Package<'_>,
) -> Result<()> {
    let required = sizing::data_package_size(SESSION_ID_BYTES, package.payload.len())?;
    ensure_capacity(required, package.capacity())?;

    let prefix = session_prefix(PackageType::Data, session_id);

    let mut plaintext = Zeroizing::new(Vec::with_capacity(SEQ_SIZE + package.payload.len()));
    plaintext.extend_from_slice(&seq.to_le_bytes());
    plaintext.extend_from_slice(package.payload);

    let sealed = key.seal(entropy, &plaintext, &prefix)?;
    package.write(&[&prefix, &sealed])
}

/// Decode a data package under an established session key.
pub fn decode_data(key: &AeadCipher, input: &[u8]) -> Result<DataContents> {
    check_type(input, PackageType::Data)?;
    check_len(input, SESSION_PREFIX + SEALED_OVERHEAD + SEQ_SIZE)?;

    let (prefix, sealed) = input.split_at(SESSION_PREFIX);
    let plaintext = Zeroizing::new(key.decrypt(sealed, prefix)?);
    if plaintext.len() < SEQ_SIZE {
        return Err(PsError::BadData("data body too short".to_string()));
    }

    Ok(DataContents {
        session_id: SessionId::from_slice(&prefix[HEADER_SIZE..])?,
        seq: read_seq(&plaintext),
        payload: Zeroizing::new(plaintext[SEQ_SIZE..].to_vec()),
    })
}

/// Encode a stop package under an established session key.
pub fn encode_stop<E: EntropySource + ?Sized>(
    entropy: &mut E,
    key: &AeadCipher,
    session_id: &SessionId,
    seq: u64,
    reason: u8,
    package: &mut Package<'_>,
) -> Result<()> {
    let required = sizing::stop_package_size(SESSION_ID_BYTES, package.payload.len())?;
    ensure_capacity(required, package.capacity())?;

    let prefix = session_prefix(PackageType::Stop, session_id);

    let mut plaintext = Zeroizing::new(Vec::with_capacity(SEQ_SIZE + 1 + package.payload.len()));
    plaintext.extend_from_slice(&seq.to_le_bytes());
    plaintext.push(reason);
    plaintext.extend_from_slice(package.payload);

    let sealed = key.seal(entropy, &plaintext, &prefix)?;
    package.write(&[&prefix, &sealed])
}

/// Decode a stop package under an established session key.
pub fn decode_stop(key: &AeadCipher, input: &[u8]) -> Result<StopContents> {
    check_type(input, PackageType::Stop)?;
    check_len(input, SESSION_PREFIX + SEALED_OVERHEAD + SEQ_SIZE + 1)?;

    let (prefix, sealed) = input.split_at(SESSION_PREFIX);
    let plaintext = Zeroizing::new(key.decrypt(sealed, prefix)?);
    if plaintext.len() < SEQ_SIZE + 1 {
        return Err(PsError::BadData("stop body too short".to_string()));
    }

    Ok(StopContents {
        session_id: SessionId::from_slice(&prefix[HEADER_SIZE..])?,
        seq: read_seq(&plaintext),
        reason: plaintext[SEQ_SIZE],
        payload: Zeroizing::new(plaintext[SEQ_SIZE + 1..].to_vec()),
    })
}
