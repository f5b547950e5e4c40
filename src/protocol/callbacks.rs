//! Event dispatch.
//!
//! The engine never performs I/O or allocation policy on its own: decrypted
//! payloads are staged in a scratch buffer obtained from the consumer and
//! handed to the consumer's event callbacks. Every acquired buffer is
//! released again on every exit path, including when the consumer callback
//! fails.

use thiserror::Error;
use zeroize::Zeroize;

use super::session::Session;
use super::types::{GreetingInfo, StopInfo};
use crate::codec::SessionId;
use crate::error::{PsError, Result};

/// A consumer callback vetoed the operation
#[derive(Debug, Clone, Error)]
#[error("{reason}")]
pub struct CallbackError {
    reason: String,
}

impl CallbackError {
    /// Create a callback error with a reason
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    /// Reason given by the consumer
    pub fn reason(&self) -> &str {
        &self.reason
    }
}

/// Scratch buffer lent by the consumer to stage decrypted payloads.
///
/// Contents are wiped on drop.
#[derive(Debug, Default)]
pub struct OutputBuffer {
    bytes: Vec<u8>,
}

impl OutputBuffer {
    /// Zero-filled buffer of `len` bytes
    pub fn with_len(len: usize) -> Self {
        Self {
            bytes: vec![0u8; len],
        }
    }

    /// Wrap an existing allocation
    pub fn from_vec(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    /// Buffer length
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether the buffer is empty
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Buffer contents
    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    /// Mutable buffer contents
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.bytes
    }

    /// Take back the allocation; the contents are wiped first
    pub fn into_vec(mut self) -> Vec<u8> {
        self.bytes.zeroize();
        std::mem::take(&mut self.bytes)
    }
}

impl Drop for OutputBuffer {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

/// Scratch-buffer negotiation.
///
/// The defaults allocate and drop a fresh `Vec`; hosts with their own memory
/// pools override both.
pub trait BufferHandler {
    /// Lend a buffer of at least `capacity` bytes
    fn acquire_buffer(&mut self, capacity: usize) -> std::result::Result<OutputBuffer, CallbackError> {
        Ok(OutputBuffer::with_len(capacity))
    }

    /// Take back a buffer lent by [`BufferHandler::acquire_buffer`]
    fn release_buffer(&mut self, buffer: OutputBuffer) {
        drop(buffer);
    }
}

/// Endpoint event callbacks
pub trait EndpointHandler: BufferHandler {
    /// The manager's response was accepted; `payload` is its content
    fn on_session_established(
        &mut self,
        session_id: &SessionId,
        payload: &[u8],
    ) -> std::result::Result<(), CallbackError>;

    /// A data package arrived
    fn on_data(&mut self, session_id: &SessionId, payload: &[u8]) -> std::result::Result<(), CallbackError>;

    /// The manager stopped the session
    fn on_stop(&mut self, stop: &StopInfo, payload: &[u8]) -> std::result::Result<(), CallbackError>;
}

/// Manager event callbacks
pub trait ManagerHandler: BufferHandler {
    /// An endpoint greeted; returning an error refuses it and no response is
    /// produced
    fn on_greeting(&mut self, greeting: &GreetingInfo, payload: &[u8]) -> std::result::Result<(), CallbackError>;

    /// A data package arrived
    fn on_data(&mut self, session_id: &SessionId, payload: &[u8]) -> std::result::Result<(), CallbackError>;

    /// The endpoint stopped the session
    fn on_stop(&mut self, stop: &StopInfo, payload: &[u8]) -> std::result::Result<(), CallbackError>;

    /// Look up a persisted session by identifier
    fn get_session(&mut self, session_id: &SessionId) -> std::result::Result<Option<Session>, CallbackError>;
}

/// Stage `plaintext` in a consumer buffer, run `consume` on it, and release
/// the buffer whatever the outcome.
pub(crate) fn deliver<H, F>(handler: &mut H, plaintext: &[u8], consume: F) -> Result<()>
where
    H: BufferHandler + ?Sized,
    F: FnOnce(&mut H, &[u8]) -> std::result::Result<(), CallbackError>,
{
    let mut buffer = handler.acquire_buffer(plaintext.len())?;
    if buffer.len() < plaintext.len() {
        let provided = buffer.len();
        handler.release_buffer(buffer);
        return Err(PsError::OutputTooSmall {
            required: plaintext.len(),
            provided,
        });
    }

    buffer.as_mut_slice()[..plaintext.len()].copy_from_slice(plaintext);
    let outcome = consume(handler, &buffer.as_slice()[..plaintext.len()]);
    handler.release_buffer(buffer);
    outcome.map_err(PsError::from)
}
