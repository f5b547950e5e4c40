//! Session state.
//!
//! A [`Session`] is owned by the caller between protocol steps. It carries the
//! manager-assigned identifier, the lifecycle phase, both directional session
//! keys and the per-direction sequence counters. Secrets are zeroized on drop
//! and redacted from `Debug`; serialization happens only at the persistence
//! boundary through [`Session::to_bytes`] / [`Session::from_bytes`].
//!
//! # Key schedule
//!
//! ```text
//! ikm          = DH(response, endpoint) || DH(manager, endpoint)
//! okm[64]      = HKDF-SHA256(salt = session_id, ikm, info = "psess/v2/session")
//! e2m || m2e   = okm
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use super::types::{Role, StopReason};
use crate::codec::crypto::{AeadCipher, EntropySource, KeyMaterial, KeyPair, PublicKey, KEY_SIZE};
use crate::codec::package::{self, DataContents, GreetingBinding, Package, StopContents};
use crate::codec::SessionId;
use crate::error::{PsError, Result};

const SESSION_KEY_INFO: &[u8] = b"psess/v2/session";

/// Session lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionPhase {
    /// No handshake yet
    Idle,
    /// Greeting sent, waiting for the manager's response (endpoint only)
    AwaitingResponse,
    /// Keys derived, ready for data
    Established,
    /// Stopped; terminal
    Closed,
}

#[derive(Clone, Default, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
struct SessionSecrets {
    /// Endpoint: key the greeting was sent with. Manager: per-session
    /// response key until the response package is generated.
    handshake: Option<[u8; KEY_SIZE]>,
    send_key: Option<[u8; KEY_SIZE]>,
    recv_key: Option<[u8; KEY_SIZE]>,
}

/// Protected session state
#[derive(Clone, Serialize, Deserialize)]
pub struct Session {
    id: Option<SessionId>,
    role: Role,
    phase: SessionPhase,
    /// Endpoint: manager's static key. Manager: endpoint's greeting key.
    peer_public: Option<PublicKey>,
    endpoint_id: Option<Vec<u8>>,
    /// Greeting the response answers, until the response is through
    greeting: Option<GreetingBinding>,
    /// Last sequence number sent
    send_seq: u64,
    /// Last sequence number accepted
    recv_seq: u64,
    secrets: SessionSecrets,
}

impl Session {
    /// Create an idle session
    pub fn new(role: Role) -> Self {
        Self {
            id: None,
            role,
            phase: SessionPhase::Idle,
            peer_public: None,
            endpoint_id: None,
            greeting: None,
            send_seq: 0,
            recv_seq: 0,
            secrets: SessionSecrets::default(),
        }
    }

    /// Manager-assigned identifier, `None` until the handshake completes
    pub fn id(&self) -> Option<&SessionId> {
        self.id.as_ref()
    }

    /// Role this session was created for
    pub fn role(&self) -> Role {
        self.role
    }

    /// Current phase
    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// Check if session is established
    pub fn is_established(&self) -> bool {
        self.phase == SessionPhase::Established
    }

    /// Check if session is closed
    pub fn is_closed(&self) -> bool {
        self.phase == SessionPhase::Closed
    }

    /// The other party's long-lived or greeting public key
    pub fn peer_public(&self) -> Option<&PublicKey> {
        self.peer_public.as_ref()
    }

    /// Endpoint identifier (known to the endpoint from the start, to the
    /// manager from the greeting)
    pub fn endpoint_id(&self) -> Option<&[u8]> {
        self.endpoint_id.as_deref()
    }

    /// Whether the manager still owes the endpoint a response package
    pub fn has_pending_response(&self) -> bool {
        self.role == Role::Manager && self.secrets.handshake.is_some()
    }

    /// Last sequence number sent
    pub fn last_sent_seq(&self) -> u64 {
        self.send_seq
    }

    /// Last sequence number accepted from the peer
    pub fn last_received_seq(&self) -> u64 {
        self.recv_seq
    }

    /// Serialize for host-controlled persistence
    pub fn to_bytes(&self) -> Result<Zeroizing<Vec<u8>>> {
        Ok(Zeroizing::new(serde_json::to_vec(self)?))
    }

    /// Restore a session persisted with [`Session::to_bytes`]
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Endpoint session right after a greeting went out
    pub(crate) fn awaiting_response(
        handshake: &KeyPair,
        manager_public: PublicKey,
        endpoint_id: &[u8],
        greeting: GreetingBinding,
    ) -> Self {
        let mut session = Self::new(Role::Endpoint);
        session.phase = SessionPhase::AwaitingResponse;
        session.peer_public = Some(manager_public);
        session.endpoint_id = Some(endpoint_id.to_vec());
        session.greeting = Some(greeting);
        session.secrets.handshake = Some(handshake.secret_bytes());
        session
    }

    /// Manager session for an accepted greeting
    pub(crate) fn accept_greeting(
        manager: &KeyPair,
        response: &KeyPair,
        endpoint_public: PublicKey,
        endpoint_id: Vec<u8>,
        greeting: GreetingBinding,
        session_id: SessionId,
    ) -> Result<Self> {
        let (e2m, m2e) = derive_session_keys(
            response.diffie_hellman(&endpoint_public)?,
            manager.diffie_hellman(&endpoint_public)?,
            &session_id,
        )?;

        let mut session = Self::new(Role::Manager);
        session.id = Some(session_id);
        session.phase = SessionPhase::Established;
        session.peer_public = Some(endpoint_public);
        session.endpoint_id = Some(endpoint_id);
        session.greeting = Some(greeting);
        session.secrets.handshake = Some(response.secret_bytes());
        session.secrets.send_key = Some(m2e.to_array()?);
        session.secrets.recv_key = Some(e2m.to_array()?);
        Ok(session)
    }

    /// Endpoint key pair the greeting was sent with
    pub(crate) fn greeting_pair(&self) -> Result<KeyPair> {
        match (&self.role, &self.secrets.handshake) {
            (Role::Endpoint, Some(secret)) => Ok(KeyPair::from_secret(*secret)),
            _ => Err(PsError::wrong_state("process_response", self.phase)),
        }
    }

    /// Greeting the pending response is bound to
    pub(crate) fn greeting_binding(&self, operation: &'static str) -> Result<GreetingBinding> {
        self.greeting
            .ok_or_else(|| PsError::wrong_state(operation, self.phase))
    }

    /// Established copy of an endpoint session; `self` is left untouched
    pub(crate) fn establish(
        &self,
        session_id: SessionId,
        response_public: &PublicKey,
    ) -> Result<Self> {
        self.require_phase("process_response", SessionPhase::AwaitingResponse)?;
        let ours = self.greeting_pair()?;
        let manager_public = self
            .peer_public
            .ok_or_else(|| PsError::wrong_state("process_response", self.phase))?;

        let (e2m, m2e) = derive_session_keys(
            ours.diffie_hellman(response_public)?,
            ours.diffie_hellman(&manager_public)?,
            &session_id,
        )?;

        let mut next = self.clone();
        next.id = Some(session_id);
        next.phase = SessionPhase::Established;
        next.greeting = None;
        next.secrets.handshake.zeroize();
        next.secrets.send_key = Some(e2m.to_array()?);
        next.secrets.recv_key = Some(m2e.to_array()?);
        Ok(next)
    }

    /// Manager's per-session response key, while the response is pending
    pub(crate) fn pending_response(&self) -> Result<KeyPair> {
        match (&self.role, &self.secrets.handshake) {
            (Role::Manager, Some(secret)) if self.is_established() => {
                Ok(KeyPair::from_secret(*secret))
            }
            _ => Err(PsError::wrong_state("generate_response", self.phase)),
        }
    }

    pub(crate) fn clear_pending_response(&mut self) {
        self.greeting = None;
        self.secrets.handshake.zeroize();
    }

    pub(crate) fn require_phase(&self, operation: &'static str, phase: SessionPhase) -> Result<()> {
        if self.phase != phase {
            return Err(PsError::wrong_state(operation, self.phase));
        }
        Ok(())
    }

    fn established_id(&self, operation: &'static str) -> Result<SessionId> {
        self.require_phase(operation, SessionPhase::Established)?;
        self.id.ok_or_else(|| PsError::wrong_state(operation, self.phase))
    }

    fn cipher(key: &Option<[u8; KEY_SIZE]>, operation: &'static str, phase: SessionPhase) -> Result<AeadCipher> {
        let key = key.ok_or_else(|| PsError::wrong_state(operation, phase))?;
        Ok(AeadCipher::new(KeyMaterial::new(key.to_vec()))?)
    }

    fn next_send_seq(&self) -> Result<u64> {
        self.send_seq
            .checked_add(1)
            .ok_or_else(|| PsError::Argument("send sequence exhausted".to_string()))
    }

    /// Encode a data package and advance the send counter
    pub(crate) fn seal_data<E: EntropySource + ?Sized>(
        &mut self,
        entropy: &mut E,
        package: &mut Package<'_>,
    ) -> Result<()> {
        const OP: &str = "generate_data_package";
        let session_id = self.established_id(OP)?;
        let cipher = Self::cipher(&self.secrets.send_key, OP, self.phase)?;
        let seq = self.next_send_seq()?;

        package::encode_data(entropy, &cipher, &session_id, seq, package)?;
        self.send_seq = seq;
        Ok(())
    }

    /// Encode a stop package, advance the send counter and close
    pub(crate) fn seal_stop<E: EntropySource + ?Sized>(
        &mut self,
        entropy: &mut E,
        reason: StopReason,
        package: &mut Package<'_>,
    ) -> Result<()> {
        const OP: &str = "generate_stop_package";
        let session_id = self.established_id(OP)?;
        let cipher = Self::cipher(&self.secrets.send_key, OP, self.phase)?;
        let seq = self.next_send_seq()?;

        package::encode_stop(entropy, &cipher, &session_id, seq, reason.as_byte(), package)?;
        self.send_seq = seq;
        self.close();
        Ok(())
    }

    fn check_incoming(&self, session_id: &SessionId, seq: u64) -> Result<()> {
        if self.id.as_ref() != Some(session_id) {
            return Err(PsError::BadData(format!(
                "package for session {session_id} does not belong to this session"
            )));
        }
        if seq <= self.recv_seq {
            return Err(crate::codec::crypto::CryptoError::Replay {
                received: seq,
                last: self.recv_seq,
            }
            .into());
        }
        Ok(())
    }

    /// Decrypt and validate a data package without mutating the session
    pub(crate) fn open_data(&self, input: &[u8]) -> Result<DataContents> {
        const OP: &str = "process_data_package";
        self.established_id(OP)?;
        let cipher = Self::cipher(&self.secrets.recv_key, OP, self.phase)?;

        let data = package::decode_data(&cipher, input)?;
        self.check_incoming(&data.session_id, data.seq)?;
        Ok(data)
    }

    /// Decrypt and validate a stop package without mutating the session
    pub(crate) fn open_stop(&self, input: &[u8]) -> Result<StopContents> {
        const OP: &str = "process_stop_package";
        self.established_id(OP)?;
        let cipher = Self::cipher(&self.secrets.recv_key, OP, self.phase)?;

        let stop = package::decode_stop(&cipher, input)?;
        self.check_incoming(&stop.session_id, stop.seq)?;
        Ok(stop)
    }

    pub(crate) fn mark_received(&mut self, seq: u64) {
        self.recv_seq = seq;
    }

    pub(crate) fn close(&mut self) {
        self.phase = SessionPhase::Closed;
        self.secrets.zeroize();
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("role", &self.role)
            .field("phase", &self.phase)
            .field("peer_public", &self.peer_public)
            .field("send_seq", &self.send_seq)
            .field("recv_seq", &self.recv_seq)
            .field("secrets", &"[REDACTED]")
            .finish()
    }
}

/// Derive the two directional keys, endpoint-to-manager first.
fn derive_session_keys(
    first: KeyMaterial,
    second: KeyMaterial,
    session_id: &SessionId,
) -> Result<(KeyMaterial, KeyMaterial)> {
    let mut ikm = Zeroizing::new(Vec::with_capacity(KEY_SIZE * 2));
    ikm.extend_from_slice(first.as_bytes());
    ikm.extend_from_slice(second.as_bytes());

    let okm = KeyMaterial::new(ikm.to_vec()).derive(
        session_id.as_bytes(),
        SESSION_KEY_INFO,
        KEY_SIZE * 2,
    )?;
    Ok(okm.split())
}
