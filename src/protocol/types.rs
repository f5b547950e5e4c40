//! Value types shared by both session roles.

use serde::{Deserialize, Serialize};

use crate::codec::crypto::PublicKey;
use crate::codec::SessionId;

/// Which side of the handshake a session belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Device side, initiates with a greeting
    Endpoint,
    /// Server side, answers greetings
    Manager,
}

/// Handshake parameters.
///
/// The endpoint fills in its identifier and the manager's public key. On the
/// manager side the engine also fills in the public key the endpoint greeted
/// with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GreetingInfo {
    /// Endpoint identifier, carried encrypted inside the greeting
    pub endpoint_id: Vec<u8>,
    /// Manager's long-lived public key
    pub manager_public: PublicKey,
    /// Key the endpoint greeted with (populated on the manager side)
    pub endpoint_public: Option<PublicKey>,
}

impl GreetingInfo {
    /// Greeting parameters for an endpoint
    pub fn new(endpoint_id: impl Into<Vec<u8>>, manager_public: PublicKey) -> Self {
        Self {
            endpoint_id: endpoint_id.into(),
            manager_public,
            endpoint_public: None,
        }
    }
}

/// Why a session was stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StopReason {
    /// Orderly shutdown
    Shutdown,
    /// Refused by the peer
    Refused,
    /// Peer unreachable
    Unreachable,
    /// Reason code this build does not know
    Other(u8),
}

impl StopReason {
    /// Parse a reason byte
    pub fn from_byte(b: u8) -> Self {
        match b {
            1 => StopReason::Shutdown,
            2 => StopReason::Refused,
            3 => StopReason::Unreachable,
            other => StopReason::Other(other),
        }
    }

    /// Reason byte
    pub fn as_byte(&self) -> u8 {
        match self {
            StopReason::Shutdown => 1,
            StopReason::Refused => 2,
            StopReason::Unreachable => 3,
            StopReason::Other(b) => *b,
        }
    }
}

/// Details of a received stop package
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StopInfo {
    /// Session that was stopped
    pub session_id: SessionId,
    /// Reason given by the peer
    pub reason: StopReason,
}
