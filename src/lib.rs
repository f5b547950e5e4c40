//! # Protected Sessions
//!
//! Mutually authenticated, encrypted two-party sessions between constrained
//! endpoints (devices) and a session manager, plus a device identity
//! application layer riding on top of them.
//!
//! ## Protocol Overview
//!
//! An endpoint opens a session by greeting the manager's long-lived public
//! key. The manager authorizes the greeting, assigns a session identifier and
//! answers with a response; from then on both sides exchange data packages
//! under directional session keys until either side sends a stop.
//!
//! ```text
//! Endpoint                              Manager
//!    |                                     |
//!    |------ GREETING ------------------->|
//!    |<----- RESPONSE --------------------|
//!    |====== DATA ======================>|
//!    |<===== DATA =======================|
//!    |------ STOP ----------------------->|
//! ```
//!
//! ### Package Types
//!
//! | Type     | Direction          | Protection                             |
//! |----------|--------------------|----------------------------------------|
//! | PLAIN    | any                | box, no session                        |
//! | GREETING | Endpoint→Manager   | box to manager static key              |
//! | RESPONSE | Manager→Endpoint   | box from manager static key            |
//! | DATA     | Bidirectional      | session AEAD, sequence numbered        |
//! | STOP     | Bidirectional      | session AEAD, carries a reason         |
//!
//! The engine performs no I/O, never logs and never allocates policy on its
//! own: randomness, scratch buffers, session lookup and event handling are
//! injected by the host.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use psess::codec::crypto::{KeyPair, OsEntropy};
//! use psess::codec::{PackageBuffer, PackageType};
//! use psess::protocol::{Endpoint, GreetingInfo, Manager};
//!
//! let manager_keys = KeyPair::generate(&mut OsEntropy)?;
//! let mut manager = Manager::new(OsEntropy, manager_keys);
//! let mut endpoint = Endpoint::new(OsEntropy);
//!
//! let info = GreetingInfo::new(&b"device-1"[..], *manager.public_key());
//! let mut buffer = PackageBuffer::new(PackageType::Greeting, 8, payload.len())?;
//! let mut package = buffer.package(payload);
//! let mut session = endpoint.generate_greeting(&info, None, &mut package)?;
//!
//! let event = manager.process_incoming_package(package.as_bytes(), &mut store)?;
//! ```
//!
//! ## Modules
//!
//! - [`codec`]: Wire headers, package sizing, package encoding and crypto
//! - [`protocol`]: Session engine for both roles and its callbacks
//! - [`atmi`]: Device identity messages, cross-signing, client and authority
//! - [`config`]: Configuration management
//! - [`error`]: Error types and result aliases

pub mod atmi;
pub mod codec;
pub mod config;
pub mod error;
pub mod protocol;

// Re-exports for convenience
pub use codec::crypto::{EntropySource, KeyPair, OsEntropy, PublicKey};
pub use codec::{Package, PackageBuffer, PackageType, SessionId};
pub use config::Config;
pub use error::{PsError, Result};
pub use protocol::{Endpoint, Manager, Session, SessionPhase};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Wire protocol version carried in every package header
pub const PROTOCOL_VERSION: u8 = codec::VERSION;
