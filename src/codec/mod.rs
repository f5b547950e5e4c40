//! Package codec for protected sessions.
//!
//! This module turns payloads into authenticated-encrypted packages and back.
//! It holds no session state: every function takes its keys, session id and
//! sequence number explicitly.
//!
//! # Package Types
//!
//! | Type     | Byte | Direction          | Keyed by                         |
//! |----------|------|--------------------|----------------------------------|
//! | Plain    | 0x01 | Either             | Box (sender -> recipient)        |
//! | Greeting | 0x02 | Endpoint -> Manager| Box (endpoint -> manager static) |
//! | Response | 0x03 | Manager -> Endpoint| Box (manager static -> endpoint) |
//! | Data     | 0x04 | Either             | Directional session key          |
//! | Stop     | 0x05 | Either             | Directional session key          |
//!
//! # Sizing
//!
//! Callers size every output buffer through [`sizing`] first. An encoder
//! handed a shorter buffer fails with `OutputTooSmall` before any
//! cryptographic work and leaves the buffer untouched.
//!
//! # Usage
//!
//! ```rust,ignore
//! use psess::codec::{sizing, open_plain, seal_plain, Package};
//! use psess::codec::crypto::{KeyPair, OsEntropy};
//!
//! let mut out = vec![0u8; sizing::plain_package_size(payload.len())?];
//! let mut package = Package::new(payload, &mut out);
//! seal_plain(&mut OsEntropy, &sender, recipient.public_key(), &mut package)?;
//! let plain = open_plain(&recipient, package.as_bytes())?;
//! ```

pub mod crypto;
mod header;
pub mod package;
pub mod sizing;

pub use header::{
    peek_type, PackageHeader, PackageType, SessionId, HEADER_SIZE, MAGIC, SESSION_ID_BYTES,
    VERSION,
};
pub use package::{open_plain, peek_session_id, seal_plain, GreetingBinding, Package, PlainContents};
pub use sizing::PackageBuffer;
