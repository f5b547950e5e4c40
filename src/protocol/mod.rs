//! Protected session engine.
//!
//! Drives the greeting/response handshake, per-session data exchange and
//! session teardown for both roles. The engine is synchronous and performs no
//! I/O: transport, session storage and scratch memory all go through injected
//! callbacks, and every nonce or key is drawn from an injected
//! [`EntropySource`](crate::codec::crypto::EntropySource).
//!
//! # Message Flow
//!
//! ```text
//! Endpoint                              Manager
//!    |                                     |
//!    |------ GREETING (id, payload) ----->|  on_greeting() authorizes
//!    |                                     |  session id assigned
//!    |<----- RESPONSE (sid, payload) -----|  generate_response()
//!    |  on_session_established()          |
//!    |                                     |
//!    |====== DATA (sid, seq, payload) ===>|  get_session(), on_data()
//!    |<===== DATA (sid, seq, payload) ====|
//!    |                                     |
//!    |------ STOP (sid, reason) --------->|  on_stop()
//! ```
//!
//! # State Machine
//!
//! | Phase              | Endpoint                 | Manager                  |
//! |--------------------|--------------------------|--------------------------|
//! | `Idle`             | before the greeting      | never stored             |
//! | `AwaitingResponse` | greeting sent            | n/a                      |
//! | `Established`      | response accepted        | greeting accepted        |
//! | `Closed`           | stop sent or received    | stop sent or received    |
//!
//! Data and stop operations on any phase other than `Established` fail with
//! `WrongState`. A failing operation, including a vetoing callback, leaves
//! the caller's session exactly as it was.
//!
//! # Usage
//!
//! ```rust,ignore
//! use psess::protocol::{Endpoint, GreetingInfo, Manager};
//! use psess::codec::{sizing, Package};
//! use psess::codec::crypto::OsEntropy;
//!
//! let mut endpoint = Endpoint::new(OsEntropy);
//! let info = GreetingInfo::new(device_id, manager_public);
//! let mut out = vec![0u8; sizing::greeting_package_size(device_id.len(), payload.len())?];
//! let mut package = Package::new(payload, &mut out);
//! let mut session = endpoint.generate_greeting(&info, None, &mut package)?;
//! // send package.as_bytes(), receive the response...
//! endpoint.process_incoming_package(&mut session, &response, &mut handler)?;
//! ```

mod callbacks;
mod endpoint;
mod manager;
mod session;
mod types;

pub use callbacks::{BufferHandler, CallbackError, EndpointHandler, ManagerHandler, OutputBuffer};
pub use endpoint::Endpoint;
pub use manager::{Manager, ManagerEvent};
pub use session::{Session, SessionPhase};
pub use types::{GreetingInfo, Role, StopInfo, StopReason};
