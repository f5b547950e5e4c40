//! Device identity application layer.
//!
//! Fixed-layout identity messages exchanged between devices and an identity
//! authority, carried as protected-session payloads:
//!
//! - **Activation**: a device registers its identifier and static key
//! - **Validation**: a device asks whether a peer it met is genuine, proving
//!   the contact with the peer's cross-signature over its own identifier
//! - **Reputation**: a device reports the outcome of that contact, spending
//!   the one-time token the validation handed out
//!
//! ```rust,ignore
//! use psess::atmi::{ActivationRequest, Authority, DeviceClient, DeviceContext, DeviceId};
//! use psess::codec::crypto::OsEntropy;
//!
//! let mut client = DeviceClient::new(OsEntropy, DeviceContext::new(device_keys), authority_pk);
//! let mut exchange = client.pack_activation_request(&ActivationRequest { requestor: id })?;
//! // send exchange.packet(); the authority answers with authority.handle(...)
//! let response = client.unpack_activation_response(&mut exchange, &reply)?;
//! ```

mod authority;
mod client;
pub mod crosssign;
mod error;
pub mod messages;

pub use authority::{Authority, Request, RequestHandler};
pub use client::{DeviceClient, DeviceContext, MessageSession};
pub use crosssign::{cross_sign, verify};
pub use error::{AtmiError, Result, ATMI_EBADF, ATMI_EFAULT, ATMI_EINVAL, ATMI_ENOENT};
pub use messages::{
    ActivationRequest, ActivationResponse, CrossSignature, DeviceId, MessageType,
    ReputationCounters, ReputationRequest, ReputationResponse, ReputationToken,
    ValidationRequest, ValidationResponse,
};
