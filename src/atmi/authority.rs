//! Authority side of the identity exchange.
//!
//! The authority runs a [`Manager`] engine. Requests arrive as greeting
//! payloads, are answered by a [`RequestHandler`], and the answer leaves as
//! the payload of the session's response package. Cross-signatures in
//! validation requests are checked here, before the handler sees them.

use tracing::{debug, warn};

use super::crosssign;
use super::error::{AtmiError, Result, ATMI_EFAULT, ATMI_ENOENT};
use super::messages::{
    self, ActivationRequest, ActivationResponse, DeviceId, MessageType, ReputationRequest,
    ReputationResponse, ValidationRequest, ValidationResponse,
};
use crate::codec::crypto::{EntropySource, KeyPair, PublicKey};
use crate::codec::{PackageBuffer, PackageType, SessionId, SESSION_ID_BYTES};
use crate::config::EngineConfig;
use crate::error::PsError;
use crate::protocol::{
    BufferHandler, CallbackError, GreetingInfo, Manager, ManagerHandler, Session, StopInfo,
};

/// A decoded device request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// Device activation
    Activation(ActivationRequest),
    /// Device-device validation
    Validation(ValidationRequest),
    /// Reputation amendment
    Reputation(ReputationRequest),
}

impl Request {
    /// Decode any request message
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        match messages::peek_message_type(bytes)? {
            MessageType::ActivationRequest => Ok(Request::Activation(messages::decode(bytes)?)),
            MessageType::ValidationRequest => Ok(Request::Validation(messages::decode(bytes)?)),
            MessageType::ReputationRequest => Ok(Request::Reputation(messages::decode(bytes)?)),
            other => Err(AtmiError::NotFound(format!("{other:?} is not a request"))),
        }
    }

    /// Message type on the wire
    pub fn message_type(&self) -> MessageType {
        match self {
            Request::Activation(_) => MessageType::ActivationRequest,
            Request::Validation(_) => MessageType::ValidationRequest,
            Request::Reputation(_) => MessageType::ReputationRequest,
        }
    }

    /// Device that sent the request
    pub fn requestor(&self) -> &DeviceId {
        match self {
            Request::Activation(r) => &r.requestor,
            Request::Validation(r) => &r.requestor,
            Request::Reputation(r) => &r.requestor,
        }
    }
}

/// Device registry and reputation store behind an [`Authority`].
///
/// `requestor_key` is the key the requestor greeted with, already
/// authenticated by the handshake.
pub trait RequestHandler {
    /// Register or confirm a device
    fn activate(&mut self, request: &ActivationRequest, requestor_key: &PublicKey) -> ActivationResponse;

    /// Public key a device activated with, if known
    fn device_public_key(&mut self, device_id: &DeviceId) -> Option<PublicKey>;

    /// Answer a validation request whose cross-signature already verified
    fn validate(&mut self, request: &ValidationRequest, requestor_key: &PublicKey) -> ValidationResponse;

    /// Record the outcome of a contact between two devices
    fn amend_reputation(
        &mut self,
        request: &ReputationRequest,
        requestor_key: &PublicKey,
    ) -> ReputationResponse;
}

/// Answers device requests
#[derive(Debug)]
pub struct Authority<E: EntropySource> {
    manager: Manager<E>,
    keys: KeyPair,
}

impl<E: EntropySource> Authority<E> {
    /// Authority with its long-lived key pair
    pub fn new(entropy: E, keys: KeyPair) -> Self {
        Self {
            manager: Manager::new(entropy, keys.clone()),
            keys,
        }
    }

    /// Replace the engine bounds
    pub fn with_engine_config(mut self, config: EngineConfig) -> Result<Self> {
        self.manager = self.manager.with_engine_config(config)?;
        Ok(self)
    }

    /// Authority public key devices greet
    pub fn public_key(&self) -> &PublicKey {
        self.keys.public_key()
    }

    /// Process one request packet and return the response packet
    pub fn handle<H: RequestHandler + ?Sized>(&mut self, input: &[u8], handler: &mut H) -> Result<Vec<u8>> {
        let mut collector = RequestCollector {
            handler,
            keys: &self.keys,
            reply: None,
            failure: None,
        };

        let outcome = self.manager.process_incoming_package(input, &mut collector);
        let RequestCollector { reply, failure, .. } = collector;
        let event = match (outcome, failure) {
            (Ok(event), _) => event,
            (Err(PsError::CallbackAborted(_)), Some(failure)) => return Err(failure),
            (Err(e), _) => {
                warn!(error = %e, "discarding request package");
                return Err(e.into());
            }
        };

        if event.kind != PackageType::Greeting {
            return Err(AtmiError::NotFound(format!(
                "expected a request greeting, got {:?}",
                event.kind
            )));
        }
        let reply = reply.ok_or_else(|| AtmiError::NotFound("greeting carried no request".to_string()))?;

        let mut session = event.session;
        let mut buffer = PackageBuffer::new(PackageType::Response, SESSION_ID_BYTES, reply.len())?;
        let mut package = buffer.package(&reply);
        self.manager.generate_response(&mut session, &mut package)?;
        let packet = package.as_bytes().to_vec();

        debug!(session = ?session.id(), bytes = packet.len(), "answered request");
        Ok(packet)
    }
}

struct RequestCollector<'a, H: ?Sized> {
    handler: &'a mut H,
    keys: &'a KeyPair,
    reply: Option<Vec<u8>>,
    failure: Option<AtmiError>,
}

impl<H: RequestHandler + ?Sized> RequestCollector<'_, H> {
    fn answer(&mut self, greeting: &GreetingInfo, payload: &[u8]) -> Result<Vec<u8>> {
        let requestor_key = greeting
            .endpoint_public
            .ok_or_else(|| AtmiError::InvalidArgument("greeting without sender key".to_string()))?;
        let request = Request::decode(payload)?;
        if greeting.endpoint_id.as_slice() != request.requestor().as_bytes() {
            return Err(AtmiError::InvalidArgument(
                "greeting id does not match the requestor".to_string(),
            ));
        }

        let reply = match &request {
            Request::Activation(r) => messages::encode(&self.handler.activate(r, &requestor_key)),
            Request::Validation(r) => {
                messages::encode(&self.validate(r, &requestor_key))
            }
            Request::Reputation(r) => {
                messages::encode(&self.handler.amend_reputation(r, &requestor_key))
            }
        };
        debug!(request = ?request.message_type(), "request answered");
        Ok(reply)
    }

    fn validate(&mut self, request: &ValidationRequest, requestor_key: &PublicKey) -> ValidationResponse {
        let Some(subject_key) = self.handler.device_public_key(&request.subject) else {
            debug!(subject = ?request.subject, "validation for unknown subject");
            return ValidationResponse::failure(ATMI_ENOENT);
        };

        if let Err(e) = crosssign::verify(
            &request.requestor_xsigned,
            &request.requestor,
            &subject_key,
            self.keys,
        ) {
            warn!(subject = ?request.subject, error = %e, "cross-signature rejected");
            return ValidationResponse::failure(ATMI_EFAULT);
        }

        self.handler.validate(request, requestor_key)
    }
}

impl<H: ?Sized> BufferHandler for RequestCollector<'_, H> {}

impl<H: RequestHandler + ?Sized> ManagerHandler for RequestCollector<'_, H> {
    fn on_greeting(&mut self, greeting: &GreetingInfo, payload: &[u8]) -> std::result::Result<(), CallbackError> {
        match self.answer(greeting, payload) {
            Ok(reply) => {
                self.reply = Some(reply);
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "refusing request");
                let reason = e.to_string();
                self.failure = Some(e);
                Err(CallbackError::new(reason))
            }
        }
    }

    fn on_data(&mut self, _: &SessionId, _: &[u8]) -> std::result::Result<(), CallbackError> {
        Err(CallbackError::new("identity exchanges carry no data packages"))
    }

    fn on_stop(&mut self, _: &StopInfo, _: &[u8]) -> std::result::Result<(), CallbackError> {
        Ok(())
    }

    fn get_session(&mut self, _: &SessionId) -> std::result::Result<Option<Session>, CallbackError> {
        Ok(None)
    }
}
