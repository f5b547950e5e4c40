//! Device side of the identity exchange.
//!
//! Every request opens its own protected session: the encoded message rides
//! in the greeting (endpoint id = requestor id, static device keys), and the
//! authority answers in the response package.

use tracing::{debug, warn};

use super::crosssign;
use super::error::{AtmiError, Result};
use super::messages::{
    self, ActivationRequest, ActivationResponse, CrossSignature, DeviceId, Message, MessageType,
    ReputationRequest, ReputationResponse, ValidationRequest, ValidationResponse,
};
use crate::codec::crypto::{EntropySource, KeyPair, PublicKey};
use crate::codec::{peek_type, PackageBuffer, PackageType, SessionId};
use crate::config::EngineConfig;
use crate::protocol::{
    BufferHandler, CallbackError, Endpoint, EndpointHandler, GreetingInfo, Session, StopInfo,
};

/// Device key material; the secret is wiped on drop
#[derive(Debug, Clone)]
pub struct DeviceContext {
    keys: KeyPair,
}

impl DeviceContext {
    /// Wrap the device's long-lived key pair
    pub fn new(keys: KeyPair) -> Self {
        Self { keys }
    }

    /// Device public key
    pub fn public_key(&self) -> &PublicKey {
        self.keys.public_key()
    }

    /// Device key pair
    pub fn keys(&self) -> &KeyPair {
        &self.keys
    }
}

/// State carried from packing a request to unpacking its response
#[derive(Debug)]
pub struct MessageSession {
    session: Session,
    expected: MessageType,
    buffer: PackageBuffer,
    written: usize,
}

impl MessageSession {
    /// Packet to send to the authority
    pub fn packet(&self) -> &[u8] {
        &self.buffer.as_slice()[..self.written]
    }

    /// Response type this exchange waits for
    pub fn expected(&self) -> MessageType {
        self.expected
    }

    /// Underlying engine session
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Take the engine session, e.g. to stop it once the response arrived
    pub fn into_session(self) -> Session {
        self.session
    }
}

/// Packs identity requests and unpacks the authority's answers
#[derive(Debug)]
pub struct DeviceClient<E: EntropySource> {
    endpoint: Endpoint<E>,
    context: DeviceContext,
    authority: PublicKey,
}

impl<E: EntropySource> DeviceClient<E> {
    /// Client for the authority reachable under `authority`
    pub fn new(entropy: E, context: DeviceContext, authority: PublicKey) -> Self {
        Self {
            endpoint: Endpoint::new(entropy),
            context,
            authority,
        }
    }

    /// Client with explicit engine bounds
    pub fn with_config(
        entropy: E,
        context: DeviceContext,
        authority: PublicKey,
        config: EngineConfig,
    ) -> Result<Self> {
        Ok(Self {
            endpoint: Endpoint::with_config(entropy, config)?,
            context,
            authority,
        })
    }

    /// Device key material
    pub fn context(&self) -> &DeviceContext {
        &self.context
    }

    /// Authority public key
    pub fn authority(&self) -> &PublicKey {
        &self.authority
    }

    /// Pack a device activation request
    pub fn pack_activation_request(&mut self, request: &ActivationRequest) -> Result<MessageSession> {
        self.pack(&request.requestor, request)
    }

    /// Pack a device-device validation request
    pub fn pack_validation_request(&mut self, request: &ValidationRequest) -> Result<MessageSession> {
        self.pack(&request.requestor, request)
    }

    /// Pack a reputation amendment request
    pub fn pack_reputation_request(&mut self, request: &ReputationRequest) -> Result<MessageSession> {
        self.pack(&request.requestor, request)
    }

    /// Unpack the answer to an activation request
    pub fn unpack_activation_response(
        &self,
        exchange: &mut MessageSession,
        input: &[u8],
    ) -> Result<ActivationResponse> {
        self.unpack(exchange, input)
    }

    /// Unpack the answer to a validation request
    pub fn unpack_validation_response(
        &self,
        exchange: &mut MessageSession,
        input: &[u8],
    ) -> Result<ValidationResponse> {
        self.unpack(exchange, input)
    }

    /// Unpack the answer to a reputation request
    pub fn unpack_reputation_response(
        &self,
        exchange: &mut MessageSession,
        input: &[u8],
    ) -> Result<ReputationResponse> {
        self.unpack(exchange, input)
    }

    /// Cross-sign another device's id for the authority
    pub fn cross_sign(&mut self, device_id: &DeviceId) -> Result<CrossSignature> {
        crosssign::cross_sign(
            self.endpoint.entropy_mut(),
            device_id,
            &self.context.keys,
            &self.authority,
        )
    }

    fn pack<M: Message>(&mut self, requestor: &DeviceId, request: &M) -> Result<MessageSession> {
        let expected = M::TYPE.response_type().ok_or_else(|| {
            AtmiError::InvalidArgument(format!("{:?} is not a request", M::TYPE))
        })?;
        let payload = messages::encode(request);
        let info = GreetingInfo::new(requestor.as_bytes().to_vec(), self.authority);

        let mut buffer = PackageBuffer::new(
            PackageType::Greeting,
            info.endpoint_id.len(),
            payload.len(),
        )?;
        let mut package = buffer.package(&payload);
        let session =
            self.endpoint
                .generate_greeting(&info, Some(&self.context.keys), &mut package)?;
        let written = package.written();

        debug!(request = ?M::TYPE, bytes = written, "packed request");
        Ok(MessageSession {
            session,
            expected,
            buffer,
            written,
        })
    }

    fn unpack<M: Message>(&self, exchange: &mut MessageSession, input: &[u8]) -> Result<M> {
        if M::TYPE != exchange.expected {
            return Err(AtmiError::InvalidArgument(format!(
                "exchange expects {:?}, not {:?}",
                exchange.expected,
                M::TYPE
            )));
        }

        match peek_type(input) {
            Ok(PackageType::Response) => {}
            Ok(kind) => {
                debug!(?kind, "discarding package that is not a response");
                return Err(AtmiError::NotFound(format!(
                    "expected a response package, got {kind:?}"
                )));
            }
            Err(e) => {
                warn!(error = %e, "discarding unreadable package");
                return Err(e.into());
            }
        }

        let mut collector = ResponseCollector::default();
        self.endpoint
            .process_incoming_package(&mut exchange.session, input, &mut collector)
            .map_err(|e| {
                warn!(error = %e, "response rejected");
                AtmiError::from(e)
            })?;

        let payload = collector.payload.ok_or_else(|| {
            AtmiError::NotFound("response carried no message".to_string())
        })?;
        messages::decode(&payload)
    }
}

#[derive(Default)]
struct ResponseCollector {
    payload: Option<Vec<u8>>,
}

impl BufferHandler for ResponseCollector {}

impl EndpointHandler for ResponseCollector {
    fn on_session_established(
        &mut self,
        _session_id: &SessionId,
        payload: &[u8],
    ) -> std::result::Result<(), CallbackError> {
        self.payload = Some(payload.to_vec());
        Ok(())
    }

    fn on_data(&mut self, _: &SessionId, _: &[u8]) -> std::result::Result<(), CallbackError> {
        Err(CallbackError::new("identity exchanges carry no data packages"))
    }

    fn on_stop(&mut self, _: &StopInfo, _: &[u8]) -> std::result::Result<(), CallbackError> {
        Err(CallbackError::new("identity exchanges end with the response"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atmi::error::{ATMI_EINVAL, ATMI_ENOENT};
    use crate::codec::crypto::OsEntropy;
    use crate::protocol::SessionPhase;

    fn client() -> DeviceClient<OsEntropy> {
        let device = KeyPair::generate(&mut OsEntropy).unwrap();
        let authority = KeyPair::generate(&mut OsEntropy).unwrap();
        DeviceClient::new(OsEntropy, DeviceContext::new(device), *authority.public_key())
    }

    #[test]
    fn test_pack_builds_greeting() {
        let mut client = client();
        let exchange = client
            .pack_activation_request(&ActivationRequest {
                requestor: DeviceId([5; 32]),
            })
            .unwrap();

        assert_eq!(peek_type(exchange.packet()).unwrap(), PackageType::Greeting);
        assert_eq!(exchange.expected(), MessageType::ActivationResponse);
        assert_eq!(exchange.session().phase(), SessionPhase::AwaitingResponse);
        assert_eq!(exchange.session().endpoint_id(), Some(&[5u8; 32][..]));
    }

    #[test]
    fn test_unpack_rejects_non_response() {
        let mut client = client();
        let mut exchange = client
            .pack_activation_request(&ActivationRequest {
                requestor: DeviceId([5; 32]),
            })
            .unwrap();
        let packet = exchange.packet().to_vec();

        let err = client
            .unpack_activation_response(&mut exchange, &packet)
            .unwrap_err();
        assert_eq!(err.code(), ATMI_ENOENT);
        assert_eq!(exchange.session().phase(), SessionPhase::AwaitingResponse);
    }

    #[test]
    fn test_unpack_wrong_response_kind() {
        let mut client = client();
        let mut exchange = client
            .pack_activation_request(&ActivationRequest {
                requestor: DeviceId([5; 32]),
            })
            .unwrap();

        let err = client
            .unpack_reputation_response(&mut exchange, b"PS\x02\x03")
            .unwrap_err();
        assert_eq!(err.code(), ATMI_EINVAL);
    }
}
