//! Endpoint (device-side) session engine.
//!
//! ```text
//!  generate_greeting()          process_incoming_package(Response)
//! [Idle] ──────────> [AwaitingResponse] ──────────────────> [Established]
//!                                                                 │
//!                         generate_stop_package() / Stop received │
//!                                                                 v
//!                                                             [Closed]
//! ```
//!
//! Every operation works on a copy of the caller's [`Session`] and writes it
//! back only once the operation, including the consumer callback, succeeded.

use super::callbacks::{deliver, EndpointHandler};
use super::session::{Session, SessionPhase};
use super::types::{GreetingInfo, Role, StopInfo, StopReason};
use crate::codec::crypto::{EntropySource, KeyPair};
use crate::codec::package::{self, Package};
use crate::codec::sizing::{self, ensure_capacity};
use crate::codec::{peek_type, PackageType, SESSION_ID_BYTES};
use crate::config::EngineConfig;
use crate::error::{PsError, Result};

/// Device-side engine
#[derive(Debug)]
pub struct Endpoint<E: EntropySource> {
    entropy: E,
    config: EngineConfig,
}

impl<E: EntropySource> Endpoint<E> {
    /// Create an endpoint engine with default bounds
    pub fn new(entropy: E) -> Self {
        Self {
            entropy,
            config: EngineConfig::default(),
        }
    }

    /// Create an endpoint engine with explicit bounds, rejecting bounds the
    /// wire format cannot carry
    pub fn with_config(entropy: E, config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { entropy, config })
    }

    /// Engine bounds
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub(crate) fn entropy_mut(&mut self) -> &mut E {
        &mut self.entropy
    }

    /// Write a greeting into `package` and return the provisional session.
    ///
    /// With `keys` omitted a fresh key pair is drawn from the entropy source
    /// and kept only until the handshake completes.
    pub fn generate_greeting(
        &mut self,
        info: &GreetingInfo,
        keys: Option<&KeyPair>,
        package: &mut Package<'_>,
    ) -> Result<Session> {
        self.config.check_endpoint_id(info.endpoint_id.len())?;
        self.config.check_payload(package.payload().len())?;
        let required =
            sizing::greeting_package_size(info.endpoint_id.len(), package.payload().len())?;
        ensure_capacity(required, package.capacity())?;

        let ephemeral;
        let pair = match keys {
            Some(pair) => pair,
            None => {
                ephemeral = KeyPair::generate(&mut self.entropy)?;
                &ephemeral
            }
        };

        let binding = package::encode_greeting(
            &mut self.entropy,
            pair,
            &info.manager_public,
            &info.endpoint_id,
            package,
        )?;
        Ok(Session::awaiting_response(
            pair,
            info.manager_public,
            &info.endpoint_id,
            binding,
        ))
    }

    /// Encrypt the package payload for an established session
    pub fn generate_data_package(
        &mut self,
        session: &mut Session,
        package: &mut Package<'_>,
    ) -> Result<()> {
        check_role(session)?;
        self.config.check_payload(package.payload().len())?;
        session.seal_data(&mut self.entropy, package)
    }

    /// Stop an established session; the session is `Closed` afterwards
    pub fn generate_stop_package(
        &mut self,
        session: &mut Session,
        reason: StopReason,
        package: &mut Package<'_>,
    ) -> Result<()> {
        check_role(session)?;
        self.config.check_payload(package.payload().len())?;
        session.seal_stop(&mut self.entropy, reason, package)
    }

    /// Decode a package from the manager and dispatch it to `handler`.
    ///
    /// Returns the type of the package that was processed.
    pub fn process_incoming_package<H: EndpointHandler + ?Sized>(
        &self,
        session: &mut Session,
        input: &[u8],
        handler: &mut H,
    ) -> Result<PackageType> {
        check_role(session)?;
        let kind = peek_type(input)?;
        let max = sizing::required_size(kind, SESSION_ID_BYTES, self.config.max_payload_len)?;
        if input.len() > max {
            return Err(PsError::InputTooBig {
                len: input.len(),
                max,
            });
        }

        match kind {
            PackageType::Response => process_response(session, input, handler)?,
            PackageType::Data => process_data(session, input, handler)?,
            PackageType::Stop => process_stop(session, input, handler)?,
            PackageType::Greeting | PackageType::Plain => {
                return Err(PsError::BadData(format!(
                    "endpoint cannot process {kind:?} packages"
                )));
            }
        }
        Ok(kind)
    }
}

fn check_role(session: &Session) -> Result<()> {
    if session.role() != Role::Endpoint {
        return Err(PsError::Argument(
            "manager session passed to endpoint engine".to_string(),
        ));
    }
    Ok(())
}

fn process_response<H: EndpointHandler + ?Sized>(
    session: &mut Session,
    input: &[u8],
    handler: &mut H,
) -> Result<()> {
    session.require_phase("process_response", SessionPhase::AwaitingResponse)?;
    let ours = session.greeting_pair()?;
    let manager = session
        .peer_public()
        .copied()
        .ok_or_else(|| PsError::wrong_state("process_response", session.phase()))?;

    let binding = session.greeting_binding("process_response")?;

    let response = package::decode_response(&ours, &manager, &binding, input)?;
    let next = session.establish(response.session_id, &response.response_public)?;

    deliver(handler, &response.payload, |h, payload| {
        h.on_session_established(&response.session_id, payload)
    })?;
    *session = next;
    Ok(())
}

fn process_data<H: EndpointHandler + ?Sized>(
    session: &mut Session,
    input: &[u8],
    handler: &mut H,
) -> Result<()> {
    let data = session.open_data(input)?;
    deliver(handler, &data.payload, |h, payload| {
        h.on_data(&data.session_id, payload)
    })?;
    session.mark_received(data.seq);
    Ok(())
}

fn process_stop<H: EndpointHandler + ?Sized>(
    session: &mut Session,
    input: &[u8],
    handler: &mut H,
) -> Result<()> {
    let stop = session.open_stop(input)?;
    let info = StopInfo {
        session_id: stop.session_id,
        reason: StopReason::from_byte(stop.reason),
    };
    deliver(handler, &stop.payload, |h, payload| h.on_stop(&info, payload))?;
    session.mark_received(stop.seq);
    session.close();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::crypto::OsEntropy;
    use crate::protocol::callbacks::{BufferHandler, CallbackError};
    use crate::codec::SessionId;

    #[derive(Default)]
    struct Recorder {
        established: Vec<SessionId>,
    }

    impl BufferHandler for Recorder {}

    impl EndpointHandler for Recorder {
        fn on_session_established(&mut self, id: &SessionId, _: &[u8]) -> std::result::Result<(), CallbackError> {
            self.established.push(*id);
            Ok(())
        }

        fn on_data(&mut self, _: &SessionId, _: &[u8]) -> std::result::Result<(), CallbackError> {
            Ok(())
        }

        fn on_stop(&mut self, _: &StopInfo, _: &[u8]) -> std::result::Result<(), CallbackError> {
            Ok(())
        }
    }

    fn manager_info() -> (KeyPair, GreetingInfo) {
        let manager = KeyPair::generate(&mut OsEntropy).unwrap();
        let info = GreetingInfo::new(&b"device-a"[..], *manager.public_key());
        (manager, info)
    }

    #[test]
    fn test_greeting_creates_awaiting_session() {
        let (_, info) = manager_info();
        let mut endpoint = Endpoint::new(OsEntropy);
        let mut out = vec![0u8; 1024];
        let mut package = Package::new(b"hi", &mut out);

        let session = endpoint.generate_greeting(&info, None, &mut package).unwrap();
        assert_eq!(session.phase(), SessionPhase::AwaitingResponse);
        assert!(session.id().is_none());
        assert_eq!(session.endpoint_id(), Some(&b"device-a"[..]));
        assert_eq!(peek_type(package.as_bytes()).unwrap(), PackageType::Greeting);
    }

    #[test]
    fn test_ephemeral_keys_differ_per_greeting() {
        let (manager, info) = manager_info();
        let mut endpoint = Endpoint::new(OsEntropy);

        let mut first = vec![0u8; 1024];
        let mut package = Package::new(b"", &mut first);
        endpoint.generate_greeting(&info, None, &mut package).unwrap();
        let a = package::decode_greeting(&manager, package.as_bytes()).unwrap();

        let mut second = vec![0u8; 1024];
        let mut package = Package::new(b"", &mut second);
        endpoint.generate_greeting(&info, None, &mut package).unwrap();
        let b = package::decode_greeting(&manager, package.as_bytes()).unwrap();

        assert_ne!(a.endpoint_public, b.endpoint_public);
    }

    #[test]
    fn test_static_keys_are_used() {
        let (manager, info) = manager_info();
        let device = KeyPair::generate(&mut OsEntropy).unwrap();
        let mut endpoint = Endpoint::new(OsEntropy);
        let mut out = vec![0u8; 1024];
        let mut package = Package::new(b"", &mut out);

        endpoint.generate_greeting(&info, Some(&device), &mut package).unwrap();
        let greeting = package::decode_greeting(&manager, package.as_bytes()).unwrap();
        assert_eq!(greeting.endpoint_public, *device.public_key());
    }

    #[test]
    fn test_greeting_bounds() {
        let (_, mut info) = manager_info();
        let mut endpoint = Endpoint::with_config(
            OsEntropy,
            EngineConfig {
                max_payload_len: 4,
                max_endpoint_id_len: 8,
            },
        )
        .unwrap();
        let mut out = vec![0u8; 1024];

        let mut package = Package::new(b"too long", &mut out);
        assert!(matches!(
            endpoint.generate_greeting(&info, None, &mut package),
            Err(PsError::InputTooBig { .. })
        ));

        info.endpoint_id.clear();
        let mut package = Package::new(b"", &mut out);
        assert!(matches!(
            endpoint.generate_greeting(&info, None, &mut package),
            Err(PsError::Argument(_))
        ));
    }

    #[test]
    fn test_unrepresentable_bounds_rejected() {
        for max_endpoint_id_len in [0, u16::MAX as usize + 1] {
            let config = EngineConfig {
                max_payload_len: 16,
                max_endpoint_id_len,
            };
            assert!(matches!(
                Endpoint::with_config(OsEntropy, config),
                Err(PsError::Config(_))
            ));
        }
    }

    #[test]
    fn test_greeting_output_too_small() {
        let (_, info) = manager_info();
        let mut endpoint = Endpoint::new(OsEntropy);
        let required = sizing::greeting_package_size(info.endpoint_id.len(), 0).unwrap();
        let mut out = vec![0u8; required - 1];
        let mut package = Package::new(b"", &mut out);

        let err = endpoint.generate_greeting(&info, None, &mut package).unwrap_err();
        assert!(matches!(err, PsError::OutputTooSmall { .. }));
    }

    #[test]
    fn test_data_before_established_is_wrong_state() {
        let (_, info) = manager_info();
        let mut endpoint = Endpoint::new(OsEntropy);
        let mut out = vec![0u8; 1024];
        let mut package = Package::new(b"", &mut out);
        let mut session = endpoint.generate_greeting(&info, None, &mut package).unwrap();

        let mut out = vec![0u8; 1024];
        let mut package = Package::new(b"early", &mut out);
        assert!(matches!(
            endpoint.generate_data_package(&mut session, &mut package),
            Err(PsError::WrongState {
                phase: SessionPhase::AwaitingResponse,
                ..
            })
        ));
    }

    #[test]
    fn test_endpoint_rejects_greeting_input() {
        let (_, info) = manager_info();
        let mut endpoint = Endpoint::new(OsEntropy);
        let mut out = vec![0u8; 1024];
        let mut package = Package::new(b"", &mut out);
        let mut session = endpoint.generate_greeting(&info, None, &mut package).unwrap();

        let err = endpoint
            .process_incoming_package(&mut session, package.as_bytes(), &mut Recorder::default())
            .unwrap_err();
        assert!(matches!(err, PsError::BadData(_)));
        assert_eq!(session.phase(), SessionPhase::AwaitingResponse);
    }

    #[test]
    fn test_manager_session_rejected() {
        let endpoint = Endpoint::new(OsEntropy);
        let mut session = Session::new(Role::Manager);
        let err = endpoint
            .process_incoming_package(&mut session, b"PS\x02\x04", &mut Recorder::default())
            .unwrap_err();
        assert!(matches!(err, PsError::Argument(_)));
    }
}
