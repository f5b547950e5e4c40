//! Manager (server-side) session engine.
//!
//! The manager never initiates: sessions start when a greeting arrives, go
//! straight to `Established`, and owe the endpoint one response package. Data
//! and stop packages are matched to their session through
//! [`ManagerHandler::get_session`]; the updated session comes back in the
//! returned [`ManagerEvent`] for the caller to persist.

use super::callbacks::{deliver, ManagerHandler};
use super::session::Session;
use super::types::{GreetingInfo, Role, StopInfo, StopReason};
use crate::codec::crypto::{EntropySource, KeyPair, PublicKey};
use crate::codec::package::{self, Package};
use crate::codec::sizing::{self, ensure_capacity};
use crate::codec::{peek_type, PackageType, SessionId, SESSION_ID_BYTES};
use crate::config::{Config, EngineConfig};
use crate::error::{PsError, Result};

/// Outcome of processing one incoming package
#[derive(Debug)]
pub struct ManagerEvent {
    /// Type of the processed package
    pub kind: PackageType,
    /// Session to persist: new for a greeting, updated otherwise
    pub session: Session,
}

impl ManagerEvent {
    /// Identifier of the session the package belonged to
    pub fn session_id(&self) -> Option<&SessionId> {
        self.session.id()
    }
}

/// Server-side engine
#[derive(Debug)]
pub struct Manager<E: EntropySource> {
    entropy: E,
    keys: KeyPair,
    config: EngineConfig,
}

impl<E: EntropySource> Manager<E> {
    /// Create a manager with its long-lived key pair
    pub fn new(entropy: E, keys: KeyPair) -> Self {
        Self {
            entropy,
            keys,
            config: EngineConfig::default(),
        }
    }

    /// Create a manager from configuration; the keys section is mandatory
    pub fn from_config(entropy: E, config: &Config) -> Result<Self> {
        let keys = config.keys.manager_key_pair()?.ok_or_else(|| {
            PsError::Argument("manager keys are required".to_string())
        })?;
        Self::new(entropy, keys).with_engine_config(config.engine)
    }

    /// Replace the engine bounds, rejecting bounds the wire format cannot
    /// carry
    pub fn with_engine_config(mut self, config: EngineConfig) -> Result<Self> {
        config.validate()?;
        self.config = config;
        Ok(self)
    }

    /// Manager public key endpoints greet
    pub fn public_key(&self) -> &PublicKey {
        self.keys.public_key()
    }

    /// Engine bounds
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Decode a package from an endpoint and dispatch it to `handler`
    pub fn process_incoming_package<H: ManagerHandler + ?Sized>(
        &mut self,
        input: &[u8],
        handler: &mut H,
    ) -> Result<ManagerEvent> {
        let kind = peek_type(input)?;
        let id_len = match kind {
            PackageType::Greeting => self.config.max_endpoint_id_len,
            _ => SESSION_ID_BYTES,
        };
        let max = sizing::required_size(kind, id_len, self.config.max_payload_len)?;
        if input.len() > max {
            return Err(PsError::InputTooBig {
                len: input.len(),
                max,
            });
        }

        let session = match kind {
            PackageType::Greeting => self.process_greeting(input, handler)?,
            PackageType::Data => process_data(input, handler)?,
            PackageType::Stop => process_stop(input, handler)?,
            PackageType::Response | PackageType::Plain => {
                return Err(PsError::BadData(format!(
                    "manager cannot process {kind:?} packages"
                )));
            }
        };
        Ok(ManagerEvent { kind, session })
    }

    fn process_greeting<H: ManagerHandler + ?Sized>(
        &mut self,
        input: &[u8],
        handler: &mut H,
    ) -> Result<Session> {
        let greeting = package::decode_greeting(&self.keys, input)?;
        self.config.check_endpoint_id(greeting.endpoint_id.len())?;
        self.config.check_payload(greeting.payload.len())?;

        let info = GreetingInfo {
            endpoint_id: greeting.endpoint_id.clone(),
            manager_public: *self.keys.public_key(),
            endpoint_public: Some(greeting.endpoint_public),
        };
        deliver(handler, &greeting.payload, |h, payload| {
            h.on_greeting(&info, payload)
        })?;

        let session_id = SessionId::from_random(self.entropy.array()?);
        let response = KeyPair::generate(&mut self.entropy)?;
        Session::accept_greeting(
            &self.keys,
            &response,
            greeting.endpoint_public,
            greeting.endpoint_id,
            greeting.binding,
            session_id,
        )
    }

    /// Write the response owed for a freshly accepted greeting.
    ///
    /// The pending response is consumed: a second call fails with
    /// `WrongState`.
    pub fn generate_response(
        &mut self,
        session: &mut Session,
        package: &mut Package<'_>,
    ) -> Result<()> {
        check_role(session)?;
        self.config.check_payload(package.payload().len())?;
        let required = sizing::response_package_size(SESSION_ID_BYTES, package.payload().len())?;
        ensure_capacity(required, package.capacity())?;

        let response = session.pending_response()?;
        let binding = session.greeting_binding("generate_response")?;
        let (session_id, endpoint) = match (session.id(), session.peer_public()) {
            (Some(id), Some(endpoint)) => (*id, *endpoint),
            _ => return Err(PsError::wrong_state("generate_response", session.phase())),
        };

        package::encode_response(
            &mut self.entropy,
            &self.keys,
            &endpoint,
            &binding,
            &session_id,
            response.public_key(),
            package,
        )?;
        session.clear_pending_response();
        Ok(())
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
}

fn check_role(session: &Session) -> Result<()> {
    if session.role() != Role::Manager {
        return Err(PsError::Argument(
            "endpoint session passed to manager engine".to_string(),
        ));
    }
    Ok(())
}

fn lookup<H: ManagerHandler + ?Sized>(input: &[u8], handler: &mut H) -> Result<Session> {
    let session_id = package::peek_session_id(input)?;
    let session = handler
        .get_session(&session_id)?
        .ok_or_else(|| PsError::BadData(format!("unknown session {session_id}")))?;
    check_role(&session)?;
    Ok(session)
}

fn process_data<H: ManagerHandler + ?Sized>(input: &[u8], handler: &mut H) -> Result<Session> {
    let mut session = lookup(input, handler)?;
    let data = session.open_data(input)?;
    deliver(handler, &data.payload, |h, payload| {
        h.on_data(&data.session_id, payload)
    })?;
    session.mark_received(data.seq);
    Ok(session)
}

fn process_stop<H: ManagerHandler + ?Sized>(input: &[u8], handler: &mut H) -> Result<Session> {
    let mut session = lookup(input, handler)?;
    let stop = session.open_stop(input)?;
    let info = StopInfo {
        session_id: stop.session_id,
        reason: StopReason::from_byte(stop.reason),
    };
    deliver(handler, &stop.payload, |h, payload| h.on_stop(&info, payload))?;
    session.mark_received(stop.seq);
    session.close();
    Ok(session)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::crypto::OsEntropy;
    use crate::config::KeyConfig;
    use crate::protocol::callbacks::{BufferHandler, CallbackError};
    use crate::protocol::endpoint::Endpoint;
    use std::collections::HashMap;

    #[derive(Default)]
    struct Store {
        refuse: bool,
        greetings: Vec<GreetingInfo>,
        sessions: HashMap<SessionId, Session>,
    }

    impl BufferHandler for Store {}

    impl ManagerHandler for Store {
        fn on_greeting(&mut self, info: &GreetingInfo, _: &[u8]) -> std::result::Result<(), CallbackError> {
            if self.refuse {
                return Err(CallbackError::new("unknown device"));
            }
            self.greetings.push(info.clone());
            Ok(())
        }

        fn on_data(&mut self, _: &SessionId, _: &[u8]) -> std::result::Result<(), CallbackError> {
            Ok(())
        }

        fn on_stop(&mut self, _: &StopInfo, _: &[u8]) -> std::result::Result<(), CallbackError> {
            Ok(())
        }

        fn get_session(&mut self, id: &SessionId) -> std::result::Result<Option<Session>, CallbackError> {
            Ok(self.sessions.get(id).cloned())
        }
    }

    fn greeting_bytes(manager: &PublicKey) -> Vec<u8> {
        let mut endpoint = Endpoint::new(OsEntropy);
        let info = GreetingInfo::new(&b"device-a"[..], *manager);
        let mut out = vec![0u8; 1024];
        let mut package = Package::new(b"hello", &mut out);
        endpoint.generate_greeting(&info, None, &mut package).unwrap();
        package.as_bytes().to_vec()
    }

    fn manager() -> Manager<OsEntropy> {
        Manager::new(OsEntropy, KeyPair::generate(&mut OsEntropy).unwrap())
    }

    #[test]
    fn test_greeting_accepted() {
        let mut manager = manager();
        let input = greeting_bytes(manager.public_key());
        let mut store = Store::default();

        let event = manager.process_incoming_package(&input, &mut store).unwrap();
        assert_eq!(event.kind, PackageType::Greeting);
        assert!(event.session.is_established());
        assert!(event.session.has_pending_response());
        assert!(event.session_id().is_some());
        assert_eq!(event.session.endpoint_id(), Some(&b"device-a"[..]));

        let info = &store.greetings[0];
        assert_eq!(info.endpoint_id, b"device-a");
        assert!(info.endpoint_public.is_some());
    }

    #[test]
    fn test_refused_greeting_produces_no_session() {
        let mut manager = manager();
        let input = greeting_bytes(manager.public_key());
        let mut store = Store {
            refuse: true,
            ..Default::default()
        };

        let err = manager.process_incoming_package(&input, &mut store).unwrap_err();
        assert!(matches!(err, PsError::CallbackAborted(_)));
    }

    #[test]
    fn test_response_consumed_once() {
        let mut manager = manager();
        let input = greeting_bytes(manager.public_key());
        let mut event = manager
            .process_incoming_package(&input, &mut Store::default())
            .unwrap();

        let mut out = vec![0u8; 1024];
        let mut package = Package::new(b"ok", &mut out);
        manager.generate_response(&mut event.session, &mut package).unwrap();
        assert!(!event.session.has_pending_response());

        let mut package = Package::new(b"ok", &mut out);
        assert!(matches!(
            manager.generate_response(&mut event.session, &mut package),
            Err(PsError::WrongState { .. })
        ));
    }

    #[test]
    fn test_unknown_session_is_bad_data() {
        let mut manager = manager();
        let input = greeting_bytes(manager.public_key());
        let mut event = manager
            .process_incoming_package(&input, &mut Store::default())
            .unwrap();

        let mut out = vec![0u8; 1024];
        let mut package = Package::new(b"x", &mut out);
        manager.generate_data_package(&mut event.session, &mut package).unwrap();

        let err = manager
            .process_incoming_package(package.as_bytes(), &mut Store::default())
            .unwrap_err();
        assert!(matches!(err, PsError::BadData(_)));
    }

    #[test]
    fn test_greeting_for_other_manager_is_crypto_failure() {
        let mut manager = manager();
        let other = KeyPair::generate(&mut OsEntropy).unwrap();
        let input = greeting_bytes(other.public_key());

        let err = manager
            .process_incoming_package(&input, &mut Store::default())
            .unwrap_err();
        assert!(err.is_session_fatal_during_handshake());
    }

    #[test]
    fn test_from_config_requires_keys() {
        let err = Manager::from_config(OsEntropy, &Config::default()).unwrap_err();
        assert!(matches!(err, PsError::Argument(_)));

        let pair = KeyPair::generate(&mut OsEntropy).unwrap();
        let config = Config {
            engine: EngineConfig::default(),
            keys: KeyConfig {
                manager_public_key: None,
                manager_secret_key: Some(crate::codec::crypto::hex_encode(&pair.secret_bytes())),
            },
        };
        let manager = Manager::from_config(OsEntropy, &config).unwrap();
        assert_eq!(manager.public_key(), pair.public_key());
    }

    #[test]
    fn test_oversized_input_rejected() {
        let mut manager = manager()
            .with_engine_config(EngineConfig {
                max_payload_len: 0,
                max_endpoint_id_len: 1,
            })
            .unwrap();
        let mut input = vec![0u8; 4096];
        input[..4].copy_from_slice(b"PS\x02\x04");

        let err = manager
            .process_incoming_package(&input, &mut Store::default())
            .unwrap_err();
        assert!(matches!(err, PsError::InputTooBig { .. }));
    }
}
