//! Configuration management.
//!
//! Supports configuration from:
//! - TOML config files
//! - Environment variables (`PSESS_*`)
//!
//! ```toml
//! [engine]
//! max_payload_len = 65536
//! max_endpoint_id_len = 1024
//!
//! [keys]
//! manager_public_key = "<64 hex chars>"
//! manager_secret_key = "<64 hex chars>"
//! ```

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use zeroize::Zeroize;

use crate::codec::crypto::{hex_decode, KeyPair, PublicKey};
use crate::error::{PsError, Result};

/// Main configuration struct
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Engine bounds
    #[serde(default)]
    pub engine: EngineConfig,

    /// Long-lived keys
    #[serde(default)]
    pub keys: KeyConfig,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| PsError::Config(format!("Failed to parse config: {e}")))?;
        config.engine.validate()?;

        debug!(path = %path.display(), "loaded session config");
        Ok(config)
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(val) = parse_env("PSESS_MAX_PAYLOAD_LEN") {
            config.engine.max_payload_len = val;
        }
        if let Some(val) = parse_env("PSESS_MAX_ENDPOINT_ID_LEN") {
            config.engine.max_endpoint_id_len = val;
        }

        if let Ok(key) = std::env::var("PSESS_MANAGER_PUBLIC_KEY") {
            config.keys.manager_public_key = Some(key);
        }
        if let Ok(key) = std::env::var("PSESS_MANAGER_SECRET_KEY") {
            config.keys.manager_secret_key = Some(key);
        }

        config
    }

    /// Default config file location (`<config dir>/psess/config.toml`)
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("psess").join("config.toml"))
    }

    /// Load the default config file if present, otherwise the environment
    pub fn load() -> Result<Self> {
        match Self::default_path() {
            Some(path) if path.exists() => Self::from_file(path),
            _ => {
                debug!("no config file, using environment");
                Ok(Self::from_env())
            }
        }
    }
}

fn parse_env(name: &str) -> Option<usize> {
    let raw = std::env::var(name).ok()?;
    match raw.parse() {
        Ok(val) => Some(val),
        Err(e) => {
            warn!(var = name, value = %raw, error = %e, "ignoring unparseable setting");
            None
        }
    }
}

/// Bounds the engine enforces on payloads and identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Largest payload accepted or produced, in bytes
    pub max_payload_len: usize,

    /// Largest endpoint identifier, in bytes
    pub max_endpoint_id_len: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_payload_len: 64 * 1024,
            max_endpoint_id_len: 1024,
        }
    }
}

impl EngineConfig {
    /// Reject bounds the wire format cannot carry
    pub fn validate(&self) -> Result<()> {
        if self.max_endpoint_id_len == 0 || self.max_endpoint_id_len > u16::MAX as usize {
            return Err(PsError::Config(format!(
                "max_endpoint_id_len must be in 1..={}, got {}",
                u16::MAX,
                self.max_endpoint_id_len
            )));
        }
        Ok(())
    }

    /// Fail with `InputTooBig` when a payload exceeds the bound
    pub fn check_payload(&self, len: usize) -> Result<()> {
        if len > self.max_payload_len {
            return Err(PsError::InputTooBig {
                len,
                max: self.max_payload_len,
            });
        }
        Ok(())
    }

    /// Fail when an endpoint identifier is empty or exceeds the bound
    pub fn check_endpoint_id(&self, len: usize) -> Result<()> {
        if len == 0 {
            return Err(PsError::Argument("endpoint id must not be empty".to_string()));
        }
        if len > self.max_endpoint_id_len {
            return Err(PsError::InputTooBig {
                len,
                max: self.max_endpoint_id_len,
            });
        }
        Ok(())
    }
}

/// Manager key configuration, hex encoded
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct KeyConfig {
    /// Manager public key; checked against the secret when both are given
    pub manager_public_key: Option<String>,

    /// Manager secret key
    pub manager_secret_key: Option<String>,
}

impl KeyConfig {
    /// Manager key pair, `None` when no secret is configured
    pub fn manager_key_pair(&self) -> Result<Option<KeyPair>> {
        let Some(secret_hex) = &self.manager_secret_key else {
            if self.manager_public_key.is_some() {
                return Err(PsError::Argument(
                    "manager public key configured without its secret".to_string(),
                ));
            }
            return Ok(None);
        };

        let mut secret = hex_decode(secret_hex.trim())
            .map_err(|e| PsError::Config(format!("manager_secret_key: {e}")))?;
        let pair = KeyPair::from_secret_slice(&secret);
        secret.zeroize();
        let pair = pair?;

        if let Some(public_hex) = &self.manager_public_key {
            let public = PublicKey::from_hex(public_hex.trim())?;
            if public != *pair.public_key() {
                return Err(PsError::Config(
                    "manager_public_key does not match manager_secret_key".to_string(),
                ));
            }
        }

        Ok(Some(pair))
    }
}

impl fmt::Debug for KeyConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyConfig")
            .field("manager_public_key", &self.manager_public_key)
            .field(
                "manager_secret_key",
                &self.manager_secret_key.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

impl Drop for KeyConfig {
    fn drop(&mut self) {
        self.manager_secret_key.zeroize();
    }
}
