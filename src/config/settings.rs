//! # Configuration Settings
//!
//! Defines the configuration structure for bosh-vault.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use validator::Validate;

use super::secret::SecretString;
use crate::errors::{Error, Result};
use crate::store::backend::BackendKind;

pub const DEFAULT_API_ADDRESS: &str = "0.0.0.0:1337";
pub const DEFAULT_LOG_LEVEL: &str = "error";
pub const DEFAULT_DRAIN_TIMEOUT_SECONDS: u64 = 30;
pub const DEFAULT_PASSWORD_LENGTH: usize = 30;
/// Upper bound for configured and requested password lengths
pub const MAX_PASSWORD_LENGTH: usize = 4096;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate, Default)]
#[serde(default)]
pub struct AppConfig {
    /// HTTP API configuration
    #[validate(nested)]
    pub api: ApiConfig,

    /// Logging configuration
    #[validate(nested)]
    pub log: LogConfig,

    /// Default backend, the target of every write
    #[validate(nested)]
    pub vault: BackendConfig,

    /// Alternate backends consulted for specific credential names
    #[validate(nested)]
    pub redirects: Vec<RedirectConfig>,

    /// Defaults applied to credential generation requests
    #[validate(nested)]
    pub credentials: CredentialDefaults,
}

impl AppConfig {
    /// Validate the entire configuration
    pub fn validate(&self) -> Result<()> {
        Validate::validate(self).map_err(Error::from)?;
        self.validate_custom()
    }

    fn validate_custom(&self) -> Result<()> {
        self.api.socket_addr()?;

        if !LOG_LEVELS.contains(&self.log.level.to_lowercase().as_str()) {
            return Err(Error::validation(format!(
                "Log level '{}' must be one of {}",
                self.log.level,
                LOG_LEVELS.join(", ")
            )));
        }

        if self.api.tls.cert.is_some() != self.api.tls.key.is_some() {
            return Err(Error::validation("TLS requires both api.tls.cert and api.tls.key"));
        }

        for redirect in &self.redirects {
            if redirect.vault.kind == BackendKind::Vault && redirect.vault.address.is_empty() {
                return Err(Error::validation("Redirect vault address cannot be empty"));
            }
        }

        if self.vault.kind == BackendKind::Vault && self.vault.address.is_empty() {
            return Err(Error::validation("Vault address cannot be empty"));
        }

        Ok(())
    }
}

/// HTTP API configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ApiConfig {
    /// Listen address, `host:port`
    #[validate(length(min = 1, message = "API address cannot be empty"))]
    pub address: String,

    /// Seconds to wait for in-flight requests on shutdown
    #[validate(range(max = 300, message = "Drain timeout must be at most 300 seconds"))]
    pub drain_timeout_seconds: u64,

    pub tls: TlsConfig,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            address: DEFAULT_API_ADDRESS.to_string(),
            drain_timeout_seconds: DEFAULT_DRAIN_TIMEOUT_SECONDS,
            tls: TlsConfig::default(),
        }
    }
}

impl ApiConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        self.address
            .parse()
            .map_err(|e| Error::config(format!("Invalid API address '{}': {}", self.address, e)))
    }

    pub fn drain_timeout(&self) -> Duration {
        Duration::from_secs(self.drain_timeout_seconds)
    }
}

/// PEM certificate and key for serving the API over HTTPS
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct TlsConfig {
    pub cert: Option<PathBuf>,
    pub key: Option<PathBuf>,
}

impl TlsConfig {
    pub fn is_enabled(&self) -> bool {
        self.cert.is_some() && self.key.is_some()
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct LogConfig {
    /// trace, debug, info, warn or error; `RUST_LOG` takes precedence
    #[validate(length(min = 1, message = "Log level cannot be empty"))]
    pub level: String,

    /// Emit JSON lines instead of human readable output
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self { level: DEFAULT_LOG_LEVEL.to_string(), json: true }
    }
}

/// Connection settings for one versioned KV backend
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct BackendConfig {
    pub kind: BackendKind,

    /// Vault server address, e.g. `https://vault.example.com:8200`
    pub address: String,

    pub token: SecretString,

    /// Vault Enterprise namespace
    pub namespace: Option<String>,

    /// KV v2 mount path
    #[validate(length(min = 1, message = "Mount cannot be empty"))]
    pub mount: String,

    #[validate(range(min = 1, max = 300, message = "Timeout must be between 1 and 300 seconds"))]
    pub timeout_seconds: u64,

    /// PEM bundle used to verify the Vault server certificate
    pub ca: Option<PathBuf>,

    pub skip_verify: bool,

    /// Renew the token every N seconds; unset disables renewal
    #[validate(range(min = 1, message = "Token renew interval must be at least 1 second"))]
    pub token_renew_interval_seconds: Option<u64>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            kind: BackendKind::Vault,
            address: "http://127.0.0.1:8200".to_string(),
            token: SecretString::default(),
            namespace: None,
            mount: "secret".to_string(),
            timeout_seconds: 30,
            ca: None,
            skip_verify: false,
            token_renew_interval_seconds: None,
        }
    }
}

impl BackendConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    pub fn token_renew_interval(&self) -> Option<Duration> {
        self.token_renew_interval_seconds.map(Duration::from_secs)
    }

    /// In-memory backend, handy for local development and tests.
    pub fn memory() -> Self {
        Self { kind: BackendKind::Memory, ..Self::default() }
    }
}

/// A remote backend plus the names that resolve against it
#[derive(Debug, Clone, Serialize, Deserialize, Validate, Default)]
#[serde(default)]
pub struct RedirectConfig {
    #[validate(nested)]
    pub vault: BackendConfig,

    #[validate(nested)]
    pub rules: Vec<RedirectRuleConfig>,
}

/// `ref` is the name callers ask for, `redirect` the name in the remote backend
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RedirectRuleConfig {
    #[serde(rename = "ref")]
    #[validate(length(min = 1, message = "Redirect ref cannot be empty"))]
    pub reference: String,

    #[validate(length(min = 1, message = "Redirect target cannot be empty"))]
    pub redirect: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct CredentialDefaults {
    #[validate(range(min = 1, max = 4096, message = "Password length must be between 1 and 4096"))]
    pub password_length: usize,
}

impl Default for CredentialDefaults {
    fn default() -> Self {
        Self { password_length: DEFAULT_PASSWORD_LENGTH }
    }
}
