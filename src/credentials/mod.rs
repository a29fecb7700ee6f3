//! # Credentials
//!
//! The four credential kinds (password, certificate, RSA keypair, SSH keypair)
//! share one contract: a typed request that validates and generates itself
//! into a [`CredentialRecord`], and a record that knows how to store itself
//! and how to be recovered from a stored secret.
//!
//! Records are persisted as `{"type": <kind>, "value": <record>}` so the kind
//! can be recovered from any fetched version.

pub mod certificate;
pub mod keys;
pub mod password;
pub mod request;
pub mod rsa_keypair;
pub mod ssh_keypair;

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use certificate::{CertificateParameters, CertificateRecord, CertificateRequest};
pub use password::{PasswordParameters, PasswordRequest};
pub use request::{parse_generation_request, parse_set_request, GenerationMode, ParsedGeneration};
pub use rsa_keypair::{RsaKeypairRecord, RsaKeypairRequest};
pub use ssh_keypair::{SshKeypairRecord, SshKeypairRequest};

use crate::errors::{Error, Result};
use crate::store::SecretStore;

/// Discriminator carried in the `type` field of requests and stored payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CredentialType {
    Certificate,
    Password,
    Ssh,
    Rsa,
}

impl CredentialType {
    pub const ALL: [CredentialType; 4] =
        [CredentialType::Certificate, CredentialType::Password, CredentialType::Ssh, CredentialType::Rsa];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Certificate => "certificate",
            Self::Password => "password",
            Self::Ssh => "ssh",
            Self::Rsa => "rsa",
        }
    }

    /// Comma separated list for error messages.
    pub fn supported() -> String {
        Self::ALL.iter().map(|t| t.as_str()).collect::<Vec<_>>().join(", ")
    }
}

impl fmt::Display for CredentialType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for CredentialType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| Error::unsupported_type(s, Self::supported()))
    }
}

/// A typed generation request for one credential kind.
#[async_trait]
pub trait CredentialGenerator: Send + Sync + fmt::Debug {
    /// Name the generated credential is stored under.
    fn name(&self) -> &str;

    fn credential_type(&self) -> CredentialType;

    /// Check the request parameters.
    ///
    /// # Errors
    ///
    /// Returns `Error::Validation` describing the first problem found.
    fn validate(&self) -> Result<()>;

    fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }

    /// Synthesize the credential. Certificates may read their signing CA
    /// from `store`; nothing is written.
    async fn generate(&self, store: &dyn SecretStore) -> Result<CredentialRecord>;
}

/// A generated or explicitly set credential value.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum CredentialRecord {
    Certificate(CertificateRecord),
    Password(String),
    Ssh(SshKeypairRecord),
    Rsa(RsaKeypairRecord),
}

impl fmt::Debug for CredentialRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Certificate(record) => f.debug_tuple("Certificate").field(record).finish(),
            Self::Password(_) => f.debug_tuple("Password").field(&"[REDACTED]").finish(),
            Self::Ssh(record) => f.debug_tuple("Ssh").field(record).finish(),
            Self::Rsa(record) => f.debug_tuple("Rsa").field(record).finish(),
        }
    }
}

/// What callers get back after a credential is stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CredentialResponse {
    pub id: String,
    pub name: String,
    pub value: Value,
}

impl CredentialRecord {
    pub fn credential_type(&self) -> CredentialType {
        match self {
            Self::Certificate(_) => CredentialType::Certificate,
            Self::Password(_) => CredentialType::Password,
            Self::Ssh(_) => CredentialType::Ssh,
            Self::Rsa(_) => CredentialType::Rsa,
        }
    }

    /// Tagged payload as persisted in a backend.
    pub fn to_value(&self) -> Result<Value> {
        serde_json::to_value(self).map_err(Error::from)
    }

    /// Recover a record from a stored payload.
    ///
    /// # Errors
    ///
    /// Returns `Error::UnsupportedCredentialType` for an unknown tag and
    /// `Error::Validation` when the payload does not match its tag.
    pub fn from_value(value: &Value) -> Result<Self> {
        let tag = value
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::validation("stored secret has no credential type"))?;
        let kind: CredentialType = tag.parse()?;

        serde_json::from_value(value.clone()).map_err(|e| {
            Error::validation(format!("stored {} credential is malformed: {}", kind, e))
        })
    }

    /// The untagged value presented to callers.
    pub fn presented_value(&self) -> Result<Value> {
        let value = match self {
            Self::Certificate(record) => serde_json::to_value(record)?,
            Self::Password(password) => Value::String(password.clone()),
            Self::Ssh(record) => serde_json::to_value(record)?,
            Self::Rsa(record) => serde_json::to_value(record)?,
        };
        Ok(value)
    }

    /// Persist the record as a new version of `name`.
    pub async fn store(&self, store: &dyn SecretStore, name: &str) -> Result<CredentialResponse> {
        let id = store.set(name, &self.to_value()?).await?;
        tracing::info!(name = %name, credential_type = %self.credential_type(), "Stored credential");
        Ok(CredentialResponse { id, name: name.to_string(), value: self.presented_value()? })
    }
}

/// Strip the stored `{"type", "value"}` envelope when present.
pub fn present_stored_value(value: &Value) -> Value {
    match CredentialRecord::from_value(value).and_then(|r| r.presented_value()) {
        Ok(presented) => presented,
        Err(_) => value.get("value").cloned().unwrap_or_else(|| value.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{InMemoryBackend, SimpleStore};
    use serde_json::json;
    use std::sync::Arc;

    #[test]
    fn test_credential_type_round_trip() {
        for kind in CredentialType::ALL {
            assert_eq!(kind.as_str().parse::<CredentialType>().unwrap(), kind);
        }
        let err = "banana".parse::<CredentialType>().unwrap_err();
        assert!(err.to_string().contains("certificate, password, ssh, rsa"));
    }

    #[test]
    fn test_password_record_payload_shape() {
        let record = CredentialRecord::Password("hunter2".into());
        assert_eq!(record.to_value().unwrap(), json!({"type": "password", "value": "hunter2"}));
        assert_eq!(CredentialRecord::from_value(&record.to_value().unwrap()).unwrap(), record);
    }

    #[test]
    fn test_from_value_rejects_unknown_and_malformed() {
        assert!(matches!(
            CredentialRecord::from_value(&json!({"type": "json", "value": {}})),
            Err(Error::UnsupportedCredentialType { .. })
        ));
        assert!(matches!(
            CredentialRecord::from_value(&json!({"type": "certificate", "value": "nope"})),
            Err(Error::Validation(_))
        ));
        assert!(CredentialRecord::from_value(&json!({"value": "x"})).is_err());
    }

    #[test]
    fn test_debug_redacts_password() {
        let record = CredentialRecord::Password("hunter2".into());
        assert!(!format!("{:?}", record).contains("hunter2"));
    }

    #[test]
    fn test_present_stored_value() {
        assert_eq!(present_stored_value(&json!({"type": "password", "value": "pw"})), json!("pw"));
        assert_eq!(present_stored_value(&json!({"value": "raw"})), json!("raw"));
        assert_eq!(present_stored_value(&json!(["x"])), json!(["x"]));
    }

    #[tokio::test]
    async fn test_store_returns_response() {
        let store = SimpleStore::new(Arc::new(InMemoryBackend::default()));
        let record = CredentialRecord::Password("hunter2".into());

        let response = record.store(&store, "/a/pw").await.unwrap();
        assert_eq!(response.name, "/a/pw");
        assert_eq!(response.value, json!("hunter2"));

        let fetched = store.get_by_id(&response.id).await.unwrap();
        assert_eq!(CredentialRecord::from_value(&fetched.value).unwrap(), record);
    }
}
