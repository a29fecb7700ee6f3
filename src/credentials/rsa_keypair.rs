use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::keys;
use super::{CredentialGenerator, CredentialRecord, CredentialType};
use crate::errors::Result;
use crate::store::SecretStore;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeypairParameters {
    pub key_length: usize,
}

impl Default for KeypairParameters {
    fn default() -> Self {
        Self { key_length: keys::default_key_length() }
    }
}

/// PEM encoded RSA keypair.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RsaKeypairRecord {
    pub public_key: String,
    pub private_key: String,
}

impl fmt::Debug for RsaKeypairRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RsaKeypairRecord")
            .field("public_key", &self.public_key)
            .field("private_key", &"[REDACTED]")
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct RsaKeypairRequest {
    pub name: String,
    pub parameters: KeypairParameters,
}

#[async_trait]
impl CredentialGenerator for RsaKeypairRequest {
    fn name(&self) -> &str {
        &self.name
    }

    fn credential_type(&self) -> CredentialType {
        CredentialType::Rsa
    }

    fn validate(&self) -> Result<()> {
        keys::validate_key_length(self.parameters.key_length)
    }

    async fn generate(&self, _store: &dyn SecretStore) -> Result<CredentialRecord> {
        let key = keys::generate_rsa_key(self.parameters.key_length).await?;
        Ok(CredentialRecord::Rsa(RsaKeypairRecord {
            public_key: keys::public_key_pem(&key)?,
            private_key: keys::private_key_pkcs1_pem(&key)?,
        }))
    }
}
