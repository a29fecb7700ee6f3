//! Credential operations exposed to the HTTP layer.
//!
//! `CredentialService` ties the request parser, the credential kinds and the
//! secret store together. Returned secrets carry presented values: a bare
//! string for passwords, the record object for every other kind.

use std::sync::Arc;

use tracing::{debug, info, instrument};

use crate::config::CredentialDefaults;
use crate::credentials::{
    parse_generation_request, parse_set_request, present_stored_value, CredentialResponse,
    GenerationMode,
};
use crate::errors::{Error, Result};
use crate::store::{Secret, SecretStore};

/// Result of a generation request.
#[derive(Debug, Clone, PartialEq)]
pub struct Generated {
    pub response: CredentialResponse,
    /// False when no-overwrite mode returned an existing credential
    pub created: bool,
}

#[derive(Clone)]
pub struct CredentialService {
    store: Arc<dyn SecretStore>,
    defaults: CredentialDefaults,
}

impl std::fmt::Debug for CredentialService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialService").field("defaults", &self.defaults).finish()
    }
}

impl CredentialService {
    pub fn new(store: Arc<dyn SecretStore>, defaults: CredentialDefaults) -> Self {
        Self { store, defaults }
    }

    /// Parse, validate, generate and store a credential.
    ///
    /// In no-overwrite mode an existing credential is returned untouched.
    #[instrument(skip(self, body), fields(body_len = body.len()))]
    pub async fn generate(&self, body: &[u8]) -> Result<Generated> {
        let parsed = parse_generation_request(body, &self.defaults)?;
        let generator = parsed.generator;
        let name = generator.name().to_string();
        let kind = generator.credential_type();

        if parsed.mode == GenerationMode::NoOverwrite && self.store.exists(&name).await? {
            let latest = self.store.get_latest_by_name(&name).await?;
            info!(name = %name, credential_type = %kind, "Credential exists, not overwriting");
            return Ok(Generated {
                response: CredentialResponse {
                    id: latest.id,
                    name: latest.name,
                    value: present_stored_value(&latest.value),
                },
                created: false,
            });
        }

        generator.validate().map_err(|e| match e {
            Error::Validation(reason) => {
                Error::validation(format!("invalid credential request for {}: {}", kind, reason))
            }
            other => other,
        })?;

        debug!(name = %name, credential_type = %kind, "Generating credential");
        let record = generator.generate(self.store.as_ref()).await?;
        let response = record.store(self.store.as_ref(), &name).await?;

        Ok(Generated { response, created: true })
    }

    /// Store an explicitly supplied credential value.
    #[instrument(skip(self, body), fields(body_len = body.len()))]
    pub async fn set_value(&self, body: &[u8]) -> Result<Secret> {
        let (name, record) = parse_set_request(body)?;
        let response = record.store(self.store.as_ref(), &name).await?;
        Ok(Secret { name: response.name, value: response.value, id: response.id })
    }

    /// Every live version of `name`, newest first.
    #[instrument(skip(self))]
    pub async fn get_by_name(&self, name: &str) -> Result<Vec<Secret>> {
        let name = required(name, "name")?;
        let secrets = self.store.get_all_by_name(name).await?;
        Ok(secrets.into_iter().map(present).collect())
    }

    #[instrument(skip(self))]
    pub async fn get_by_id(&self, id: &str) -> Result<Secret> {
        let id = required(id, "id")?;
        self.store.get_by_id(id).await.map(present)
    }

    #[instrument(skip(self))]
    pub async fn delete_by_name(&self, name: &str) -> Result<()> {
        let name = required(name, "name")?;
        self.store.delete_by_name(name).await?;
        info!(name = %name, "Deleted credential");
        Ok(())
    }

    pub async fn healthy(&self) -> bool {
        self.store.healthy().await
    }
}

fn present(secret: Secret) -> Secret {
    Secret { value: present_stored_value(&secret.value), ..secret }
}

fn required<'a>(value: &'a str, field: &str) -> Result<&'a str> {
    if value.trim().is_empty() {
        return Err(Error::validation(format!("{} must not be empty", field)));
    }
    Ok(value)
}
