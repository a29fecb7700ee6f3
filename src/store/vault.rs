//! HashiCorp Vault KV v2 backend.
//!
//! Each credential path maps to one KV v2 secret whose versions are the
//! credential's history. Vault assigns version numbers; a metadata delete
//! removes the whole history at once.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::Instrument;
use vaultrs::client::{VaultClient, VaultClientSettingsBuilder};
use vaultrs::error::ClientError;
use vaultrs::kv2;

use super::backend::{KvBackend, VersionMetadata};
use super::reference::LATEST_VERSION;
use crate::config::BackendConfig;
use crate::errors::{Error, Result};

/// KV v2 backend over a shared `VaultClient`.
#[derive(Clone)]
pub struct VaultBackend {
    client: Arc<VaultClient>,
    address: String,
    mount: String,
}

impl fmt::Debug for VaultBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VaultBackend")
            .field("address", &self.address)
            .field("mount", &self.mount)
            .field("client", &"<VaultClient>")
            .finish()
    }
}

impl VaultBackend {
    /// Build a client from configuration without contacting the server.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if the address is empty or the settings are rejected
    /// - [`Error::BackendUnavailable`] if the HTTP client cannot be built
    pub fn new(config: &BackendConfig) -> Result<Self> {
        if config.address.is_empty() {
            return Err(Error::config("Vault address cannot be empty"));
        }

        let mut settings_builder = VaultClientSettingsBuilder::default();
        settings_builder
            .address(&config.address)
            .token(config.token.expose_secret())
            .timeout(Some(config.timeout()))
            .verify(!config.skip_verify);

        if let Some(namespace) = &config.namespace {
            settings_builder.namespace(Some(namespace.clone()));
        }

        if let Some(ca) = &config.ca {
            settings_builder.ca_certs(vec![ca.display().to_string()]);
        }

        let settings = settings_builder
            .build()
            .map_err(|e| Error::config(format!("Invalid Vault configuration: {}", e)))?;

        let client = VaultClient::new(settings)
            .map_err(|e| Error::backend(format!("Failed to create Vault client: {}", e)))?;

        Ok(Self {
            client: Arc::new(client),
            address: config.address.clone(),
            mount: config.mount.clone(),
        })
    }

    /// Build a client and verify the server answers its health endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BackendUnavailable`] if Vault cannot be reached.
    pub async fn connect(config: &BackendConfig) -> Result<Self> {
        let backend = Self::new(config)?;

        match vaultrs::sys::health(backend.client.as_ref()).await {
            Ok(_) => {
                tracing::info!(address = %backend.address, mount = %backend.mount, "Successfully connected to Vault");
                Ok(backend)
            }
            Err(e) => {
                tracing::error!(error = %e, address = %backend.address, "Failed to connect to Vault");
                Err(Error::backend(format!("Vault health check failed for {}: {}", backend.address, e)))
            }
        }
    }

    /// Renew the client token on a fixed interval.
    ///
    /// A failed renewal is logged and the current token keeps serving requests
    /// until a later tick succeeds.
    pub fn spawn_token_renewal(&self, interval: std::time::Duration) -> JoinHandle<()> {
        let client = Arc::clone(&self.client);
        let address = self.address.clone();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // the first tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                match vaultrs::token::renew_self(client.as_ref(), None).await {
                    Ok(auth) => {
                        tracing::debug!(address = %address, lease_duration = auth.lease_duration, "Renewed Vault token");
                    }
                    Err(e) => {
                        tracing::error!(error = %e, address = %address, "Failed to renew Vault token, keeping current token");
                    }
                }
            }
        })
    }

    fn map_error(&self, path: &str, operation: &str, err: ClientError) -> Error {
        match err {
            ClientError::APIError { code: 404, .. } => Error::not_found(path.to_string()),
            other => {
                tracing::error!(error = %other, path = %path, address = %self.address, "Vault {} failed", operation);
                Error::backend(format!("Vault {} failed for '{}': {}", operation, path, other))
            }
        }
    }
}

#[async_trait]
impl KvBackend for VaultBackend {
    async fn write(&self, path: &str, value: &Value) -> Result<u64> {
        if !value.is_object() {
            return Err(Error::validation("Vault KV v2 only stores JSON objects"));
        }
        let metadata = kv2::set(self.client.as_ref(), &self.mount, path, value)
            .instrument(crate::backend_span!("write", self.describe(), path = %path))
            .await
            .map_err(|e| self.map_error(path, "write", e))?;

        tracing::debug!(path = %path, version = metadata.version, "Wrote secret version to Vault");
        Ok(metadata.version)
    }

    async fn read_version(&self, path: &str, version: u64) -> Result<Value> {
        let span = crate::backend_span!("read_version", self.describe(), path = %path, version);
        let result = if version == LATEST_VERSION {
            kv2::read::<Value>(self.client.as_ref(), &self.mount, path).instrument(span).await
        } else {
            kv2::read_version::<Value>(self.client.as_ref(), &self.mount, path, version)
                .instrument(span)
                .await
        };
        result.map_err(|e| self.map_error(path, "read", e))
    }

    async fn list_versions(&self, path: &str) -> Result<Vec<VersionMetadata>> {
        let metadata = kv2::read_metadata(self.client.as_ref(), &self.mount, path)
            .instrument(crate::backend_span!("list_versions", self.describe(), path = %path))
            .await
            .map_err(|e| self.map_error(path, "metadata read", e))?;

        let mut versions: Vec<VersionMetadata> = metadata
            .versions
            .iter()
            .filter_map(|(number, meta)| {
                let version = number.parse::<u64>().ok()?;
                Some(VersionMetadata {
                    version,
                    destroyed: meta.destroyed || !meta.deletion_time.is_empty(),
                })
            })
            .collect();
        versions.sort_by_key(|v| v.version);
        Ok(versions)
    }

    async fn delete(&self, path: &str) -> Result<()> {
        kv2::delete_metadata(self.client.as_ref(), &self.mount, path)
            .instrument(crate::backend_span!("delete", self.describe(), path = %path))
            .await
            .map_err(|e| self.map_error(path, "delete", e))
    }

    async fn healthy(&self) -> bool {
        match vaultrs::sys::health(self.client.as_ref()).await {
            Ok(health) => health.initialized && !health.sealed,
            Err(e) => {
                tracing::warn!(error = %e, address = %self.address, "Vault health check failed");
                false
            }
        }
    }

    fn describe(&self) -> String {
        format!("{}/{}", self.address, self.mount)
    }
}
