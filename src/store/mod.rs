//! # Secret Store
//!
//! The routing and persistence façade used by credential generators and by the
//! API layer. A store owns one default backend, which receives every write and
//! delete, and optionally a table of redirect rules that make specific names
//! resolve against remote backends.
//!
//! ```text
//! SecretStore ──► SimpleStore ───────────► default KvBackend
//!            └──► RedirectStore ─┬──────► default KvBackend (writes, deletes, cache)
//!                                └──────► remote KvBackend(s) (reads for redirected names)
//! ```

pub mod backend;
pub mod memory;
pub mod redirect;
pub mod reference;
pub mod simple;
pub mod vault;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use backend::{name_to_path, BackendKind, KvBackend, VersionMetadata};
pub use memory::InMemoryBackend;
pub use redirect::{RedirectRule, RedirectStore};
pub use reference::VersionedReference;
pub use simple::SimpleStore;
pub use vault::VaultBackend;

use crate::config::{AppConfig, BackendConfig};
use crate::errors::Result;

/// One version of a named secret as returned to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Secret {
    pub name: String,
    pub value: Value,
    /// Opaque reference to exactly this version
    pub id: String,
}

/// Versioned secret storage addressed by credential name or reference.
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Health of the default backend.
    async fn healthy(&self) -> bool;

    /// Whether a live version exists under `name` in the default backend.
    async fn exists(&self, name: &str) -> Result<bool>;

    /// Newest live version of `name`.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotFound` if `name` has no live versions.
    async fn get_latest_by_name(&self, name: &str) -> Result<Secret>;

    /// Every live version of `name`, newest first.
    async fn get_all_by_name(&self, name: &str) -> Result<Vec<Secret>>;

    /// The exact version an opaque reference points at.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidReference` for a malformed reference and
    /// `Error::NotFound` if the version does not exist.
    async fn get_by_id(&self, id: &str) -> Result<Secret>;

    /// Write a new version of `name` and return its reference.
    async fn set(&self, name: &str, value: &Value) -> Result<String>;

    /// Remove `name` and its entire history.
    async fn delete_by_name(&self, name: &str) -> Result<()>;
}

/// Construct a backend handle from configuration.
///
/// Vault backends are health-checked before being returned.
pub async fn connect_backend(config: &BackendConfig, label: &str) -> Result<Arc<dyn KvBackend>> {
    match config.kind {
        BackendKind::Memory => {
            tracing::warn!(backend = %label, "Using in-memory backend, secrets will not survive a restart");
            Ok(Arc::new(InMemoryBackend::new(label)))
        }
        BackendKind::Vault => {
            let vault = VaultBackend::connect(config).await?;
            if let Some(interval) = config.token_renew_interval() {
                vault.spawn_token_renewal(interval);
            }
            Ok(Arc::new(vault))
        }
    }
}

/// Build the store described by the configuration.
///
/// An unreachable default backend is an error. A redirect backend that cannot
/// be reached at startup is logged and its rules are skipped.
pub async fn build_store(config: &AppConfig) -> Result<Arc<dyn SecretStore>> {
    let default = connect_backend(&config.vault, "default").await?;

    if config.redirects.is_empty() {
        tracing::info!(backend = %default.describe(), "Using simple secret store");
        return Ok(Arc::new(SimpleStore::new(default)));
    }

    let mut rules = Vec::new();
    for (index, redirect) in config.redirects.iter().enumerate() {
        let remote = match connect_backend(&redirect.vault, &format!("redirect-{}", index)).await {
            Ok(remote) => remote,
            Err(e) => {
                tracing::error!(
                    error = %e,
                    address = %redirect.vault.address,
                    "Could not connect to redirect backend, skipping its rules"
                );
                continue;
            }
        };
        for rule in &redirect.rules {
            rules.push(RedirectRule::new(&rule.reference, &rule.redirect, Arc::clone(&remote)));
        }
    }

    tracing::info!(backend = %default.describe(), rule_count = rules.len(), "Using redirect secret store");
    Ok(Arc::new(RedirectStore::new(default, rules)))
}
