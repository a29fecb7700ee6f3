//! In-memory versioned backend.
//!
//! Behaves like a KV v2 mount: per-path version history, soft-destroyed
//! versions, and a togglable health flag so outage handling can be exercised
//! without a Vault server.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use super::backend::{KvBackend, VersionMetadata};
use super::reference::LATEST_VERSION;
use crate::errors::{Error, Result};

#[derive(Debug, Clone)]
struct StoredVersion {
    value: Value,
    destroyed: bool,
}

#[derive(Debug)]
pub struct InMemoryBackend {
    label: String,
    data: RwLock<HashMap<String, Vec<StoredVersion>>>,
    healthy: AtomicBool,
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new("memory")
    }
}

impl InMemoryBackend {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            data: RwLock::new(HashMap::new()),
            healthy: AtomicBool::new(true),
        }
    }

    /// Flip the liveness probe result.
    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }

    /// Mark a single version destroyed, keeping its slot in the history.
    pub async fn destroy_version(&self, path: &str, version: u64) -> Result<()> {
        let mut data = self.data.write().await;
        let slot = data
            .get_mut(path)
            .and_then(|versions| versions.get_mut(index_of(version)?))
            .ok_or_else(|| Error::not_found(format!("{}@{}", path, version)))?;
        slot.destroyed = true;
        Ok(())
    }

    /// Number of versions ever written at `path`, destroyed ones included.
    pub async fn version_count(&self, path: &str) -> usize {
        self.data.read().await.get(path).map(Vec::len).unwrap_or(0)
    }
}

fn index_of(version: u64) -> Option<usize> {
    usize::try_from(version).ok()?.checked_sub(1)
}

#[async_trait]
impl KvBackend for InMemoryBackend {
    async fn write(&self, path: &str, value: &Value) -> Result<u64> {
        if !self.healthy.load(Ordering::SeqCst) {
            return Err(Error::backend(format!("{} is unavailable", self.label)));
        }
        let mut data = self.data.write().await;
        let versions = data.entry(path.to_string()).or_default();
        versions.push(StoredVersion { value: value.clone(), destroyed: false });
        Ok(versions.len() as u64)
    }

    async fn read_version(&self, path: &str, version: u64) -> Result<Value> {
        if !self.healthy.load(Ordering::SeqCst) {
            return Err(Error::backend(format!("{} is unavailable", self.label)));
        }
        let data = self.data.read().await;
        let versions = data.get(path).ok_or_else(|| Error::not_found(path.to_string()))?;

        let found = if version == LATEST_VERSION {
            versions.iter().rev().find(|v| !v.destroyed)
        } else {
            index_of(version).and_then(|idx| versions.get(idx)).filter(|v| !v.destroyed)
        };

        found
            .map(|v| v.value.clone())
            .ok_or_else(|| Error::not_found(format!("{}@{}", path, version)))
    }

    async fn list_versions(&self, path: &str) -> Result<Vec<VersionMetadata>> {
        if !self.healthy.load(Ordering::SeqCst) {
            return Err(Error::backend(format!("{} is unavailable", self.label)));
        }
        let data = self.data.read().await;
        let versions = data.get(path).ok_or_else(|| Error::not_found(path.to_string()))?;
        Ok(versions
            .iter()
            .enumerate()
            .map(|(idx, v)| VersionMetadata { version: idx as u64 + 1, destroyed: v.destroyed })
            .collect())
    }

    async fn delete(&self, path: &str) -> Result<()> {
        if !self.healthy.load(Ordering::SeqCst) {
            return Err(Error::backend(format!("{} is unavailable", self.label)));
        }
        self.data.write().await.remove(path);
        Ok(())
    }

    async fn healthy(&self) -> bool {
        self.healthy.load(Ordering::SeqCst)
    }

    fn describe(&self) -> String {
        format!("memory://{}", self.label)
    }
}
