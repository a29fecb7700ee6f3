//! Versioned key-value backend abstraction.
//!
//! A backend holds, for each path, an append-only list of versions. Writes
//! always create a new version; versions are numbered from 1 upwards per path.
//! Deletion is path-scoped and removes the whole history.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::{Error, Result};

/// Metadata about a single stored version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionMetadata {
    pub version: u64,
    pub destroyed: bool,
}

/// Available backend implementations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// HashiCorp Vault KV v2 engine
    #[default]
    Vault,
    /// Process-local store, contents are lost on restart
    Memory,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Vault => "vault",
            Self::Memory => "memory",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "vault" => Ok(Self::Vault),
            "memory" => Ok(Self::Memory),
            _ => Err(Error::config(format!("Unknown backend kind: {}", s))),
        }
    }
}

/// Connection to one versioned KV backend.
///
/// Implementations must be safe for concurrent use; per-path version ordering
/// is the backend's responsibility.
#[async_trait]
pub trait KvBackend: Send + Sync + fmt::Debug {
    /// Persist `value` as a new version at `path` and return its version number.
    ///
    /// # Errors
    ///
    /// Returns `Error::BackendUnavailable` if the backend rejects the write.
    async fn write(&self, path: &str, value: &Value) -> Result<u64>;

    /// Read one version of `path`. Version `0` resolves to the newest live version.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotFound` if the path or version does not exist or has
    /// been destroyed.
    async fn read_version(&self, path: &str, version: u64) -> Result<Value>;

    /// List every version known for `path`, ascending by version number.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotFound` if nothing was ever written at `path`.
    async fn list_versions(&self, path: &str) -> Result<Vec<VersionMetadata>>;

    /// Remove `path` and all of its versions.
    async fn delete(&self, path: &str) -> Result<()>;

    /// Whether any version exists at `path`.
    async fn exists(&self, path: &str) -> Result<bool> {
        match self.list_versions(path).await {
            Ok(versions) => Ok(versions.iter().any(|v| !v.destroyed)),
            Err(Error::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Liveness probe: initialized and unsealed, or the equivalent.
    async fn healthy(&self) -> bool;

    /// Human readable location, used in logs only.
    fn describe(&self) -> String;
}

/// Map a credential name onto a backend path.
///
/// Whitespace is dropped, empty segments are collapsed and each remaining
/// segment is percent-encoded outside the unreserved set, so
/// `"/dir/deploy/my var"` becomes `"dir/deploy/myvar"`.
pub fn name_to_path(name: &str) -> String {
    let compact: String = name.chars().filter(|c| !c.is_whitespace()).collect();
    compact
        .split('/')
        .filter(|segment| !segment.is_empty())
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}
