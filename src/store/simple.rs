use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use super::backend::{name_to_path, KvBackend};
use super::reference::VersionedReference;
use super::{Secret, SecretStore};
use crate::errors::{Error, Result};

/// Store backed by exactly one backend.
#[derive(Debug, Clone)]
pub struct SimpleStore {
    backend: Arc<dyn KvBackend>,
}

impl SimpleStore {
    pub fn new(backend: Arc<dyn KvBackend>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl SecretStore for SimpleStore {
    async fn healthy(&self) -> bool {
        self.backend.healthy().await
    }

    async fn exists(&self, name: &str) -> Result<bool> {
        self.backend.exists(&name_to_path(name)).await
    }

    async fn get_latest_by_name(&self, name: &str) -> Result<Secret> {
        latest(self.backend.as_ref(), name).await
    }

    async fn get_all_by_name(&self, name: &str) -> Result<Vec<Secret>> {
        all_versions(self.backend.as_ref(), name).await
    }

    async fn get_by_id(&self, id: &str) -> Result<Secret> {
        let reference = VersionedReference::decode(id)?;
        read_reference(self.backend.as_ref(), &reference).await
    }

    async fn set(&self, name: &str, value: &Value) -> Result<String> {
        write(self.backend.as_ref(), name, value).await
    }

    async fn delete_by_name(&self, name: &str) -> Result<()> {
        delete(self.backend.as_ref(), name).await
    }
}

/// Read one version, labelling the result with the reference's name.
pub(crate) async fn read_reference(
    backend: &dyn KvBackend,
    reference: &VersionedReference,
) -> Result<Secret> {
    let path = name_to_path(&reference.name);
    let value = backend.read_version(&path, reference.version).await?;
    Ok(Secret { name: reference.name.clone(), value, id: reference.encode()? })
}

pub(crate) async fn latest(backend: &dyn KvBackend, name: &str) -> Result<Secret> {
    let path = name_to_path(name);
    let newest = backend
        .list_versions(&path)
        .await?
        .into_iter()
        .rev()
        .find(|v| !v.destroyed)
        .ok_or_else(|| Error::not_found(name.to_string()))?;
    read_reference(backend, &VersionedReference::new(name, newest.version)).await
}

/// Every live version of `name`, newest first.
///
/// A version that disappears between listing and reading is logged and left
/// out of the result.
pub(crate) async fn all_versions(backend: &dyn KvBackend, name: &str) -> Result<Vec<Secret>> {
    let path = name_to_path(name);
    let versions = backend.list_versions(&path).await?;

    let mut secrets = Vec::with_capacity(versions.len());
    for meta in versions.iter().rev().filter(|v| !v.destroyed) {
        let reference = VersionedReference::new(name, meta.version);
        match read_reference(backend, &reference).await {
            Ok(secret) => secrets.push(secret),
            Err(Error::NotFound(_)) => {
                tracing::warn!(name = %name, version = meta.version, "Listed version could not be read");
            }
            Err(e) => return Err(e),
        }
    }
    Ok(secrets)
}

pub(crate) async fn write(backend: &dyn KvBackend, name: &str, value: &Value) -> Result<String> {
    let path = name_to_path(name);
    let version = backend.write(&path, value).await?;
    tracing::debug!(name = %name, version, "Stored secret version");
    VersionedReference::new(name, version).encode()
}

pub(crate) async fn delete(backend: &dyn KvBackend, name: &str) -> Result<()> {
    backend.delete(&name_to_path(name)).await?;
    tracing::info!(name = %name, "Deleted secret and all versions");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::InMemoryBackend;
    use crate::store::reference;
    use serde_json::json;

    fn store() -> (Arc<InMemoryBackend>, SimpleStore) {
        let backend = Arc::new(InMemoryBackend::default());
        (backend.clone(), SimpleStore::new(backend))
    }

    #[tokio::test]
    async fn test_set_returns_versioned_reference() {
        let (_, store) = store();

        let first = store.set("/dir/dep/pw", &json!({"value": "a"})).await.unwrap();
        let second = store.set("/dir/dep/pw", &json!({"value": "b"})).await.unwrap();

        assert_eq!(reference::decode(&first).unwrap(), VersionedReference::new("/dir/dep/pw", 1));
        assert_eq!(reference::decode(&second).unwrap(), VersionedReference::new("/dir/dep/pw", 2));
    }

    #[tokio::test]
    async fn test_get_by_id_returns_exact_version() {
        let (_, store) = store();
        let first = store.set("pw", &json!({"value": "a"})).await.unwrap();
        store.set("pw", &json!({"value": "b"})).await.unwrap();

        let secret = store.get_by_id(&first).await.unwrap();
        assert_eq!(secret.value, json!({"value": "a"}));
        assert_eq!(secret.id, first);
        assert_eq!(secret.name, "pw");
    }

    #[tokio::test]
    async fn test_get_all_newest_first_skipping_destroyed() {
        let (backend, store) = store();
        for v in ["a", "b", "c"] {
            store.set("pw", &json!({ "value": v })).await.unwrap();
        }
        backend.destroy_version("pw", 2).await.unwrap();

        let all = store.get_all_by_name("pw").await.unwrap();
        let values: Vec<_> = all.iter().map(|s| s.value["value"].clone()).collect();
        assert_eq!(values, vec![json!("c"), json!("a")]);
        assert_eq!(reference::decode(&all[0].id).unwrap().version, 3);
        assert_eq!(reference::decode(&all[1].id).unwrap().version, 1);
    }

    #[tokio::test]
    async fn test_latest_has_concrete_version() {
        let (_, store) = store();
        store.set("pw", &json!({"value": "a"})).await.unwrap();
        let id = store.set("pw", &json!({"value": "b"})).await.unwrap();

        let latest = store.get_latest_by_name("pw").await.unwrap();
        assert_eq!(latest.id, id);
        assert_eq!(latest.value, json!({"value": "b"}));
    }

    #[tokio::test]
    async fn test_latest_not_found_when_all_destroyed() {
        let (backend, store) = store();
        store.set("pw", &json!({"value": "a"})).await.unwrap();
        backend.destroy_version("pw", 1).await.unwrap();

        assert!(matches!(store.get_latest_by_name("pw").await, Err(Error::NotFound(_))));
        assert!(store.get_all_by_name("pw").await.unwrap().is_empty());
        assert!(matches!(store.get_latest_by_name("never").await, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_latest_reference_resolves() {
        let (_, store) = store();
        store.set("pw", &json!({"value": "a"})).await.unwrap();
        store.set("pw", &json!({"value": "b"})).await.unwrap();

        let id = reference::encode("pw", 0).unwrap();
        assert_eq!(store.get_by_id(&id).await.unwrap().value, json!({"value": "b"}));
    }

    #[tokio::test]
    async fn test_names_with_spaces_share_a_path() {
        let (_, store) = store();
        store.set("my pw", &json!({"value": "a"})).await.unwrap();
        assert!(store.exists("mypw").await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_removes_everything() {
        let (_, store) = store();
        let id = store.set("pw", &json!({"value": "a"})).await.unwrap();
        store.delete_by_name("pw").await.unwrap();

        assert!(!store.exists("pw").await.unwrap());
        assert!(matches!(store.get_by_id(&id).await, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_invalid_reference() {
        let (_, store) = store();
        assert!(matches!(
            store.get_by_id("$$$wakawakawaka$$$").await,
            Err(Error::InvalidReference { .. })
        ));
    }
}
