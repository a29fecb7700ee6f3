//! Redirect store: per-name routing of reads to remote backends.
//!
//! Redirects are a read-path concept. A rule `{ref, target}` makes reads of
//! `ref` resolve against `target` in a remote backend. Results are always
//! labelled with the requested name, never the remote target, and every
//! version read remotely is replayed into the default backend so the name
//! keeps resolving locally when the remote goes away.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use super::backend::{name_to_path, KvBackend};
use super::reference::VersionedReference;
use super::simple;
use super::{Secret, SecretStore};
use crate::errors::{Error, Result};

/// Static mapping from an externally visible name to a remote name.
#[derive(Clone)]
pub struct RedirectRule {
    pub reference: String,
    pub target: String,
    pub backend: Arc<dyn KvBackend>,
}

impl fmt::Debug for RedirectRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedirectRule")
            .field("ref", &self.reference)
            .field("target", &self.target)
            .field("backend", &self.backend.describe())
            .finish()
    }
}

impl RedirectRule {
    pub fn new(reference: &str, target: &str, backend: Arc<dyn KvBackend>) -> Self {
        Self { reference: reference.to_string(), target: target.to_string(), backend }
    }
}

#[derive(Debug, Clone)]
pub struct RedirectStore {
    default: Arc<dyn KvBackend>,
    rules: Vec<RedirectRule>,
}

impl RedirectStore {
    pub fn new(default: Arc<dyn KvBackend>, rules: Vec<RedirectRule>) -> Self {
        Self { default, rules }
    }

    /// First rule for `name` in declaration order. An unhealthy remote
    /// disables the rule and the read falls through to the default backend.
    async fn find_rule(&self, name: &str) -> Option<&RedirectRule> {
        let rule = self.rules.iter().find(|r| r.reference == name)?;
        if rule.backend.healthy().await {
            tracing::debug!(name = %name, target = %rule.target, backend = %rule.backend.describe(), "Redirecting read");
            return Some(rule);
        }
        tracing::warn!(
            name = %name,
            backend = %rule.backend.describe(),
            "Redirect backend unhealthy, ignoring rule"
        );
        None
    }

    /// Copy `values` (oldest first) into the default backend under `name`.
    ///
    /// Values already cached locally are not written again, regardless of
    /// where they sit in either history, so destroyed remote versions do not
    /// cause re-writes. A value repeated within the remote history is cached
    /// once. Failures are logged and swallowed.
    async fn replay(&self, name: &str, values: &[&Value]) {
        let mut cached = match simple::all_versions(self.default.as_ref(), name).await {
            Ok(secrets) => secrets.into_iter().map(|s| s.value).collect::<Vec<_>>(),
            Err(Error::NotFound(_)) => Vec::new(),
            Err(e) => {
                tracing::error!(error = %e, name = %name, "Could not read local cache before replay");
                Vec::new()
            }
        };

        let path = name_to_path(name);
        for value in values {
            if cached.contains(*value) {
                continue;
            }
            match self.default.write(&path, value).await {
                Ok(_) => cached.push((*value).clone()),
                Err(e) => {
                    tracing::error!(error = %e, name = %name, "Failed to cache redirected secret locally")
                }
            }
        }
    }

    /// Like `replay` for a single value: skipped when it is already the newest local version.
    async fn cache_one(&self, name: &str, value: &Value) {
        match simple::latest(self.default.as_ref(), name).await {
            Ok(local) if &local.value == value => {}
            _ => {
                if let Err(e) = self.default.write(&name_to_path(name), value).await {
                    tracing::error!(error = %e, name = %name, "Failed to cache redirected secret locally");
                }
            }
        }
    }
}

/// Relabel a remotely fetched secret with the name the caller asked for.
fn normalize(secret: Secret, requested: &str) -> Result<Secret> {
    let remote = VersionedReference::decode(&secret.id)?;
    Ok(Secret {
        name: requested.to_string(),
        value: secret.value,
        id: VersionedReference::new(requested, remote.version).encode()?,
    })
}

#[async_trait]
impl SecretStore for RedirectStore {
    async fn healthy(&self) -> bool {
        self.default.healthy().await
    }

    async fn exists(&self, name: &str) -> Result<bool> {
        self.default.exists(&name_to_path(name)).await
    }

    async fn get_latest_by_name(&self, name: &str) -> Result<Secret> {
        simple::latest(self.default.as_ref(), name).await
    }

    async fn get_all_by_name(&self, name: &str) -> Result<Vec<Secret>> {
        let Some(rule) = self.find_rule(name).await else {
            return simple::all_versions(self.default.as_ref(), name).await;
        };

        let remote = simple::all_versions(rule.backend.as_ref(), &rule.target).await?;
        let normalized = remote
            .into_iter()
            .map(|secret| normalize(secret, name))
            .collect::<Result<Vec<_>>>()?;

        let oldest_first: Vec<&Value> = normalized.iter().rev().map(|s| &s.value).collect();
        self.replay(name, &oldest_first).await;

        Ok(normalized)
    }

    async fn get_by_id(&self, id: &str) -> Result<Secret> {
        let reference = VersionedReference::decode(id)?;

        let Some(rule) = self.find_rule(&reference.name).await else {
            return simple::read_reference(self.default.as_ref(), &reference).await;
        };

        let remote_reference = VersionedReference::new(&rule.target, reference.version);
        let secret = simple::read_reference(rule.backend.as_ref(), &remote_reference).await?;
        let secret = normalize(secret, &reference.name)?;

        self.cache_one(&reference.name, &secret.value).await;
        Ok(secret)
    }

    async fn set(&self, name: &str, value: &Value) -> Result<String> {
        simple::write(self.default.as_ref(), name, value).await
    }

    async fn delete_by_name(&self, name: &str) -> Result<()> {
        simple::delete(self.default.as_ref(), name).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::InMemoryBackend;
    use crate::store::reference;
    use serde_json::json;
    use tracing_test::traced_test;

    struct Fixture {
        local: Arc<InMemoryBackend>,
        remote: Arc<InMemoryBackend>,
        store: RedirectStore,
    }

    async fn fixture() -> Fixture {
        let local = Arc::new(InMemoryBackend::new("local"));
        let remote = Arc::new(InMemoryBackend::new("remote"));
        for v in ["one", "two", "three"] {
            remote.write("shared/pw", &json!({ "value": v })).await.unwrap();
        }
        let rules = vec![RedirectRule::new("/dir/dep/pw", "/shared/pw", remote.clone())];
        let store = RedirectStore::new(local.clone(), rules);
        Fixture { local, remote, store }
    }

    #[tokio::test]
    async fn test_get_all_normalizes_names() {
        let f = fixture().await;

        let secrets = f.store.get_all_by_name("/dir/dep/pw").await.unwrap();
        assert_eq!(secrets.len(), 3);
        for secret in &secrets {
            assert_eq!(secret.name, "/dir/dep/pw");
            let decoded = reference::decode(&secret.id).unwrap();
            assert_eq!(decoded.name, "/dir/dep/pw");
            assert!(!secret.id.is_empty());
        }
        let versions: Vec<u64> =
            secrets.iter().map(|s| reference::decode(&s.id).unwrap().version).collect();
        assert_eq!(versions, vec![3, 2, 1]);
        assert_eq!(secrets[0].value, json!({"value": "three"}));
    }

    #[tokio::test]
    async fn test_get_all_caches_oldest_first() {
        let f = fixture().await;
        f.store.get_all_by_name("/dir/dep/pw").await.unwrap();

        assert_eq!(f.local.read_version("dir/dep/pw", 1).await.unwrap(), json!({"value": "one"}));
        assert_eq!(f.local.read_version("dir/dep/pw", 3).await.unwrap(), json!({"value": "three"}));
        assert_eq!(f.local.version_count("shared/pw").await, 0);
    }

    #[tokio::test]
    async fn test_repeated_reads_do_not_grow_cache() {
        let f = fixture().await;
        f.store.get_all_by_name("/dir/dep/pw").await.unwrap();
        f.store.get_all_by_name("/dir/dep/pw").await.unwrap();
        assert_eq!(f.local.version_count("dir/dep/pw").await, 3);

        f.remote.write("shared/pw", &json!({"value": "four"})).await.unwrap();
        f.store.get_all_by_name("/dir/dep/pw").await.unwrap();
        assert_eq!(f.local.version_count("dir/dep/pw").await, 4);
        assert_eq!(f.local.read_version("dir/dep/pw", 0).await.unwrap(), json!({"value": "four"}));
    }

    #[tokio::test]
    async fn test_unhealthy_remote_falls_back_to_default() {
        let f = fixture().await;
        f.local.write("dir/dep/pw", &json!({"value": "local"})).await.unwrap();
        f.remote.set_healthy(false);

        let secrets = f.store.get_all_by_name("/dir/dep/pw").await.unwrap();
        assert_eq!(secrets.len(), 1);
        assert_eq!(secrets[0].value, json!({"value": "local"}));
    }

    #[tokio::test]
    async fn test_cache_serves_after_remote_outage() {
        let f = fixture().await;
        let remote_view = f.store.get_all_by_name("/dir/dep/pw").await.unwrap();
        f.remote.set_healthy(false);

        let local_view = f.store.get_all_by_name("/dir/dep/pw").await.unwrap();
        assert_eq!(remote_view, local_view);
    }

    #[tokio::test]
    async fn test_unhealthy_first_rule_is_not_skipped() {
        let local = Arc::new(InMemoryBackend::new("local"));
        let primary = Arc::new(InMemoryBackend::new("primary"));
        let secondary = Arc::new(InMemoryBackend::new("secondary"));
        local.write("a", &json!({"value": "from-default"})).await.unwrap();
        secondary.write("b", &json!({"value": "from-secondary"})).await.unwrap();
        primary.set_healthy(false);

        let store = RedirectStore::new(
            local,
            vec![
                RedirectRule::new("a", "b", primary),
                RedirectRule::new("a", "b", secondary),
            ],
        );
        let secrets = store.get_all_by_name("a").await.unwrap();
        assert_eq!(secrets.len(), 1);
        assert_eq!(secrets[0].value, json!({"value": "from-default"}));
    }

    #[tokio::test]
    async fn test_destroyed_remote_version_does_not_duplicate_cache() {
        let f = fixture().await;
        f.store.get_all_by_name("/dir/dep/pw").await.unwrap();
        assert_eq!(f.local.version_count("dir/dep/pw").await, 3);

        f.remote.destroy_version("shared/pw", 2).await.unwrap();
        let secrets = f.store.get_all_by_name("/dir/dep/pw").await.unwrap();
        assert_eq!(secrets.len(), 2);
        assert_eq!(f.local.version_count("dir/dep/pw").await, 3);
    }

    #[tokio::test]
    async fn test_get_by_id_redirects_and_caches() {
        let f = fixture().await;
        let id = reference::encode("/dir/dep/pw", 2).unwrap();

        let secret = f.store.get_by_id(&id).await.unwrap();
        assert_eq!(secret.value, json!({"value": "two"}));
        assert_eq!(secret.name, "/dir/dep/pw");
        assert_eq!(secret.id, id);

        assert_eq!(f.local.read_version("dir/dep/pw", 0).await.unwrap(), json!({"value": "two"}));
        f.store.get_by_id(&id).await.unwrap();
        assert_eq!(f.local.version_count("dir/dep/pw").await, 1);
    }

    #[tokio::test]
    async fn test_get_by_id_without_rule_reads_default() {
        let f = fixture().await;
        let id = f.store.set("/other", &json!({"value": "x"})).await.unwrap();
        assert_eq!(f.store.get_by_id(&id).await.unwrap().value, json!({"value": "x"}));
    }

    #[tokio::test]
    async fn test_writes_and_deletes_only_touch_default() {
        let f = fixture().await;
        f.store.set("/dir/dep/pw", &json!({"value": "mine"})).await.unwrap();
        assert_eq!(f.remote.version_count("shared/pw").await, 3);
        assert_eq!(f.remote.version_count("dir/dep/pw").await, 0);

        let latest = f.store.get_latest_by_name("/dir/dep/pw").await.unwrap();
        assert_eq!(latest.value, json!({"value": "mine"}));

        f.store.delete_by_name("/dir/dep/pw").await.unwrap();
        assert_eq!(f.remote.version_count("shared/pw").await, 3);
        assert!(!f.store.exists("/dir/dep/pw").await.unwrap());
    }

    #[tokio::test]
    #[traced_test]
    async fn test_cache_failure_does_not_fail_read() {
        let f = fixture().await;
        f.local.set_healthy(false);

        let secrets = f.store.get_all_by_name("/dir/dep/pw").await.unwrap();
        assert_eq!(secrets.len(), 3);
        assert!(!f.store.healthy().await);
        assert!(logs_contain("Failed to cache redirected secret locally"));
    }

    #[tokio::test]
    async fn test_latest_not_found_on_empty_default() {
        let f = fixture().await;
        assert!(matches!(
            f.store.get_latest_by_name("/dir/dep/pw").await,
            Err(Error::NotFound(_))
        ));
    }
}
