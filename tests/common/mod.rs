//! Shared fixtures for integration tests. Everything runs against in-memory
//! backends, so no Vault server is needed.

#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    Router,
};
use bosh_vault::{
    api::build_router,
    config::CredentialDefaults,
    service::CredentialService,
    store::{InMemoryBackend, KvBackend, RedirectRule, RedirectStore, SecretStore, SimpleStore},
};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

pub const ROOT_CA_BODY: &str =
    r#"{"name":"my_ca","type":"certificate","parameters":{"is_ca":true,"common_name":"bosh.io"}}"#;

pub const INTERMEDIATE_CA_BODY: &str = r#"{"name":"my_intermediate","type":"certificate","parameters":{"is_ca":true,"ca":"my_ca","common_name":"intermediate.bosh.io"}}"#;

pub const LEAF_BODY: &str = r#"{"name":"my_cert","type":"certificate","parameters":{"ca":"my_intermediate","common_name":"bosh.io","alternative_names":["bosh.io","blah.bosh.io","10.0.0.1"]}}"#;

pub struct TestApp {
    pub router: Router,
    pub service: Arc<CredentialService>,
    pub backend: Arc<InMemoryBackend>,
}

pub fn service_with_store(store: Arc<dyn SecretStore>) -> Arc<CredentialService> {
    Arc::new(CredentialService::new(store, CredentialDefaults::default()))
}

/// App over a single in-memory backend.
pub fn simple_app() -> TestApp {
    let backend = Arc::new(InMemoryBackend::new("default"));
    let store: Arc<dyn SecretStore> = Arc::new(SimpleStore::new(backend.clone()));
    let service = service_with_store(store);
    TestApp { router: build_router(service.clone()), service, backend }
}

/// Default backend plus one remote, with `/dir/dep/pw` redirected to
/// `/shared/pw` on the remote.
pub struct RedirectFixture {
    pub default: Arc<InMemoryBackend>,
    pub remote: Arc<InMemoryBackend>,
    pub store: Arc<RedirectStore>,
}

pub fn redirect_fixture() -> RedirectFixture {
    let default = Arc::new(InMemoryBackend::new("default"));
    let remote = Arc::new(InMemoryBackend::new("remote"));
    let remote_handle: Arc<dyn KvBackend> = remote.clone();
    let store = Arc::new(RedirectStore::new(
        default.clone(),
        vec![RedirectRule::new("/dir/dep/pw", "/shared/pw", remote_handle)],
    ));
    RedirectFixture { default, remote, store }
}

pub async fn send(router: &Router, method: Method, uri: &str, body: Option<&str>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if body.is_some() {
        builder = builder.header("content-type", "application/json");
    }
    let request = builder
        .body(body.map(|b| Body::from(b.to_string())).unwrap_or_else(Body::empty))
        .unwrap();

    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
    (status, json)
}

pub fn query_name(name: &str) -> String {
    format!("/v1/data?name={}", urlencoding::encode(name))
}
