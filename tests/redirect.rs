//! Redirected reads through the HTTP API.

mod common;

use std::sync::Arc;

use axum::http::{Method, StatusCode};
use bosh_vault::api::build_router;
use bosh_vault::store::{name_to_path, KvBackend, SecretStore, VersionedReference};
use common::{query_name, redirect_fixture, send, service_with_store};
use serde_json::json;

async fn seed_remote(remote: &dyn KvBackend, values: &[&str]) {
    for value in values {
        remote
            .write(&name_to_path("/shared/pw"), &json!({"type": "password", "value": value}))
            .await
            .unwrap();
    }
}

#[tokio::test]
async fn test_redirected_name_is_normalized_and_cached() {
    let fixture = redirect_fixture();
    seed_remote(fixture.remote.as_ref(), &["v1", "v2", "v3"]).await;
    let store: Arc<dyn SecretStore> = fixture.store.clone();
    let router = build_router(service_with_store(store));

    let (status, body) = send(&router, Method::GET, &query_name("/dir/dep/pw"), None).await;
    assert_eq!(status, StatusCode::OK);

    let data = body["data"].as_array().unwrap();
    assert_eq!(data.len(), 3);
    let values: Vec<_> = data.iter().map(|s| s["value"].clone()).collect();
    assert_eq!(values, vec![json!("v3"), json!("v2"), json!("v1")]);

    for (secret, version) in data.iter().zip([3u64, 2, 1]) {
        assert_eq!(secret["name"], "/dir/dep/pw");
        let reference = VersionedReference::decode(secret["id"].as_str().unwrap()).unwrap();
        assert_eq!(reference, VersionedReference::new("/dir/dep/pw", version));
        assert!(!body.to_string().contains("shared"));
    }

    assert_eq!(fixture.default.version_count(&name_to_path("/dir/dep/pw")).await, 3);
}

#[tokio::test]
async fn test_outage_falls_back_to_local_cache() {
    let fixture = redirect_fixture();
    seed_remote(fixture.remote.as_ref(), &["v1", "v2"]).await;
    let store: Arc<dyn SecretStore> = fixture.store.clone();
    let router = build_router(service_with_store(store));

    send(&router, Method::GET, &query_name("/dir/dep/pw"), None).await;
    fixture.remote.set_healthy(false);

    let (status, body) = send(&router, Method::GET, &query_name("/dir/dep/pw"), None).await;
    assert_eq!(status, StatusCode::OK);
    let values: Vec<_> = body["data"].as_array().unwrap().iter().map(|s| s["value"].clone()).collect();
    assert_eq!(values, vec![json!("v2"), json!("v1")]);
}

#[tokio::test]
async fn test_get_by_id_resolves_remote_version() {
    let fixture = redirect_fixture();
    seed_remote(fixture.remote.as_ref(), &["v1", "v2"]).await;
    let store: Arc<dyn SecretStore> = fixture.store.clone();
    let router = build_router(service_with_store(store));

    let id = VersionedReference::new("/dir/dep/pw", 1).encode().unwrap();
    let (status, body) = send(&router, Method::GET, &format!("/v1/data/{}", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["value"], json!("v1"));
    assert_eq!(body["name"], "/dir/dep/pw");
    assert_eq!(body["id"], json!(id));
}

#[tokio::test]
async fn test_writes_go_to_default_backend() {
    let fixture = redirect_fixture();
    seed_remote(fixture.remote.as_ref(), &["remote"]).await;
    let store: Arc<dyn SecretStore> = fixture.store.clone();
    let router = build_router(service_with_store(store));

    let (status, _) = send(
        &router,
        Method::PUT,
        "/v1/data",
        Some(r#"{"name":"/dir/dep/pw","type":"password","value":"local"}"#),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    assert_eq!(fixture.remote.version_count(&name_to_path("/shared/pw")).await, 1);
    assert_eq!(fixture.default.version_count(&name_to_path("/dir/dep/pw")).await, 1);
}

#[tokio::test]
async fn test_health_ignores_remote() {
    let fixture = redirect_fixture();
    fixture.remote.set_healthy(false);
    let store: Arc<dyn SecretStore> = fixture.store.clone();
    let router = build_router(service_with_store(store));

    let (status, _) = send(&router, Method::GET, "/v1/health", None).await;
    assert_eq!(status, StatusCode::OK);
}
