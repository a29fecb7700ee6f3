use std::sync::Arc;

use axum::{middleware, routing::get, Router};

use crate::observability::trace_http_requests;
use crate::service::CredentialService;

use super::handlers::{
    delete_handler, generate_handler, get_by_id_handler, get_by_name_handler, health_handler,
    require_healthy_store, set_handler,
};

#[derive(Clone)]
pub struct ApiState {
    pub service: Arc<CredentialService>,
}

pub fn build_router(service: Arc<CredentialService>) -> Router {
    let state = ApiState { service };

    let data = Router::new()
        .route(
            "/v1/data",
            get(get_by_name_handler).post(generate_handler).put(set_handler).delete(delete_handler),
        )
        .route("/v1/data/{id}", get(get_by_id_handler))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_healthy_store));

    Router::new()
        .route("/v1/health", get(health_handler))
        .merge(data)
        .layer(middleware::from_fn(trace_http_requests))
        .with_state(state)
}
