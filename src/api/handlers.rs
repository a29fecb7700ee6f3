//! Handlers for the `/v1` credential API.

use axum::{
    body::Bytes,
    extract::{Path, Query, Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::credentials::CredentialResponse;
use crate::store::Secret;

use super::{error::ApiError, routes::ApiState};

const UNHEALTHY_STORE: &str =
    "your backend store is unhealthy, has it been initialized and unsealed?";

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: u16,
    pub status_text: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct NameQuery {
    pub name: Option<String>,
}

impl NameQuery {
    fn required(self) -> Result<String, ApiError> {
        self.name
            .filter(|name| !name.trim().is_empty())
            .ok_or_else(|| ApiError::bad_request("name query parameter is required"))
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DataResponse {
    pub data: Vec<Secret>,
}

pub async fn health_handler(State(state): State<ApiState>) -> Response {
    if state.service.healthy().await {
        let body = HealthResponse { status: 200, status_text: "OK".to_string() };
        (StatusCode::OK, Json(body)).into_response()
    } else {
        let body = HealthResponse {
            status: 500,
            status_text: format!("Internal Server Error {}", UNHEALTHY_STORE),
        };
        (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
    }
}

/// Rejects data requests while the default backend is unhealthy.
pub async fn require_healthy_store(
    State(state): State<ApiState>,
    request: Request,
    next: Next,
) -> Response {
    if !state.service.healthy().await {
        tracing::error!(path = %request.uri().path(), "Rejecting request, backend store is unhealthy");
        return ApiError::internal(UNHEALTHY_STORE).into_response();
    }
    next.run(request).await
}

pub async fn get_by_name_handler(
    State(state): State<ApiState>,
    Query(query): Query<NameQuery>,
) -> Result<Json<DataResponse>, ApiError> {
    let name = query.required()?;
    let data = state.service.get_by_name(&name).await?;
    Ok(Json(DataResponse { data }))
}

pub async fn get_by_id_handler(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<Json<Secret>, ApiError> {
    let secret = state.service.get_by_id(&id).await?;
    Ok(Json(secret))
}

/// Generate a credential; 201 when created, 200 when no-overwrite mode
/// returned the existing one.
pub async fn generate_handler(
    State(state): State<ApiState>,
    body: Bytes,
) -> Result<(StatusCode, Json<CredentialResponse>), ApiError> {
    let generated = state.service.generate(&body).await?;
    let status = if generated.created { StatusCode::CREATED } else { StatusCode::OK };
    Ok((status, Json(generated.response)))
}

pub async fn set_handler(
    State(state): State<ApiState>,
    body: Bytes,
) -> Result<Json<Secret>, ApiError> {
    let secret = state.service.set_value(&body).await?;
    Ok(Json(secret))
}

pub async fn delete_handler(
    State(state): State<ApiState>,
    Query(query): Query<NameQuery>,
) -> Result<StatusCode, ApiError> {
    let name = query.required()?;
    state.service.delete_by_name(&name).await?;
    Ok(StatusCode::NO_CONTENT)
}
