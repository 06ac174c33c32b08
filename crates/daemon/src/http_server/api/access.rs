use axum::extract::{Json, State};
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};

use common::prelude::Grant;

use super::ApiError;
use crate::http_server::CurrentPrincipal;
use crate::ServiceState;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRequest {
    pub user: i64,
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateRequest {
    pub id: i64,
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteRequest {
    pub id: i64,
}

pub async fn create_handler(
    State(state): State<ServiceState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Json(req): Json<CreateRequest>,
) -> Result<(StatusCode, Json<Grant>), ApiError> {
    let grant = state
        .gateway()
        .access_create(&principal, req.user, &req.path)
        .await?;
    Ok((StatusCode::CREATED, Json(grant)))
}

pub async fn update_handler(
    State(state): State<ServiceState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Json(req): Json<UpdateRequest>,
) -> Result<Json<Grant>, ApiError> {
    let grant = state
        .gateway()
        .access_update(&principal, req.id, &req.path)
        .await?;
    Ok(Json(grant))
}

pub async fn delete_handler(
    State(state): State<ServiceState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Json(req): Json<DeleteRequest>,
) -> Result<StatusCode, ApiError> {
    state.gateway().access_delete(&principal, req.id).await?;
    Ok(StatusCode::NO_CONTENT)
}
