use axum::extract::{Json, State};
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};

use common::prelude::ShareLink;

use super::ApiError;
use crate::http_server::CurrentPrincipal;
use crate::ServiceState;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRequest {
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateRequest {
    pub token: String,
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteRequest {
    pub token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShareResponse {
    #[serde(flatten)]
    pub link: ShareLink,
    /// Path of the anonymous link, relative to the server root
    pub url: String,
}

impl ShareResponse {
    fn new(state: &ServiceState, link: ShareLink) -> Self {
        let url = format!("{}open/{}", state.base(), link.token);
        Self { link, url }
    }
}

pub async fn create_handler(
    State(state): State<ServiceState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Json(req): Json<CreateRequest>,
) -> Result<(StatusCode, Json<ShareResponse>), ApiError> {
    let link = state.gateway().share_create(&principal, &req.path).await?;
    Ok((StatusCode::CREATED, Json(ShareResponse::new(&state, link))))
}

pub async fn update_handler(
    State(state): State<ServiceState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Json(req): Json<UpdateRequest>,
) -> Result<Json<ShareResponse>, ApiError> {
    let link = state
        .gateway()
        .share_update(&principal, &req.token, &req.path)
        .await?;
    Ok(Json(ShareResponse::new(&state, link)))
}

pub async fn delete_handler(
    State(state): State<ServiceState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Json(req): Json<DeleteRequest>,
) -> Result<StatusCode, ApiError> {
    state.gateway().share_delete(&principal, &req.token).await?;
    Ok(StatusCode::NO_CONTENT)
}
