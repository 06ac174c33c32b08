use axum::extract::State;
use axum::Json;
use serde::Serialize;

use common::prelude::{Grant, GatewayError, ShareLink};

use super::ApiError;
use crate::database::User;
use crate::http_server::CurrentPrincipal;
use crate::ServiceState;

#[derive(Debug, Clone, Serialize)]
pub struct AdminResponse {
    pub users: Vec<User>,
    pub grants: Vec<Grant>,
    pub shares: Vec<ShareLink>,
}

/// Everything an administrator manages, in one document.
pub async fn handler(
    State(state): State<ServiceState>,
    CurrentPrincipal(principal): CurrentPrincipal,
) -> Result<Json<AdminResponse>, ApiError> {
    if !principal.is_admin() {
        return Err(GatewayError::Forbidden.into());
    }

    let grants = state.gateway().access_list(&principal).await?;
    let shares = state.gateway().share_list(&principal).await?;
    let users = state.database().list_users().await?;

    Ok(Json(AdminResponse {
        users,
        grants,
        shares,
    }))
}
