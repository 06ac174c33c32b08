use axum::extract::{Json, State};
use serde::{Deserialize, Serialize};

use common::prelude::{GatewayError, Principal};

use super::ApiError;
use crate::database::User;
use crate::http_server::CurrentPrincipal;
use crate::ServiceState;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateRequest {
    pub id: i64,
    pub admin: bool,
}

/// Promote or demote a user. Admins cannot demote themselves.
pub async fn update_handler(
    State(state): State<ServiceState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Json(req): Json<UpdateRequest>,
) -> Result<Json<User>, ApiError> {
    let caller = match principal {
        Principal::User { id, admin: true } => id,
        _ => return Err(GatewayError::Forbidden.into()),
    };
    if caller == req.id && !req.admin {
        return Err(GatewayError::BadRequest("cannot revoke your own admin flag".to_string()).into());
    }

    let user = state
        .database()
        .set_admin(req.id, req.admin)
        .await?
        .ok_or(GatewayError::NotFound)?;
    tracing::info!(id = user.id, admin = user.admin, by = caller, "user updated");
    Ok(Json(user))
}
