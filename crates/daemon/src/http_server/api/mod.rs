use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};

use common::prelude::GatewayError;

pub mod access;
pub mod admin;
pub mod search;
pub mod share;
pub mod user;

use crate::ServiceState;

pub fn router(state: ServiceState) -> Router<ServiceState> {
    Router::new()
        .route("/search", get(search::handler))
        .route("/admin", get(admin::handler))
        .route("/access/create", post(access::create_handler))
        .route("/access/update", post(access::update_handler))
        .route("/access/delete", post(access::delete_handler))
        .route("/share/create", post(share::create_handler))
        .route("/share/update", post(share::update_handler))
        .route("/share/delete", post(share::delete_handler))
        .route("/user/update", post(user::update_handler))
        .with_state(state)
}

/// Errors surfaced by the JSON API. Unlike the file routes, denial and
/// absence are reported distinctly here.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, msg) = match &self {
            ApiError::Gateway(GatewayError::NotFound) => (StatusCode::NOT_FOUND, self.to_string()),
            ApiError::Gateway(GatewayError::Forbidden) => (StatusCode::FORBIDDEN, self.to_string()),
            ApiError::Gateway(GatewayError::BadRequest(_)) => {
                (StatusCode::BAD_REQUEST, self.to_string())
            }
            ApiError::Gateway(GatewayError::Conflict) => (StatusCode::CONFLICT, self.to_string()),
            ApiError::Gateway(GatewayError::Internal(_)) | ApiError::Database(_) => {
                tracing::error!("API request failed: {}", self);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal error".to_string(),
                )
            }
        };
        (status, Json(serde_json::json!({ "msg": msg }))).into_response()
    }
}
