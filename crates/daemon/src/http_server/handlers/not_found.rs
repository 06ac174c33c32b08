use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;

use common::prelude::TreePath;

use crate::ServiceState;

pub async fn not_found_handler(State(state): State<ServiceState>, headers: HeaderMap) -> Response {
    not_found(&state, &headers)
}

/// The one "nothing here" answer, shaped by what the client accepts. Used
/// both for unknown routes and for anything a principal may not see.
pub fn not_found(state: &ServiceState, headers: &HeaderMap) -> Response {
    let accept = headers
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    if accept.contains("application/json") {
        let err_msg = serde_json::json!({"msg": "not found"});
        return (StatusCode::NOT_FOUND, Json(err_msg)).into_response();
    }

    if accept.contains("text/html") {
        if let Some(page) = state.overlay().open(&TreePath::root().child("404.html")) {
            return (
                StatusCode::NOT_FOUND,
                [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
                page.data.into_owned(),
            )
                .into_response();
        }
    }

    (
        StatusCode::NOT_FOUND,
        [(header::CONTENT_TYPE, "text/plain")],
        "not found",
    )
        .into_response()
}
