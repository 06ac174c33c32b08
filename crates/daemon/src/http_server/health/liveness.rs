use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;

use crate::version::build_info;

pub async fn handler() -> impl IntoResponse {
    let msg = serde_json::json!({"status": "ok", "version": build_info().version});
    (StatusCode::OK, Json(msg))
}
