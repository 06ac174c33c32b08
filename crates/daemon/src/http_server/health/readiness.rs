use std::time::Duration;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tokio::time::timeout;

use super::data_source::*;

const READINESS_TIMEOUT: Duration = Duration::from_secs(5);

#[tracing::instrument(skip_all)]
pub async fn handler(data_src: StateDataSource) -> Response {
    let message = match timeout(READINESS_TIMEOUT, data_src.is_ready()).await {
        Ok(Ok(())) => return (StatusCode::OK, Json(json!({"status": "ok"}))).into_response(),
        Ok(Err(e)) => {
            tracing::warn!("not ready: {}", e);
            e.to_string()
        }
        Err(_) => "readiness check timed out".to_string(),
    };

    let body = json!({"status": "failure", "message": message});
    (StatusCode::SERVICE_UNAVAILABLE, Json(body)).into_response()
}
