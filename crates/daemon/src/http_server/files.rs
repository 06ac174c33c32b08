use axum::body::Body;
use axum::extract::{Path, Request, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use tower::ServiceExt;
use tower_http::services::ServeFile;

use common::prelude::{GatewayError, Opened};

use super::handlers::not_found_handler_for;
use super::CurrentPrincipal;
use crate::ServiceState;

pub async fn root_handler(
    State(state): State<ServiceState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    request: Request,
) -> Response {
    respond(&state, state.gateway().open(&principal, "/").await, request).await
}

pub async fn handler(
    State(state): State<ServiceState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(path): Path<String>,
    request: Request,
) -> Response {
    respond(&state, state.gateway().open(&principal, &path).await, request).await
}

/// Turn an open result into a response: listings as JSON, files streamed
/// from disk with range and conditional request support.
pub(super) async fn respond(
    state: &ServiceState,
    opened: Result<Opened, GatewayError>,
    request: Request,
) -> Response {
    match opened {
        Ok(Opened::Directory(listing)) => Json(listing).into_response(),
        Ok(Opened::File { disk_path, .. }) => match ServeFile::new(disk_path).oneshot(request).await {
            Ok(response) => response.map(Body::new),
            Err(never) => match never {},
        },
        Err(err) => FilesError(err).into_response_for(state, request.headers()),
    }
}

/// Errors on the file routes. Denied and missing paths are indistinguishable
/// to the client.
#[derive(Debug, thiserror::Error)]
#[error(transparent)]
pub(super) struct FilesError(GatewayError);

impl FilesError {
    fn into_response_for(self, state: &ServiceState, headers: &HeaderMap) -> Response {
        match self.0 {
            GatewayError::NotFound | GatewayError::Forbidden => not_found_handler_for(state, headers),
            GatewayError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg).into_response(),
            GatewayError::Conflict => StatusCode::CONFLICT.into_response(),
            GatewayError::Internal(msg) => {
                tracing::error!("file request failed: {}", msg);
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        }
    }
}
