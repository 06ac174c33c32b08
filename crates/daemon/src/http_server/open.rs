use axum::extract::{Path, Request, State};
use axum::response::Response;

use common::prelude::GatewayError;

use super::files::respond;
use crate::ServiceState;

pub async fn root_handler(
    State(state): State<ServiceState>,
    Path(token): Path<String>,
    request: Request,
) -> Response {
    open(&state, &token, "", request).await
}

pub async fn handler(
    State(state): State<ServiceState>,
    Path((token, path)): Path<(String, String)>,
    request: Request,
) -> Response {
    open(&state, &token, &path, request).await
}

/// `path` is relative to the shared path; the gateway refuses anything that
/// climbs out of it.
async fn open(state: &ServiceState, token: &str, path: &str, request: Request) -> Response {
    let opened = match state.gateway().share_root(token).await {
        Ok(Some(root)) => {
            let target = root.join(path);
            state.gateway().open_shared(token, target.as_str()).await
        }
        Ok(None) => Err(GatewayError::NotFound),
        Err(e) => Err(e),
    };
    respond(state, opened, request).await
}
