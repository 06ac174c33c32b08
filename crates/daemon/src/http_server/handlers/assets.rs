use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};

use common::prelude::{Asset, TreePath};

use super::not_found::not_found;
use crate::ServiceState;

pub async fn index_handler(State(state): State<ServiceState>, headers: HeaderMap) -> Response {
    serve(&state, &headers, &TreePath::root().child("index.html"))
}

pub async fn static_handler(
    State(state): State<ServiceState>,
    Path(path): Path<String>,
    headers: HeaderMap,
) -> Response {
    match TreePath::parse(&path) {
        Ok(path) => serve(&state, &headers, &path),
        Err(_) => not_found(&state, &headers),
    }
}

fn serve(state: &ServiceState, headers: &HeaderMap, path: &TreePath) -> Response {
    match state.overlay().open(path) {
        Some(asset) => asset_response(asset),
        None => not_found(state, headers),
    }
}

fn asset_response(asset: Asset) -> Response {
    let mime = mime_guess::from_path(asset.path.as_str()).first_or_octet_stream();
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, mime.as_ref().to_string())],
        asset.data.into_owned(),
    )
        .into_response()
}
