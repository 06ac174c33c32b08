use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use common::prelude::{GatewayError, SearchHit};

use super::ApiError;
use crate::http_server::CurrentPrincipal;
use crate::ServiceState;

#[derive(Debug, Clone, Deserialize)]
pub struct SearchRequest {
    #[serde(default)]
    pub q: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub results: Vec<SearchHit>,
    /// More hits exist beyond the configured limit
    pub truncated: bool,
}

pub async fn handler(
    State(state): State<ServiceState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Query(req): Query<SearchRequest>,
) -> Result<Json<SearchResponse>, ApiError> {
    let limit = state.search_limit();
    let search = state.gateway().search(&principal, &req.q).await?;

    // walking a large tree is CPU bound
    let mut results = tokio::task::spawn_blocking(move || search.take(limit + 1).collect::<Vec<_>>())
        .await
        .map_err(|e| GatewayError::Internal(e.to_string()))?;

    let truncated = results.len() > limit;
    results.truncate(limit);
    tracing::debug!(query = %req.q, hits = results.len(), truncated, "search");

    Ok(Json(SearchResponse {
        query: req.q,
        results,
        truncated,
    }))
}
