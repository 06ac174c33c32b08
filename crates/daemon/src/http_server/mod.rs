use axum::http::header::SERVER;
use axum::http::HeaderValue;
use axum::routing::get;
use axum::Router;
use tokio::sync::watch;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;
use tower_http::trace::{DefaultOnFailure, DefaultOnResponse};
use tower_http::LatencyUnit;

pub mod api;
mod auth;
mod config;
mod files;
mod handlers;
mod health;
mod open;
mod principal;

pub use config::Config;
pub use principal::CurrentPrincipal;

use crate::ServiceState;

const API_PREFIX: &str = "/api";
const STATUS_PREFIX: &str = "/_status";
const SERVER_NAME: &str = "burrow";

/// All routes, mounted under the configured base. Health probes always live
/// at the top level so tooling can find them without knowing the base.
pub fn router(state: ServiceState) -> Router {
    let routes = Router::new()
        .route("/", get(handlers::assets::index_handler))
        .route("/static/*path", get(handlers::assets::static_handler))
        .route("/login", get(auth::login_handler))
        .route("/callback", get(auth::callback_handler))
        .route("/logout", get(auth::logout_handler))
        .route("/files", get(files::root_handler))
        .route("/files/", get(files::root_handler))
        .route("/files/*path", get(files::handler))
        .route("/open/:token", get(open::root_handler))
        .route("/open/:token/", get(open::root_handler))
        .route("/open/:token/*path", get(open::handler))
        .nest(API_PREFIX, api::router(state.clone()));

    let app = Router::new().nest(STATUS_PREFIX, health::router(state.clone()));
    // nesting at "/" is rejected by axum
    let app = match state.base().trim_end_matches('/') {
        "" => app.merge(routes),
        base => app.nest(base, routes),
    };

    app.fallback(handlers::not_found_handler)
        .with_state(state)
        .layer(SetResponseHeaderLayer::overriding(
            SERVER,
            HeaderValue::from_static(SERVER_NAME),
        ))
}

/// Run the HTTP server until `shutdown_rx` fires.
pub async fn run(
    config: Config,
    state: ServiceState,
    mut shutdown_rx: watch::Receiver<()>,
) -> Result<(), HttpServerError> {
    let listen_addr = config.listen_addr;
    let trace_layer = TraceLayer::new_for_http()
        .on_response(
            DefaultOnResponse::new()
                .include_headers(false)
                .level(config.access_log_level)
                .latency_unit(LatencyUnit::Micros),
        )
        .on_failure(DefaultOnFailure::new().latency_unit(LatencyUnit::Micros));

    let base = state.base().to_string();
    let app = router(state).layer(trace_layer);

    tracing::info!(addr = ?listen_addr, %base, "HTTP server listening");
    let listener = tokio::net::TcpListener::bind(listen_addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.changed().await;
        })
        .await?;

    Ok(())
}

#[derive(Debug, thiserror::Error)]
pub enum HttpServerError {
    #[error("an error occurred running the HTTP server: {0}")]
    ServingFailed(#[from] std::io::Error),
}
