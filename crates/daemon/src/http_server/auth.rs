use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Redirect, Response};
use axum_extra::extract::cookie::{Cookie, SameSite};
use axum_extra::extract::CookieJar;
use serde::Deserialize;

use crate::identity::{random_id, IdentityError, OAUTH_STATE_COOKIE, SESSION_COOKIE};
use crate::ServiceState;

const FORWARDED_PROTO: &str = "x-forwarded-proto";

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Send the browser to the identity provider, unless it already holds a
/// live session.
pub async fn login_handler(
    State(state): State<ServiceState>,
    headers: HeaderMap,
    jar: CookieJar,
) -> Result<Response, AuthError> {
    if has_session(&state, &jar) {
        return Ok(Redirect::to(&files_url(&state)).into_response());
    }

    let redirect_uri = redirect_uri(&state, &headers)?;
    let oauth_state = random_id();
    let target = state.identity().authorize_url(&oauth_state, &redirect_uri);

    let jar = jar.add(cookie(&state, OAUTH_STATE_COOKIE, oauth_state));
    Ok((jar, Redirect::to(target.as_str())).into_response())
}

pub async fn callback_handler(
    State(state): State<ServiceState>,
    headers: HeaderMap,
    jar: CookieJar,
    Query(query): Query<CallbackQuery>,
) -> Result<Response, AuthError> {
    if let Some(error) = query.error {
        return Err(AuthError::Denied(error));
    }

    let expected = jar.get(OAUTH_STATE_COOKIE).map(|c| c.value().to_string());
    match (&expected, &query.state) {
        (Some(expected), Some(got)) if expected == got => {}
        _ => return Err(AuthError::StateMismatch),
    }
    let code = query.code.ok_or(AuthError::MissingCode)?;

    let redirect_uri = redirect_uri(&state, &headers)?;
    let identity = state.identity().exchange(&code, &redirect_uri).await?;

    let user = state
        .database()
        .upsert_login(&identity.external_id, &identity.display_name)
        .await
        .map_err(|e| AuthError::Database(e.to_string()))?;
    let session_id = state.sessions().create(user.id);
    tracing::info!(user_id = user.id, external_id = %user.external_id, "user logged in");

    let jar = jar
        .remove(removal(&state, OAUTH_STATE_COOKIE))
        .add(cookie(&state, SESSION_COOKIE, session_id));
    Ok((jar, Redirect::to(&files_url(&state))).into_response())
}

pub async fn logout_handler(State(state): State<ServiceState>, jar: CookieJar) -> Response {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        if let Some(session) = state.sessions().remove(cookie.value()) {
            tracing::info!(user_id = session.user_id, "user logged out");
        }
    }
    let jar = jar.remove(removal(&state, SESSION_COOKIE));
    (jar, Redirect::to(state.base())).into_response()
}

fn has_session(state: &ServiceState, jar: &CookieJar) -> bool {
    jar.get(SESSION_COOKIE)
        .map(|c| state.sessions().get(c.value()).is_some())
        .unwrap_or(false)
}

fn files_url(state: &ServiceState) -> String {
    format!("{}files/", state.base())
}

fn cookie(state: &ServiceState, name: &'static str, value: String) -> Cookie<'static> {
    Cookie::build((name, value))
        .path(state.base().to_string())
        .http_only(true)
        .same_site(SameSite::Lax)
        .build()
}

fn removal(state: &ServiceState, name: &'static str) -> Cookie<'static> {
    Cookie::build(name).path(state.base().to_string()).build()
}

/// Absolute callback url as seen by the browser. Honors a reverse proxy's
/// `X-Forwarded-Proto`.
fn redirect_uri(state: &ServiceState, headers: &HeaderMap) -> Result<String, AuthError> {
    let host = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .ok_or(AuthError::MissingHost)?;
    let scheme = headers
        .get(FORWARDED_PROTO)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("http");
    Ok(format!("{}://{}{}callback", scheme, host, state.base()))
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("request has no Host header")]
    MissingHost,
    #[error("login state does not match")]
    StateMismatch,
    #[error("callback is missing the authorization code")]
    MissingCode,
    #[error("identity provider denied the login: {0}")]
    Denied(String),
    #[error("identity exchange failed: {0}")]
    Identity(#[from] IdentityError),
    #[error("database error: {0}")]
    Database(String),
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        match &self {
            AuthError::MissingHost | AuthError::StateMismatch | AuthError::MissingCode => {
                tracing::warn!("login rejected: {}", self);
                (StatusCode::BAD_REQUEST, self.to_string()).into_response()
            }
            AuthError::Denied(_) | AuthError::Identity(_) => {
                tracing::warn!("login failed: {}", self);
                (StatusCode::FORBIDDEN, "login failed").into_response()
            }
            AuthError::Database(_) => {
                tracing::error!("login failed: {}", self);
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        }
    }
}
