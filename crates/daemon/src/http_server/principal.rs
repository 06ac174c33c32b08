use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum_extra::extract::CookieJar;
use http::request::Parts;

use common::prelude::Principal;

use crate::identity::SESSION_COOKIE;
use crate::ServiceState;

/// The principal behind a request: the signed-in user, or a guest.
///
/// The user row is re-read on every request so admin flag changes and
/// deleted users take effect immediately.
#[derive(Debug, Clone)]
pub struct CurrentPrincipal(pub Principal);

#[async_trait]
impl FromRequestParts<ServiceState> for CurrentPrincipal {
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &ServiceState,
    ) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);
        let Some(session) = jar
            .get(SESSION_COOKIE)
            .and_then(|cookie| state.sessions().get(cookie.value()))
        else {
            return Ok(Self(Principal::Guest));
        };

        match state.database().get_user(session.user_id).await {
            Ok(Some(user)) => Ok(Self(Principal::User {
                id: user.id,
                admin: user.admin,
            })),
            Ok(None) => Ok(Self(Principal::Guest)),
            Err(e) => {
                tracing::error!("failed to load session user: {}", e);
                Err(StatusCode::INTERNAL_SERVER_ERROR.into_response())
            }
        }
    }
}
