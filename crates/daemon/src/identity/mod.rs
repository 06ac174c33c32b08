//! Login through an external OAuth2 identity provider.
//!
//! The server never handles passwords. A provider proves who someone is and
//! hands back a stable id plus a display name; everything past that point is
//! the server's own user table and session store.

mod oauth2;
mod providers;
mod session;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use url::Url;

use crate::ServiceConfig;

pub use oauth2::OAuth2Client;
pub use providers::{builtin, ProviderSpec, BUILTIN_PROVIDERS};
pub use session::{random_id, Session, SessionStore, OAUTH_STATE_COOKIE, SESSION_COOKIE};

/// A verified person as reported by a provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// Provider-qualified id, stable across logins, e.g. `github:583231`
    pub external_id: String,
    pub display_name: String,
}

#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("unknown identity provider: {0}")]
    UnknownProvider(String),
    #[error("no client credentials configured for provider {0}")]
    MissingCredentials(String),
    #[error("invalid provider url: {0}")]
    Url(#[from] url::ParseError),
    #[error("provider request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("provider rejected the exchange: {0}")]
    Rejected(String),
    #[error("provider response missing field {0}")]
    MissingField(String),
}

#[async_trait]
pub trait IdentityProvider: Send + Sync + fmt::Debug {
    /// Provider id, used as the prefix of external ids.
    fn id(&self) -> &str;

    /// Where to send the browser to start a login.
    fn authorize_url(&self, state: &str, redirect_uri: &str) -> Url;

    /// Trade an authorization code for the identity behind it.
    async fn exchange(&self, code: &str, redirect_uri: &str) -> Result<Identity, IdentityError>;
}

/// External ids are stored as `<provider>:<id>`. A bare id, as operators
/// copy it from the provider's profile page, is qualified with `provider`.
pub fn qualify_external_id(raw: &str, provider: &str) -> String {
    if raw.contains(':') {
        raw.to_string()
    } else {
        format!("{}:{}", provider, raw)
    }
}

/// Build the provider selected by `config.auth`. Credentials are looked up
/// once here; a provider without them is a configuration error.
pub fn resolve_provider(config: &ServiceConfig) -> Result<Arc<dyn IdentityProvider>, IdentityError> {
    let spec = match config
        .custom_providers
        .iter()
        .find(|p| p.id == config.auth)
    {
        Some(custom) => ProviderSpec::from(custom),
        None => builtin(&config.auth)
            .ok_or_else(|| IdentityError::UnknownProvider(config.auth.clone()))?,
    };

    let credentials = config
        .credentials
        .get(&spec.id)
        .ok_or_else(|| IdentityError::MissingCredentials(spec.id.clone()))?;

    let client = OAuth2Client::new(spec, credentials.clone())?;
    tracing::info!(provider = client.id(), "identity provider configured");
    Ok(Arc::new(client))
}
