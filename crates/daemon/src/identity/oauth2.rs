use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::Client;
use serde_json::Value;
use url::Url;

use super::providers::ProviderSpec;
use super::{Identity, IdentityError, IdentityProvider};
use crate::state::Credentials;

/// Authorization-code flow against one provider.
#[derive(Debug, Clone)]
pub struct OAuth2Client {
    spec: ProviderSpec,
    credentials: Credentials,
    authorize: Url,
    token: Url,
    me: Url,
    client: Client,
}

impl OAuth2Client {
    pub fn new(spec: ProviderSpec, credentials: Credentials) -> Result<Self, IdentityError> {
        let authorize = Url::parse(&spec.authorize_url)?;
        let token = Url::parse(&spec.token_url)?;
        let me = Url::parse(&spec.me_url)?;
        // several providers refuse requests without a user agent
        let client = Client::builder()
            .user_agent(concat!("burrow/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            spec,
            credentials,
            authorize,
            token,
            me,
            client,
        })
    }

    async fn access_token(&self, code: &str, redirect_uri: &str) -> Result<String, IdentityError> {
        let body = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("grant_type", "authorization_code")
            .append_pair("code", code)
            .append_pair("redirect_uri", redirect_uri)
            .append_pair("client_id", &self.credentials.id)
            .append_pair("client_secret", &self.credentials.secret)
            .finish();

        let response = self
            .client
            .post(self.token.clone())
            .basic_auth(&self.credentials.id, Some(&self.credentials.secret))
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .header(ACCEPT, "application/json")
            .body(body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(IdentityError::Rejected(format!("{}: {}", status, text)));
        }

        let payload: Value = response.json().await?;
        if let Some(err) = payload.get("error").and_then(Value::as_str) {
            return Err(IdentityError::Rejected(err.to_string()));
        }
        payload
            .get("access_token")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| IdentityError::MissingField("access_token".to_string()))
    }
}

/// Pull the id and display name out of a provider's profile document.
/// Ids may be strings or numbers depending on the provider.
pub(crate) fn identity_from_profile(
    spec: &ProviderSpec,
    profile: &Value,
) -> Result<Identity, IdentityError> {
    let id = match profile.get(&spec.id_prop) {
        Some(Value::String(s)) if !s.is_empty() => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => return Err(IdentityError::MissingField(spec.id_prop.clone())),
    };
    let name = profile
        .get(&spec.name_prop)
        .and_then(Value::as_str)
        .unwrap_or(&id);

    Ok(Identity {
        external_id: format!("{}:{}", spec.id, id),
        display_name: format!("{}{}", spec.name_prefix, name),
    })
}

#[async_trait]
impl IdentityProvider for OAuth2Client {
    fn id(&self) -> &str {
        &self.spec.id
    }

    fn authorize_url(&self, state: &str, redirect_uri: &str) -> Url {
        let mut url = self.authorize.clone();
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("client_id", &self.credentials.id)
                .append_pair("redirect_uri", redirect_uri)
                .append_pair("response_type", "code")
                .append_pair("state", state);
            if !self.spec.scope.is_empty() {
                query.append_pair("scope", &self.spec.scope);
            }
        }
        url
    }

    async fn exchange(&self, code: &str, redirect_uri: &str) -> Result<Identity, IdentityError> {
        let token = self.access_token(code, redirect_uri).await?;

        let response = self
            .client
            .get(self.me.clone())
            .bearer_auth(token)
            .header(ACCEPT, "application/json")
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(IdentityError::Rejected(format!(
                "profile request returned {}",
                response.status()
            )));
        }

        let profile: Value = response.json().await?;
        let identity = identity_from_profile(&self.spec, &profile)?;
        tracing::debug!(external_id = %identity.external_id, "identity exchanged");
        Ok(identity)
    }
}
