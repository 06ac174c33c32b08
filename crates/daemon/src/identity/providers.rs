use crate::state::CustomProvider;

/// Endpoints and response shape of an OAuth2 provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderSpec {
    pub id: String,
    pub authorize_url: String,
    pub token_url: String,
    pub me_url: String,
    pub scope: String,
    pub id_prop: String,
    pub name_prop: String,
    pub name_prefix: String,
}

struct Builtin {
    id: &'static str,
    authorize_url: &'static str,
    token_url: &'static str,
    me_url: &'static str,
    scope: &'static str,
    id_prop: &'static str,
    name_prop: &'static str,
    name_prefix: &'static str,
}

const TABLE: [Builtin; 6] = [
    Builtin {
        id: "discord",
        authorize_url: "https://discord.com/api/oauth2/authorize",
        token_url: "https://discord.com/api/oauth2/token",
        me_url: "https://discord.com/api/users/@me",
        scope: "identify",
        id_prop: "id",
        name_prop: "username",
        name_prefix: "@",
    },
    Builtin {
        id: "reddit",
        authorize_url: "https://www.reddit.com/api/v1/authorize",
        token_url: "https://www.reddit.com/api/v1/access_token",
        me_url: "https://oauth.reddit.com/api/v1/me",
        scope: "identity",
        id_prop: "id",
        name_prop: "name",
        name_prefix: "u/",
    },
    Builtin {
        id: "github",
        authorize_url: "https://github.com/login/oauth/authorize",
        token_url: "https://github.com/login/oauth/access_token",
        me_url: "https://api.github.com/user",
        scope: "read:user",
        id_prop: "id",
        name_prop: "login",
        name_prefix: "@",
    },
    Builtin {
        id: "google",
        authorize_url: "https://accounts.google.com/o/oauth2/v2/auth",
        token_url: "https://oauth2.googleapis.com/token",
        me_url: "https://www.googleapis.com/oauth2/v1/userinfo?alt=json",
        scope: "profile",
        id_prop: "id",
        name_prop: "name",
        name_prefix: "",
    },
    Builtin {
        id: "facebook",
        authorize_url: "https://graph.facebook.com/oauth/authorize",
        token_url: "https://graph.facebook.com/oauth/access_token",
        me_url: "https://graph.facebook.com/me",
        scope: "",
        id_prop: "id",
        name_prop: "name",
        name_prefix: "",
    },
    Builtin {
        id: "microsoft",
        authorize_url: "https://login.microsoftonline.com/common/oauth2/v2.0/authorize",
        token_url: "https://login.microsoftonline.com/common/oauth2/v2.0/token",
        me_url: "https://graph.microsoft.com/v1.0/me",
        scope: "https://graph.microsoft.com/user.read",
        id_prop: "id",
        name_prop: "displayName",
        name_prefix: "",
    },
];

impl From<&Builtin> for ProviderSpec {
    fn from(b: &Builtin) -> Self {
        Self {
            id: b.id.to_string(),
            authorize_url: b.authorize_url.to_string(),
            token_url: b.token_url.to_string(),
            me_url: b.me_url.to_string(),
            scope: b.scope.to_string(),
            id_prop: b.id_prop.to_string(),
            name_prop: b.name_prop.to_string(),
            name_prefix: b.name_prefix.to_string(),
        }
    }
}

impl From<&CustomProvider> for ProviderSpec {
    fn from(c: &CustomProvider) -> Self {
        Self {
            id: c.id.clone(),
            authorize_url: c.authorize_url.clone(),
            token_url: c.token_url.clone(),
            me_url: c.me_url.clone(),
            scope: c.scope.clone(),
            id_prop: c.id_prop.clone(),
            name_prop: c.name_prop.clone(),
            name_prefix: c.name_prefix.clone(),
        }
    }
}

/// Ids of the providers known out of the box.
pub const BUILTIN_PROVIDERS: [&str; 6] = [
    "discord",
    "reddit",
    "github",
    "google",
    "facebook",
    "microsoft",
];

pub fn builtin(id: &str) -> Option<ProviderSpec> {
    TABLE.iter().find(|b| b.id == id).map(ProviderSpec::from)
}
