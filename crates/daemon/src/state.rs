use std::collections::BTreeMap;
use std::{fs, path::PathBuf};

use serde::{Deserialize, Serialize};

pub const APP_NAME: &str = "burrow";
pub const CONFIG_FILE_NAME: &str = "config.toml";
pub const DB_FILE_NAME: &str = "db.sqlite";
pub const THEMES_DIR_NAME: &str = "themes";

/// Client credentials for one identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub id: String,
    pub secret: String,
}

/// An operator-defined OAuth2 provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomProvider {
    /// Name used in `auth` and as the external id prefix
    pub id: String,
    pub authorize_url: String,
    pub token_url: String,
    /// Endpoint returning the signed-in user as JSON
    pub me_url: String,
    #[serde(default)]
    pub scope: String,
    /// Field of the `me_url` response holding the user id
    #[serde(default = "default_id_prop")]
    pub id_prop: String,
    /// Field of the `me_url` response holding the display name
    #[serde(default = "default_name_prop")]
    pub name_prop: String,
    #[serde(default)]
    pub name_prefix: String,
}

fn default_id_prop() -> String {
    "id".to_string()
}

fn default_name_prop() -> String {
    "name".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Directory served to users
    #[serde(default)]
    pub root: Option<PathBuf>,
    /// Port for the HTTP server
    #[serde(default = "default_port")]
    pub port: u16,
    /// Path prefix the server is mounted under, e.g. `/files-app/`
    #[serde(default = "default_base")]
    pub base: String,
    /// Theme names, resolved under `<burrow dir>/themes/<name>`, highest
    /// priority first
    #[serde(default)]
    pub themes: Vec<String>,
    /// Loose asset directory consulted after themes and before the built-in UI
    #[serde(default)]
    pub www_dir: Option<PathBuf>,
    /// Identity provider used for login
    #[serde(default = "default_auth")]
    pub auth: String,
    /// Client credentials keyed by provider id
    #[serde(default)]
    pub credentials: BTreeMap<String, Credentials>,
    #[serde(default)]
    pub custom_providers: Vec<CustomProvider>,
    /// Maximum number of search results returned per query
    #[serde(default = "default_search_limit")]
    pub search_limit: usize,
}

fn default_port() -> u16 {
    8000
}

fn default_base() -> String {
    "/".to_string()
}

fn default_auth() -> String {
    "discord".to_string()
}

fn default_search_limit() -> usize {
    250
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            root: None,
            port: default_port(),
            base: default_base(),
            themes: Vec::new(),
            www_dir: None,
            auth: default_auth(),
            credentials: BTreeMap::new(),
            custom_providers: Vec::new(),
            search_limit: default_search_limit(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppState {
    /// Path to the burrow directory (~/.burrow)
    pub burrow_dir: PathBuf,
    /// Path to the SQLite database
    pub db_path: PathBuf,
    /// Path to the themes directory
    pub themes_path: PathBuf,
    /// Path to the config file
    pub config_path: PathBuf,
    /// Loaded configuration
    pub config: AppConfig,
}

impl AppState {
    /// Get the burrow directory path (custom or default ~/.burrow)
    pub fn burrow_dir(custom_path: Option<PathBuf>) -> Result<PathBuf, StateError> {
        if let Some(path) = custom_path {
            return Ok(path);
        }

        let home = dirs::home_dir().ok_or(StateError::NoHomeDirectory)?;
        Ok(home.join(format!(".{}", APP_NAME)))
    }

    /// Initialize a new burrow state directory
    pub fn init(
        custom_path: Option<PathBuf>,
        config: Option<AppConfig>,
    ) -> Result<Self, StateError> {
        let burrow_dir = Self::burrow_dir(custom_path)?;

        if burrow_dir.exists() {
            return Err(StateError::AlreadyInitialized);
        }

        fs::create_dir_all(&burrow_dir)?;

        let themes_path = burrow_dir.join(THEMES_DIR_NAME);
        fs::create_dir_all(&themes_path)?;

        let config = config.unwrap_or_default();
        let config_path = burrow_dir.join(CONFIG_FILE_NAME);
        let config_toml = toml::to_string_pretty(&config)?;
        fs::write(&config_path, config_toml)?;

        // the schema is created by the service on first start
        let db_path = burrow_dir.join(DB_FILE_NAME);

        Ok(Self {
            burrow_dir,
            db_path,
            themes_path,
            config_path,
            config,
        })
    }

    /// Load existing state from the burrow directory
    pub fn load(custom_path: Option<PathBuf>) -> Result<Self, StateError> {
        let burrow_dir = Self::burrow_dir(custom_path)?;

        if !burrow_dir.exists() {
            return Err(StateError::NotInitialized);
        }

        let db_path = burrow_dir.join(DB_FILE_NAME);
        let themes_path = burrow_dir.join(THEMES_DIR_NAME);
        let config_path = burrow_dir.join(CONFIG_FILE_NAME);

        if !config_path.exists() {
            return Err(StateError::MissingFile(CONFIG_FILE_NAME.to_string()));
        }

        let config_toml = fs::read_to_string(&config_path)?;
        let config: AppConfig = toml::from_str(&config_toml)?;

        Ok(Self {
            burrow_dir,
            db_path,
            themes_path,
            config_path,
            config,
        })
    }

    /// Directory holding the named theme.
    pub fn theme_dir(&self, name: &str) -> PathBuf {
        self.themes_path.join(name)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("burrow directory not initialized. Run 'burrow init' first")]
    NotInitialized,

    #[error("burrow directory already initialized")]
    AlreadyInitialized,

    #[error("no home directory found")]
    NoHomeDirectory,

    #[error("missing required file: {0}")]
    MissingFile(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("TOML deserialization error: {0}")]
    TomlDe(#[from] toml::de::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_then_load() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("state");

        let config = AppConfig {
            root: Some(PathBuf::from("/srv/files")),
            themes: vec!["dark".to_string()],
            ..AppConfig::default()
        };
        let created = AppState::init(Some(dir.clone()), Some(config)).unwrap();
        assert!(created.themes_path.is_dir());
        assert_eq!(created.theme_dir("dark"), dir.join("themes").join("dark"));

        let loaded = AppState::load(Some(dir.clone())).unwrap();
        assert_eq!(loaded.config.root, Some(PathBuf::from("/srv/files")));
        assert_eq!(loaded.config.port, 8000);
        assert_eq!(loaded.config.auth, "discord");

        assert!(matches!(
            AppState::init(Some(dir), None),
            Err(StateError::AlreadyInitialized)
        ));
    }

    #[test]
    fn test_load_uninitialized() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(matches!(
            AppState::load(Some(tmp.path().join("nope"))),
            Err(StateError::NotInitialized)
        ));
    }

    #[test]
    fn test_sparse_config_uses_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
            root = "/data"
            auth = "github"

            [credentials.github]
            id = "abc"
            secret = "shh"
            "#,
        )
        .unwrap();
        assert_eq!(config.port, 8000);
        assert_eq!(config.base, "/");
        assert_eq!(config.search_limit, 250);
        assert_eq!(config.credentials["github"].id, "abc");
    }
}
