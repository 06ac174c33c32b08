use std::path::PathBuf;

use clap::Args;

use burrow_daemon::identity::BUILTIN_PROVIDERS;
use burrow_daemon::state::{AppConfig, AppState, StateError};

#[derive(Args, Debug, Clone)]
pub struct Init {
    /// Directory to serve
    #[arg(long)]
    pub root: Option<PathBuf>,

    /// HTTP server port
    #[arg(long, default_value_t = 8000)]
    pub port: u16,

    /// Identity provider used for login
    #[arg(long, default_value = "discord")]
    pub auth: String,
}

#[derive(Debug, thiserror::Error)]
pub enum InitError {
    #[error("init failed: {0}")]
    StateFailed(#[from] StateError),

    #[error("unknown identity provider {0}, expected one of: {1}")]
    UnknownProvider(String, String),

    #[error("served root {0} does not exist")]
    MissingRoot(String),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Init {
    type Error = InitError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        // custom providers are added to config.toml by hand after init
        if !BUILTIN_PROVIDERS.contains(&self.auth.as_str()) {
            return Err(InitError::UnknownProvider(
                self.auth.clone(),
                BUILTIN_PROVIDERS.join(", "),
            ));
        }

        let root = match &self.root {
            Some(root) => Some(
                root.canonicalize()
                    .map_err(|_| InitError::MissingRoot(root.display().to_string()))?,
            ),
            None => None,
        };

        let config = AppConfig {
            root,
            port: self.port,
            auth: self.auth.clone(),
            ..AppConfig::default()
        };

        let state = AppState::init(ctx.config_path.clone(), Some(config))?;

        let root_str = match &state.config.root {
            Some(root) => root.display().to_string(),
            None => "not set (pass --root to the daemon)".to_string(),
        };

        let output = format!(
            "Initialized burrow directory at: {}\n\
             - Database: {}\n\
             - Themes: {}\n\
             - Config: {}\n\
             - Served root: {}\n\
             - Port: {}\n\
             - Login provider: {} (add [credentials.{}] to config.toml)",
            state.burrow_dir.display(),
            state.db_path.display(),
            state.themes_path.display(),
            state.config_path.display(),
            root_str,
            state.config.port,
            state.config.auth,
            state.config.auth,
        );

        Ok(output)
    }
}
