use std::path::PathBuf;

use clap::Args;

use burrow_daemon::service_config::normalize_base;
use burrow_daemon::state::{AppState, StateError};
use burrow_daemon::{spawn_service, ServiceConfig};

#[derive(Args, Debug, Clone)]
pub struct Daemon {
    /// Directory to serve (default from config)
    #[arg(long)]
    pub root: Option<PathBuf>,

    /// Override HTTP server port (default from config)
    #[arg(long)]
    pub port: Option<u16>,

    /// External id to make an admin with access to everything, e.g.
    /// discord:1234; a bare id is taken to belong to the configured provider
    #[arg(long)]
    pub admin: Option<String>,

    /// Theme to layer over the built-in UI, may be repeated; first wins.
    /// Startup fails if a named theme has no directory under themes/
    #[arg(long = "theme")]
    pub themes: Vec<String>,

    /// Path prefix to mount the server under (default from config)
    #[arg(long)]
    pub base: Option<String>,

    /// Loose asset directory consulted after themes
    #[arg(long)]
    pub www_dir: Option<PathBuf>,

    /// Directory for log files (logs to stdout only if not set)
    #[arg(long)]
    pub log_dir: Option<PathBuf>,

    /// Log level
    #[arg(long, default_value = "info")]
    pub log_level: tracing::Level,
}

#[derive(Debug, thiserror::Error)]
pub enum DaemonError {
    #[error("state error: {0}")]
    StateError(#[from] StateError),

    #[error("no root to serve; pass --root or set root in config.toml")]
    NoRoot,
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Daemon {
    type Error = DaemonError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let state = AppState::load(ctx.config_path.clone())?;

        let root = self
            .root
            .clone()
            .or_else(|| state.config.root.clone())
            .ok_or(DaemonError::NoRoot)?;

        // flags replace the configured theme list rather than extend it
        let theme_names = if self.themes.is_empty() {
            &state.config.themes
        } else {
            &self.themes
        };
        let themes = theme_names.iter().map(|name| state.theme_dir(name)).collect();

        let config = ServiceConfig {
            root,
            port: self.port.unwrap_or(state.config.port),
            base: normalize_base(self.base.as_deref().unwrap_or(&state.config.base)),
            search_limit: state.config.search_limit,
            themes,
            www_dir: self.www_dir.clone().or_else(|| state.config.www_dir.clone()),
            auth: state.config.auth.clone(),
            credentials: state.config.credentials.clone(),
            custom_providers: state.config.custom_providers.clone(),
            admin: self.admin.clone(),
            sqlite_path: Some(state.db_path),
            log_level: self.log_level,
            log_dir: self.log_dir.clone(),
        };

        spawn_service(&config).await;
        Ok("daemon ended".to_string())
    }
}
