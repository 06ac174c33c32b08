use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use common::prelude::{AccessGateway, FileIndex, FsWatcher, OverlayFs, ShareRegistry};

use crate::assets::{self, AssetsError};
use crate::database::{Database, DatabaseSetupError};
use crate::identity::{self, IdentityError, IdentityProvider, SessionStore};
use crate::ServiceConfig;

/// Everything a request handler needs, built once at startup.
#[derive(Clone)]
pub struct State {
    database: Database,
    gateway: AccessGateway,
    overlay: Arc<OverlayFs>,
    identity: Arc<dyn IdentityProvider>,
    sessions: SessionStore,
    base: String,
    search_limit: usize,
    watcher: Arc<Mutex<Option<FsWatcher>>>,
}

impl fmt::Debug for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("State")
            .field("root", &self.gateway.index().root())
            .field("base", &self.base)
            .field("identity", &self.identity.id())
            .finish()
    }
}

impl State {
    pub async fn from_config(config: &ServiceConfig) -> Result<Self, StateSetupError> {
        let database = match &config.sqlite_path {
            Some(path) => Database::connect(path).await?,
            None => {
                tracing::warn!("no sqlite path configured, using an in-memory database");
                Database::in_memory().await?
            }
        };

        let identity = identity::resolve_provider(config)?;

        if let Some(admin) = &config.admin {
            let external_id = identity::qualify_external_id(admin, identity.id());
            database
                .bootstrap_admin(&external_id)
                .await
                .map_err(StateSetupError::Bootstrap)?;
        }

        if !config.root.is_dir() {
            return Err(StateSetupError::Root(config.root.display().to_string()));
        }
        let overlay = assets::build_overlay(&config.themes, config.www_dir.as_ref())?;

        let root = config.root.clone();
        let index = tokio::task::spawn_blocking(move || FileIndex::scan(root))
            .await
            .map_err(|e| StateSetupError::Scan(e.to_string()))?
            .map_err(|e| StateSetupError::Scan(e.to_string()))?;

        let watcher = match FsWatcher::start(index.clone()) {
            Ok(watcher) => Some(watcher),
            Err(e) => {
                index.mark_degraded(&format!("watcher failed to start: {}", e));
                None
            }
        };

        let state = Self::from_parts(
            database,
            index,
            overlay,
            identity,
            &config.base,
            config.search_limit,
        );
        *state.watcher.lock() = watcher;
        Ok(state)
    }

    /// Assemble a state from already-built parts. Grants and shares are
    /// backed by `database`.
    pub fn from_parts(
        database: Database,
        index: FileIndex,
        overlay: OverlayFs,
        identity: Arc<dyn IdentityProvider>,
        base: &str,
        search_limit: usize,
    ) -> Self {
        let gateway = AccessGateway::new(
            index,
            Arc::new(database.clone()),
            ShareRegistry::new(Arc::new(database.clone())),
        );

        Self {
            database,
            gateway,
            overlay: Arc::new(overlay),
            identity,
            sessions: SessionStore::new(),
            base: base.to_string(),
            search_limit,
            watcher: Arc::new(Mutex::new(None)),
        }
    }

    pub fn database(&self) -> &Database {
        &self.database
    }

    pub fn gateway(&self) -> &AccessGateway {
        &self.gateway
    }

    pub fn index(&self) -> &FileIndex {
        self.gateway.index()
    }

    pub fn overlay(&self) -> &OverlayFs {
        &self.overlay
    }

    pub fn identity(&self) -> &Arc<dyn IdentityProvider> {
        &self.identity
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Mount prefix, e.g. `/` or `/files-app/`.
    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn search_limit(&self) -> usize {
        self.search_limit
    }

    /// Stop watching the tree. Blocks until the index writer has drained.
    pub fn stop_watcher(&self) {
        if let Some(watcher) = self.watcher.lock().take() {
            watcher.stop();
            tracing::info!("filesystem watcher stopped");
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StateSetupError {
    #[error("failed to setup the database: {0}")]
    Database(#[from] DatabaseSetupError),
    #[error("failed to bootstrap the admin user: {0}")]
    Bootstrap(sqlx::Error),
    #[error("failed to configure the identity provider: {0}")]
    Identity(#[from] IdentityError),
    #[error("served root {0} is not a directory")]
    Root(String),
    #[error("failed to scan the served root: {0}")]
    Scan(String),
    #[error(transparent)]
    Assets(#[from] AssetsError),
}
