//! Anonymous share links.
//!
//! A share token is a bearer capability for exactly one path (and, for a
//! directory, everything below it). Tokens never expire; they stop working
//! only when deleted or when their target disappears from the index.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::path::TreePath;

/// Bytes of entropy in a share token
pub const TOKEN_BYTES: usize = 16;
/// Rendered width of a share token (hex)
pub const TOKEN_LEN: usize = TOKEN_BYTES * 2;

/// How many times minting retries after a token collision before giving up.
const MAX_MINT_ATTEMPTS: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareLink {
    pub id: i64,
    pub token: String,
    pub path: TreePath,
}

/// Storage for share links. Tokens are unique across the store.
#[async_trait]
pub trait ShareStore: Send + Sync + fmt::Debug {
    /// Insert a new link. Fails with `Conflict` if the token is taken.
    async fn insert_share(&self, token: &str, path: &TreePath) -> Result<ShareLink, StoreError>;

    async fn get_share(&self, token: &str) -> Result<Option<ShareLink>, StoreError>;

    /// Point an existing token at a new path.
    async fn update_share(&self, token: &str, path: &TreePath) -> Result<ShareLink, StoreError>;

    async fn delete_share(&self, token: &str) -> Result<(), StoreError>;

    async fn list_shares(&self) -> Result<Vec<ShareLink>, StoreError>;
}

/// Render a fresh random token.
pub fn mint_token() -> String {
    hex::encode(rand::random::<[u8; TOKEN_BYTES]>())
}

/// True if `token` has the shape of a minted token. Used to reject junk
/// before it reaches the store.
pub fn is_well_formed(token: &str) -> bool {
    token.len() == TOKEN_LEN && token.bytes().all(|b| b.is_ascii_hexdigit())
}

pub type Minter = Arc<dyn Fn() -> String + Send + Sync>;

/// Mints, resolves and manages share tokens on top of a [`ShareStore`].
#[derive(Clone)]
pub struct ShareRegistry {
    store: Arc<dyn ShareStore>,
    minter: Minter,
}

impl fmt::Debug for ShareRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShareRegistry")
            .field("store", &self.store)
            .finish()
    }
}

impl ShareRegistry {
    pub fn new(store: Arc<dyn ShareStore>) -> Self {
        Self {
            store,
            minter: Arc::new(mint_token),
        }
    }

    /// Use a custom token source. Tokens it produces must still be unique
    /// with overwhelming probability; collisions are retried.
    pub fn with_minter(store: Arc<dyn ShareStore>, minter: Minter) -> Self {
        Self { store, minter }
    }

    /// Create a link to `path` and return its token. A colliding token is
    /// regenerated; the collision never reaches the caller.
    pub async fn create(&self, path: &TreePath) -> Result<ShareLink, StoreError> {
        for attempt in 1..=MAX_MINT_ATTEMPTS {
            let token = (self.minter)();
            match self.store.insert_share(&token, path).await {
                Ok(link) => {
                    tracing::info!(%path, id = link.id, "share created");
                    return Ok(link);
                }
                Err(StoreError::Conflict) => {
                    tracing::warn!(attempt, "share token collision, regenerating");
                }
                Err(e) => return Err(e),
            }
        }
        Err(StoreError::Backend(format!(
            "unable to mint a unique share token after {} attempts",
            MAX_MINT_ATTEMPTS
        )))
    }

    /// Look up the path a token grants. Does not check that the path exists.
    pub async fn resolve(&self, token: &str) -> Result<Option<TreePath>, StoreError> {
        Ok(self.store.get_share(token).await?.map(|link| link.path))
    }

    pub async fn get(&self, token: &str) -> Result<Option<ShareLink>, StoreError> {
        self.store.get_share(token).await
    }

    pub async fn update(&self, token: &str, path: &TreePath) -> Result<ShareLink, StoreError> {
        let link = self.store.update_share(token, path).await?;
        tracing::info!(%path, id = link.id, "share retargeted");
        Ok(link)
    }

    pub async fn delete(&self, token: &str) -> Result<(), StoreError> {
        self.store.delete_share(token).await?;
        tracing::info!("share deleted");
        Ok(())
    }

    pub async fn list(&self) -> Result<Vec<ShareLink>, StoreError> {
        self.store.list_shares().await
    }
}

/// In-memory share store.
#[derive(Debug, Clone, Default)]
pub struct MemoryShareStore {
    inner: Arc<RwLock<MemoryShareStoreInner>>,
}

#[derive(Debug, Default)]
struct MemoryShareStoreInner {
    next_id: i64,
    by_token: BTreeMap<String, ShareLink>,
}

impl MemoryShareStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ShareStore for MemoryShareStore {
    async fn insert_share(&self, token: &str, path: &TreePath) -> Result<ShareLink, StoreError> {
        let mut inner = self.inner.write();
        if inner.by_token.contains_key(token) {
            return Err(StoreError::Conflict);
        }
        inner.next_id += 1;
        let link = ShareLink {
            id: inner.next_id,
            token: token.to_string(),
            path: path.clone(),
        };
        inner.by_token.insert(link.token.clone(), link.clone());
        Ok(link)
    }

    async fn get_share(&self, token: &str) -> Result<Option<ShareLink>, StoreError> {
        Ok(self.inner.read().by_token.get(token).cloned())
    }

    async fn update_share(&self, token: &str, path: &TreePath) -> Result<ShareLink, StoreError> {
        let mut inner = self.inner.write();
        let link = inner.by_token.get_mut(token).ok_or(StoreError::NotFound)?;
        link.path = path.clone();
        Ok(link.clone())
    }

    async fn delete_share(&self, token: &str) -> Result<(), StoreError> {
        self.inner
            .write()
            .by_token
            .remove(token)
            .map(|_| ())
            .ok_or(StoreError::NotFound)
    }

    async fn list_shares(&self) -> Result<Vec<ShareLink>, StoreError> {
        let mut links: Vec<_> = self.inner.read().by_token.values().cloned().collect();
        links.sort_by_key(|l| l.id);
        Ok(links)
    }
}
