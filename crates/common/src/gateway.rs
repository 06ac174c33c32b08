//! Single point where principals meet the served tree.
//!
//! Every read (listing, open, search) and every grant or share mutation goes
//! through [`AccessGateway`]. A request resolves its principal into a
//! [`Scope`] exactly once: grants are read from the store at that moment and
//! never cached across requests, and share tokens are resolved against the
//! registry and the live index.
//!
//! Users and share tokens never mix. A user's scope comes only from their
//! grants; a token's scope comes only from its share link.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::access::{self, Grant, GrantStore};
use crate::error::GatewayError;
use crate::format::byte_count_iec;
use crate::index::{FileIndex, IndexNode, Search};
use crate::path::TreePath;
use crate::share::{self, ShareLink, ShareRegistry};

/// Who is asking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Principal {
    User { id: i64, admin: bool },
    Anonymous { token: String },
    Guest,
}

impl Principal {
    pub fn is_admin(&self) -> bool {
        matches!(self, Principal::User { admin: true, .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Allowed; `root` is the top of the subtree that permits the target
    Allowed { root: TreePath },
    Denied,
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allowed { .. })
    }
}

/// A principal's visible part of the tree, resolved once per request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    Everything,
    Grants(Vec<TreePath>),
    Share(TreePath),
    Nothing,
}

impl Scope {
    pub fn permits(&self, target: &TreePath) -> bool {
        match self {
            Scope::Everything => true,
            Scope::Grants(grants) => access::is_permitted(grants, target),
            Scope::Share(root) => target.starts_with(root),
            Scope::Nothing => false,
        }
    }

    /// Directories a user passes through on the way to a grant.
    pub fn traverses(&self, target: &TreePath) -> bool {
        match self {
            Scope::Grants(grants) => access::is_ancestor_of_grant(grants, target),
            _ => false,
        }
    }

    pub fn decide(&self, target: &TreePath) -> Decision {
        let root = match self {
            Scope::Everything => Some(TreePath::root()),
            Scope::Grants(grants) => access::matching_grant(grants, target).cloned(),
            Scope::Share(root) if target.starts_with(root) => Some(root.clone()),
            Scope::Share(_) | Scope::Nothing => None,
        };
        match root {
            Some(root) => Decision::Allowed { root },
            None => Decision::Denied,
        }
    }

    /// `path` as the principal gets to see it. Share holders only ever see
    /// paths relative to the shared path.
    pub fn present(&self, path: TreePath) -> TreePath {
        match self {
            Scope::Share(root) => path
                .rebase(root, &TreePath::root())
                .unwrap_or_else(TreePath::root),
            _ => path,
        }
    }

    /// Roots a search may descend from.
    pub fn search_roots(&self) -> Vec<TreePath> {
        match self {
            Scope::Everything => vec![TreePath::root()],
            Scope::Grants(grants) => grants.clone(),
            Scope::Share(root) => vec![root.clone()],
            Scope::Nothing => Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListingEntry {
    pub name: String,
    pub path: TreePath,
    pub is_dir: bool,
    pub size: u64,
    pub size_formatted: String,
    pub modified: Option<DateTime<Utc>>,
}

impl From<IndexNode> for ListingEntry {
    fn from(node: IndexNode) -> Self {
        Self {
            name: node.name().to_string(),
            size_formatted: if node.is_dir {
                String::new()
            } else {
                byte_count_iec(node.size)
            },
            is_dir: node.is_dir,
            size: node.size,
            modified: node.modified,
            path: node.path,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Listing {
    pub path: TreePath,
    /// False when the directory is only shown as a way through to a grant
    pub visible: bool,
    pub entries: Vec<ListingEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Opened {
    /// A readable file; `disk_path` is canonical and inside the principal's scope
    File { disk_path: PathBuf, node: IndexNode },
    Directory(Listing),
}

#[derive(Debug, Clone)]
pub struct AccessGateway {
    index: FileIndex,
    grants: Arc<dyn GrantStore>,
    shares: ShareRegistry,
}

impl AccessGateway {
    pub fn new(index: FileIndex, grants: Arc<dyn GrantStore>, shares: ShareRegistry) -> Self {
        Self {
            index,
            grants,
            shares,
        }
    }

    pub fn index(&self) -> &FileIndex {
        &self.index
    }

    pub fn shares(&self) -> &ShareRegistry {
        &self.shares
    }

    /// Resolve what `principal` may see right now.
    pub async fn scope(&self, principal: &Principal) -> Result<Scope, GatewayError> {
        match principal {
            Principal::User { admin: true, .. } => Ok(Scope::Everything),
            Principal::User { id, .. } => Ok(Scope::Grants(self.grants.grants_for(*id).await?)),
            Principal::Anonymous { token } => {
                if !share::is_well_formed(token) {
                    return Ok(Scope::Nothing);
                }
                match self.shares.resolve(token).await? {
                    Some(root) if self.index.contains(&root) => Ok(Scope::Share(root)),
                    _ => Ok(Scope::Nothing),
                }
            }
            Principal::Guest => Ok(Scope::Nothing),
        }
    }

    /// Decide whether `principal` may read `target`. Denial is a normal
    /// result; only store failures are errors.
    pub async fn authorize(&self, principal: &Principal, target: &str) -> Result<Decision, GatewayError> {
        let target = TreePath::parse(target)?;
        Ok(self.scope(principal).await?.decide(&target))
    }

    pub async fn listing(&self, principal: &Principal, path: &str) -> Result<Listing, GatewayError> {
        let target = TreePath::parse(path)?;
        let scope = self.scope(principal).await?;
        self.list_in_scope(&scope, &target)
    }

    fn list_in_scope(&self, scope: &Scope, target: &TreePath) -> Result<Listing, GatewayError> {
        let visible = scope.permits(target);
        if !visible && !scope.traverses(target) {
            return Err(GatewayError::Forbidden);
        }

        let children = self.index.list(target).ok_or(GatewayError::NotFound)?;
        let entries: Vec<ListingEntry> = children
            .into_iter()
            .filter(|child| scope.permits(&child.path) || scope.traverses(&child.path))
            .map(|child| {
                let mut entry = ListingEntry::from(child);
                entry.path = scope.present(entry.path);
                entry
            })
            .collect();

        if !visible && entries.is_empty() {
            return Err(GatewayError::NotFound);
        }

        Ok(Listing {
            path: scope.present(target.clone()),
            visible,
            entries,
        })
    }

    /// Open a file for reading or list a directory.
    pub async fn open(&self, principal: &Principal, path: &str) -> Result<Opened, GatewayError> {
        let target = TreePath::parse(path)?;
        let scope = self.scope(principal).await?;
        self.open_in_scope(&scope, &target)
    }

    fn open_in_scope(&self, scope: &Scope, target: &TreePath) -> Result<Opened, GatewayError> {
        if !scope.permits(target) {
            if scope.traverses(target) {
                return self.list_in_scope(scope, target).map(Opened::Directory);
            }
            return Err(GatewayError::Forbidden);
        }

        let node = self.index.get(target).ok_or(GatewayError::NotFound)?;
        if node.is_dir {
            return self.list_in_scope(scope, target).map(Opened::Directory);
        }

        let root = self.index.root();
        let disk_path = target.to_disk(root).canonicalize()?;
        // a symlink must land inside the principal's scope, not just the root
        let resolved = match TreePath::from_disk(root, &disk_path) {
            Ok(resolved) => resolved,
            Err(_) => {
                tracing::warn!(path = %target, "refusing to open file resolving outside the served root");
                return Err(GatewayError::Forbidden);
            }
        };
        if !scope.permits(&resolved) {
            tracing::warn!(path = %target, %resolved, "refusing to follow link out of scope");
            return Err(GatewayError::Forbidden);
        }
        if !disk_path.is_file() {
            return Err(GatewayError::NotFound);
        }

        Ok(Opened::File { disk_path, node })
    }

    /// Anonymous access through a share token. `path` is absolute and must lie
    /// inside the shared path.
    pub async fn open_shared(&self, token: &str, path: &str) -> Result<Opened, GatewayError> {
        let principal = Principal::Anonymous {
            token: token.to_string(),
        };
        self.open(&principal, path).await
    }

    /// The path a share token currently grants, if the token is live.
    pub async fn share_root(&self, token: &str) -> Result<Option<TreePath>, GatewayError> {
        let principal = Principal::Anonymous {
            token: token.to_string(),
        };
        match self.scope(&principal).await? {
            Scope::Share(root) => Ok(Some(root)),
            _ => Ok(None),
        }
    }

    /// Lazy search confined to what `principal` may see.
    pub async fn search(&self, principal: &Principal, query: &str) -> Result<Search, GatewayError> {
        let scope = self.scope(principal).await?;
        let search = self.index.search(query, &scope.search_roots());
        Ok(match scope {
            Scope::Share(root) => search.relative_to(root),
            _ => search,
        })
    }

    fn require_admin(principal: &Principal) -> Result<(), GatewayError> {
        if principal.is_admin() {
            Ok(())
        } else {
            Err(GatewayError::Forbidden)
        }
    }

    pub async fn access_list(&self, principal: &Principal) -> Result<Vec<Grant>, GatewayError> {
        Self::require_admin(principal)?;
        Ok(self.grants.list_grants().await?)
    }

    pub async fn access_create(
        &self,
        principal: &Principal,
        user_id: i64,
        path: &str,
    ) -> Result<Grant, GatewayError> {
        Self::require_admin(principal)?;
        let path = TreePath::parse(path)?;
        let grant = self.grants.create_grant(user_id, &path).await?;
        tracing::info!(user_id, %path, id = grant.id, "access granted");
        Ok(grant)
    }

    pub async fn access_update(
        &self,
        principal: &Principal,
        id: i64,
        path: &str,
    ) -> Result<Grant, GatewayError> {
        Self::require_admin(principal)?;
        let path = TreePath::parse(path)?;
        let grant = self.grants.update_grant(id, &path).await?;
        tracing::info!(id, %path, "access updated");
        Ok(grant)
    }

    pub async fn access_delete(&self, principal: &Principal, id: i64) -> Result<(), GatewayError> {
        Self::require_admin(principal)?;
        self.grants.delete_grant(id).await?;
        tracing::info!(id, "access revoked");
        Ok(())
    }

    /// Share a path the principal can read. Only signed-in users may share.
    pub async fn share_create(&self, principal: &Principal, path: &str) -> Result<ShareLink, GatewayError> {
        let scope = self.user_scope(principal).await?;
        let path = TreePath::parse(path)?;
        if !scope.permits(&path) {
            return Err(GatewayError::Forbidden);
        }
        if !self.index.contains(&path) {
            return Err(GatewayError::NotFound);
        }
        Ok(self.shares.create(&path).await?)
    }

    /// Point a share at a new path. Both the current and the new target must
    /// be readable by the principal.
    pub async fn share_update(
        &self,
        principal: &Principal,
        token: &str,
        path: &str,
    ) -> Result<ShareLink, GatewayError> {
        let scope = self.user_scope(principal).await?;
        let path = TreePath::parse(path)?;
        let link = self.shares.get(token).await?.ok_or(GatewayError::NotFound)?;
        if !scope.permits(&link.path) || !scope.permits(&path) {
            return Err(GatewayError::Forbidden);
        }
        if !self.index.contains(&path) {
            return Err(GatewayError::NotFound);
        }
        Ok(self.shares.update(token, &path).await?)
    }

    pub async fn share_delete(&self, principal: &Principal, token: &str) -> Result<(), GatewayError> {
        let scope = self.user_scope(principal).await?;
        let link = self.shares.get(token).await?.ok_or(GatewayError::NotFound)?;
        if !scope.permits(&link.path) {
            return Err(GatewayError::Forbidden);
        }
        Ok(self.shares.delete(token).await?)
    }

    pub async fn share_list(&self, principal: &Principal) -> Result<Vec<ShareLink>, GatewayError> {
        Self::require_admin(principal)?;
        Ok(self.shares.list().await?)
    }

    async fn user_scope(&self, principal: &Principal) -> Result<Scope, GatewayError> {
        match principal {
            Principal::User { .. } => self.scope(principal).await,
            _ => Err(GatewayError::Forbidden),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;
    use crate::access::MemoryGrantStore;
    use crate::share::MemoryShareStore;

    fn t(raw: &str) -> TreePath {
        TreePath::parse(raw).unwrap()
    }

    async fn setup() -> (TempDir, AccessGateway, Arc<MemoryGrantStore>) {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("b/c")).unwrap();
        fs::create_dir_all(dir.path().join("b/other")).unwrap();
        fs::write(dir.path().join("b/c/file.txt"), b"hello").unwrap();
        fs::write(dir.path().join("b/other/nope.txt"), b"no").unwrap();

        let index = FileIndex::scan(dir.path()).unwrap();
        let grants = Arc::new(MemoryGrantStore::new());
        let shares = ShareRegistry::new(Arc::new(MemoryShareStore::new()));
        let gateway = AccessGateway::new(index, grants.clone(), shares);
        (dir, gateway, grants)
    }

    #[tokio::test]
    async fn test_scope_decisions() {
        let (_dir, gateway, grants) = setup().await;
        grants.create_grant(1, &t("/b/c")).await.unwrap();
        let user = Principal::User { id: 1, admin: false };
        let admin = Principal::User { id: 2, admin: true };

        assert_eq!(
            gateway.authorize(&user, "/b/c/file.txt").await.unwrap(),
            Decision::Allowed { root: t("/b/c") }
        );
        assert_eq!(gateway.authorize(&user, "/b/cx").await.unwrap(), Decision::Denied);
        assert_eq!(
            gateway.authorize(&admin, "/anything").await.unwrap(),
            Decision::Allowed { root: TreePath::root() }
        );
        assert_eq!(
            gateway.authorize(&Principal::Guest, "/b").await.unwrap(),
            Decision::Denied
        );
    }

    #[tokio::test]
    async fn test_listing_shows_path_to_grant_only() {
        let (_dir, gateway, grants) = setup().await;
        grants.create_grant(1, &t("/b/c")).await.unwrap();
        let user = Principal::User { id: 1, admin: false };

        let root = gateway.listing(&user, "/").await.unwrap();
        assert!(!root.visible);
        assert_eq!(root.entries.len(), 1);
        assert_eq!(root.entries[0].name, "b");

        let b = gateway.listing(&user, "/b").await.unwrap();
        let names: Vec<_> = b.entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["c"]);

        let c = gateway.listing(&user, "/b/c").await.unwrap();
        assert!(c.visible);
        assert_eq!(c.entries[0].size_formatted, "5 B");

        assert!(matches!(
            gateway.listing(&user, "/b/other").await,
            Err(GatewayError::Forbidden)
        ));
    }

    #[tokio::test]
    async fn test_guest_sees_nothing() {
        let (_dir, gateway, _grants) = setup().await;
        assert!(gateway.listing(&Principal::Guest, "/").await.is_err());
        assert_eq!(gateway.search(&Principal::Guest, "file").await.unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_access_crud_requires_admin() {
        let (_dir, gateway, _grants) = setup().await;
        let user = Principal::User { id: 1, admin: false };
        let admin = Principal::User { id: 2, admin: true };

        assert!(matches!(
            gateway.access_create(&user, 1, "/b").await,
            Err(GatewayError::Forbidden)
        ));
        let grant = gateway.access_create(&admin, 1, "/b/./c/").await.unwrap();
        assert_eq!(grant.path, t("/b/c"));
        assert!(gateway.authorize(&user, "/b/c").await.unwrap().is_allowed());

        gateway.access_update(&admin, grant.id, "/b/other").await.unwrap();
        assert!(!gateway.authorize(&user, "/b/c").await.unwrap().is_allowed());

        gateway.access_delete(&admin, grant.id).await.unwrap();
        assert!(gateway.access_list(&admin).await.unwrap().is_empty());
        assert!(matches!(
            gateway.access_delete(&admin, grant.id).await,
            Err(GatewayError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_share_mutations_need_coverage() {
        let (_dir, gateway, grants) = setup().await;
        grants.create_grant(1, &t("/b/c")).await.unwrap();
        let owner = Principal::User { id: 1, admin: false };
        let stranger = Principal::User { id: 3, admin: false };

        assert!(matches!(
            gateway.share_create(&stranger, "/b/c/file.txt").await,
            Err(GatewayError::Forbidden)
        ));
        assert!(matches!(
            gateway.share_create(&owner, "/b/c/missing.txt").await,
            Err(GatewayError::NotFound)
        ));

        let link = gateway.share_create(&owner, "/b/c/file.txt").await.unwrap();
        assert!(matches!(
            gateway.share_delete(&stranger, &link.token).await,
            Err(GatewayError::Forbidden)
        ));
        assert!(matches!(
            gateway.share_update(&owner, &link.token, "/b/other/nope.txt").await,
            Err(GatewayError::Forbidden)
        ));
        let anon = Principal::Anonymous { token: link.token.clone() };
        assert!(matches!(
            gateway.share_delete(&anon, &link.token).await,
            Err(GatewayError::Forbidden)
        ));
        gateway.share_delete(&owner, &link.token).await.unwrap();
    }
}
