//! Prefix-based access control.
//!
//! A user's permission is the union of their granted path prefixes. There is
//! no precedence and no deny rule: a target is permitted iff it lies inside at
//! least one grant, matching whole path segments only.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::path::TreePath;

/// A single path prefix granted to a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grant {
    pub id: i64,
    pub user_id: i64,
    pub path: TreePath,
}

/// True iff some grant equals `target` or is a segment-wise ancestor of it.
///
/// Cost is linear in the number of grants. `"/"` permits everything.
pub fn is_permitted<'a, I>(grants: I, target: &TreePath) -> bool
where
    I: IntoIterator<Item = &'a TreePath>,
{
    grants.into_iter().any(|grant| target.starts_with(grant))
}

/// The grant that permits `target`, preferring the deepest match.
pub fn matching_grant<'a, I>(grants: I, target: &TreePath) -> Option<&'a TreePath>
where
    I: IntoIterator<Item = &'a TreePath>,
{
    grants
        .into_iter()
        .filter(|grant| target.starts_with(grant))
        .max_by_key(|grant| grant.as_str().len())
}

/// True iff `target` is a strict ancestor of some grant, i.e. a directory a
/// user must pass through to reach something they may see.
pub fn is_ancestor_of_grant<'a, I>(grants: I, target: &TreePath) -> bool
where
    I: IntoIterator<Item = &'a TreePath>,
{
    grants
        .into_iter()
        .any(|grant| grant != target && grant.starts_with(target))
}

/// Storage for access grants.
#[async_trait]
pub trait GrantStore: Send + Sync + std::fmt::Debug {
    /// All prefixes granted to a user.
    async fn grants_for(&self, user_id: i64) -> Result<Vec<TreePath>, StoreError>;

    /// Every grant, for the admin view.
    async fn list_grants(&self) -> Result<Vec<Grant>, StoreError>;

    /// Grant `path` to `user_id`. Fails with `NotFound` if the user does not exist.
    async fn create_grant(&self, user_id: i64, path: &TreePath) -> Result<Grant, StoreError>;

    /// Replace the prefix of an existing grant in place.
    async fn update_grant(&self, id: i64, path: &TreePath) -> Result<Grant, StoreError>;

    async fn delete_grant(&self, id: i64) -> Result<(), StoreError>;
}

/// In-memory grant store, used in tests and when no database is configured.
#[derive(Debug, Clone, Default)]
pub struct MemoryGrantStore {
    inner: Arc<RwLock<MemoryGrantStoreInner>>,
}

#[derive(Debug, Default)]
struct MemoryGrantStoreInner {
    next_id: i64,
    grants: BTreeMap<i64, Grant>,
}

impl MemoryGrantStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl GrantStore for MemoryGrantStore {
    async fn grants_for(&self, user_id: i64) -> Result<Vec<TreePath>, StoreError> {
        let inner = self.inner.read();
        Ok(inner
            .grants
            .values()
            .filter(|g| g.user_id == user_id)
            .map(|g| g.path.clone())
            .collect())
    }

    async fn list_grants(&self) -> Result<Vec<Grant>, StoreError> {
        Ok(self.inner.read().grants.values().cloned().collect())
    }

    async fn create_grant(&self, user_id: i64, path: &TreePath) -> Result<Grant, StoreError> {
        let mut inner = self.inner.write();
        inner.next_id += 1;
        let grant = Grant {
            id: inner.next_id,
            user_id,
            path: path.clone(),
        };
        inner.grants.insert(grant.id, grant.clone());
        Ok(grant)
    }

    async fn update_grant(&self, id: i64, path: &TreePath) -> Result<Grant, StoreError> {
        let mut inner = self.inner.write();
        let grant = inner.grants.get_mut(&id).ok_or(StoreError::NotFound)?;
        grant.path = path.clone();
        Ok(grant.clone())
    }

    async fn delete_grant(&self, id: i64) -> Result<(), StoreError> {
        self.inner
            .write()
            .grants
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::NotFound)
    }
}
