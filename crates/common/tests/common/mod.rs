//! Shared fixtures for gateway integration tests
#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;

use ::common::prelude::*;
use tempfile::TempDir;

/// Write `files` (relative paths) under a fresh temp dir.
pub fn tree(files: &[(&str, &str)]) -> TempDir {
    let dir = TempDir::new().unwrap();
    for (path, body) in files {
        write(dir.path(), path, body);
    }
    dir
}

pub fn write(root: &Path, path: &str, body: &str) {
    let full = root.join(path);
    if let Some(parent) = full.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(full, body).unwrap();
}

pub struct Env {
    pub dir: TempDir,
    pub gateway: AccessGateway,
    pub grants: Arc<MemoryGrantStore>,
}

/// A gateway over a scanned temp tree backed by in-memory stores.
pub fn setup(files: &[(&str, &str)]) -> Env {
    let dir = tree(files);
    let index = FileIndex::scan(dir.path()).unwrap();
    let grants = Arc::new(MemoryGrantStore::new());
    let shares = ShareRegistry::new(Arc::new(MemoryShareStore::new()));
    let gateway = AccessGateway::new(index, grants.clone(), shares);
    Env {
        dir,
        gateway,
        grants,
    }
}

pub fn t(raw: &str) -> TreePath {
    TreePath::parse(raw).unwrap()
}

pub fn user(id: i64) -> Principal {
    Principal::User { id, admin: false }
}

pub fn admin(id: i64) -> Principal {
    Principal::User { id, admin: true }
}
