//! In-memory mirror of the served tree.
//!
//! The index is seeded by a full walk at startup and afterwards mutated only
//! through [`FileIndex::apply`], which the watcher's single writer calls for
//! each [`IndexEvent`]. Request handlers only ever read it.
//!
//! Event cost is bounded by the affected subtree: removing or renaming a
//! directory touches its descendants, and a newly seen directory is not walked
//! in the same event. Instead `apply` returns a [`IndexEvent::Relist`]
//! follow-up which reconciles exactly one directory level. Until that
//! follow-up runs, listing the directory falls back to reading it from disk.

use std::cmp::Ordering as CmpOrdering;
use std::collections::{BTreeSet, HashMap};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use walkdir::WalkDir;

use crate::path::TreePath;

/// One entry of the served tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexNode {
    pub path: TreePath,
    pub is_dir: bool,
    pub size: u64,
    pub modified: Option<DateTime<Utc>>,
}

impl IndexNode {
    pub fn name(&self) -> &str {
        self.path.name()
    }
}

/// A change to apply to the index, in tree coordinates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexEvent {
    Created(TreePath),
    Modified(TreePath),
    Removed(TreePath),
    Renamed { from: TreePath, to: TreePath },
    /// Reconcile one directory's children with the disk
    Relist(TreePath),
}

impl IndexEvent {
    pub fn path(&self) -> &TreePath {
        match self {
            IndexEvent::Created(p)
            | IndexEvent::Modified(p)
            | IndexEvent::Removed(p)
            | IndexEvent::Relist(p) => p,
            IndexEvent::Renamed { to, .. } => to,
        }
    }
}

/// A search result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchHit {
    pub path: TreePath,
    pub is_dir: bool,
}

#[derive(Debug, Clone, Copy)]
struct NodeMeta {
    is_dir: bool,
    size: u64,
    modified: Option<DateTime<Utc>>,
}

impl NodeMeta {
    fn from_fs(meta: &std::fs::Metadata) -> Self {
        Self {
            is_dir: meta.is_dir(),
            size: if meta.is_dir() { 0 } else { meta.len() },
            modified: meta.modified().ok().map(DateTime::<Utc>::from),
        }
    }

    // placeholder for ancestors we learn about before seeing them on disk
    fn unknown_dir() -> Self {
        Self {
            is_dir: true,
            size: 0,
            modified: None,
        }
    }
}

#[derive(Debug, Clone)]
struct Entry {
    node: IndexNode,
    children: BTreeSet<String>,
    // false until the directory's children have been read
    listed: bool,
}

impl Entry {
    fn new(path: TreePath, meta: NodeMeta) -> Self {
        Self {
            node: IndexNode {
                path,
                is_dir: meta.is_dir,
                size: meta.size,
                modified: meta.modified,
            },
            children: BTreeSet::new(),
            listed: !meta.is_dir,
        }
    }

    fn refresh(&mut self, meta: NodeMeta) {
        self.node.size = meta.size;
        self.node.modified = meta.modified;
    }
}

type Tree = HashMap<TreePath, Entry>;

struct Shared {
    root: PathBuf,
    tree: RwLock<Tree>,
    degraded: AtomicBool,
}

/// Shared handle to the index. Cloning is cheap.
#[derive(Clone)]
pub struct FileIndex {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for FileIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileIndex")
            .field("root", &self.shared.root)
            .field("nodes", &self.len())
            .field("degraded", &self.is_degraded())
            .finish()
    }
}

impl FileIndex {
    /// Walk `root` and build the index. Blocking; run it off the async runtime.
    pub fn scan(root: impl AsRef<Path>) -> io::Result<Self> {
        let root = root.as_ref().canonicalize()?;
        let root_meta = std::fs::metadata(&root)?;
        if !root_meta.is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} is not a directory", root.display()),
            ));
        }

        let mut tree = Tree::new();
        let mut root_entry = Entry::new(TreePath::root(), NodeMeta::from_fs(&root_meta));
        root_entry.listed = true;
        tree.insert(TreePath::root(), root_entry);

        for item in WalkDir::new(&root).follow_links(false).min_depth(1) {
            let item = match item {
                Ok(item) => item,
                Err(e) => {
                    tracing::warn!("skipping unreadable entry during scan: {}", e);
                    continue;
                }
            };
            let path = match TreePath::from_disk(&root, item.path()) {
                Ok(path) => path,
                Err(e) => {
                    tracing::warn!("skipping entry during scan: {}", e);
                    continue;
                }
            };
            let meta = match item.metadata() {
                Ok(meta) => NodeMeta::from_fs(&meta),
                Err(e) => {
                    tracing::warn!(%path, "skipping entry without metadata: {}", e);
                    continue;
                }
            };

            let mut entry = Entry::new(path.clone(), meta);
            // the walk visits every descendant, so directories start listed
            entry.listed = true;
            if let Some(parent) = path.parent() {
                if let Some(parent_entry) = tree.get_mut(&parent) {
                    parent_entry.children.insert(path.name().to_string());
                }
            }
            tree.insert(path, entry);
        }

        tracing::info!(root = %root.display(), nodes = tree.len(), "index scan complete");

        Ok(Self {
            shared: Arc::new(Shared {
                root,
                tree: RwLock::new(tree),
                degraded: AtomicBool::new(false),
            }),
        })
    }

    /// Canonical on-disk root of the served tree.
    pub fn root(&self) -> &Path {
        &self.shared.root
    }

    pub fn len(&self) -> usize {
        self.shared.tree.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, path: &TreePath) -> Option<IndexNode> {
        self.shared.tree.read().get(path).map(|e| e.node.clone())
    }

    pub fn contains(&self, path: &TreePath) -> bool {
        self.shared.tree.read().contains_key(path)
    }

    /// Children of a directory, directories first then by name. `None` if
    /// `path` is not a tracked directory.
    pub fn list(&self, path: &TreePath) -> Option<Vec<IndexNode>> {
        {
            let tree = self.shared.tree.read();
            let entry = tree.get(path)?;
            if !entry.node.is_dir {
                return None;
            }
            if entry.listed {
                let mut nodes: Vec<IndexNode> = entry
                    .children
                    .iter()
                    .filter_map(|name| tree.get(&path.child(name)))
                    .map(|e| e.node.clone())
                    .collect();
                nodes.sort_by(display_order);
                return Some(nodes);
            }
        }

        // not yet relisted by the writer; read the directory without touching the index
        match read_children(&self.shared.root, path) {
            Ok(children) => {
                let mut nodes: Vec<IndexNode> = children
                    .into_iter()
                    .map(|(name, meta)| Entry::new(path.child(&name), meta).node)
                    .collect();
                nodes.sort_by(display_order);
                Some(nodes)
            }
            // gone from disk before the writer caught up
            Err(e) if e.kind() == io::ErrorKind::NotFound => None,
            Err(e) => {
                tracing::debug!(%path, "fallback listing failed: {}", e);
                Some(Vec::new())
            }
        }
    }

    /// Lazily search the subtrees under `visible_roots`.
    ///
    /// Every whitespace-separated token of `query` must occur (ignoring case)
    /// in the node's path, and at least one of them in the node's own name.
    /// Results come depth-first, directories before files at each level.
    pub fn search(&self, query: &str, visible_roots: &[TreePath]) -> Search {
        let needles: Vec<String> = query
            .split_whitespace()
            .map(|token| token.to_lowercase())
            .collect();

        let mut roots: Vec<TreePath> = visible_roots.to_vec();
        roots.sort();
        roots.dedup();
        let mut collapsed: Vec<TreePath> = Vec::new();
        for root in roots {
            if !collapsed.iter().any(|kept| root.starts_with(kept)) {
                collapsed.push(root);
            }
        }

        let stack = if needles.is_empty() {
            Vec::new()
        } else {
            collapsed.into_iter().rev().collect()
        };

        Search {
            index: self.clone(),
            needles,
            stack,
            base: None,
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.shared.degraded.load(Ordering::Acquire)
    }

    /// Mark the index as no longer tracking the disk. Sticky until restart.
    pub fn mark_degraded(&self, reason: &str) {
        if !self.shared.degraded.swap(true, Ordering::AcqRel) {
            tracing::error!(
                "file index degraded, serving last known state until restart: {}",
                reason
            );
        }
    }

    /// Apply one event and return follow-up events the caller should apply
    /// afterwards.
    pub fn apply(&self, event: IndexEvent) -> Vec<IndexEvent> {
        let mut followups = Vec::new();
        match event {
            IndexEvent::Created(path) | IndexEvent::Modified(path) => {
                match stat(&self.shared.root, &path) {
                    Ok(meta) => {
                        let mut tree = self.shared.tree.write();
                        upsert(&mut tree, &path, meta, &mut followups);
                    }
                    Err(e) if e.kind() == io::ErrorKind::NotFound => {
                        // gone before we got to it
                        let mut tree = self.shared.tree.write();
                        remove(&mut tree, &path);
                    }
                    Err(e) => tracing::warn!(%path, "unable to stat changed path: {}", e),
                }
            }
            IndexEvent::Removed(path) => {
                let mut tree = self.shared.tree.write();
                remove(&mut tree, &path);
            }
            IndexEvent::Renamed { from, to } => {
                let meta = stat(&self.shared.root, &to);
                let mut tree = self.shared.tree.write();
                rename(&mut tree, &from, &to, meta.ok(), &mut followups);
            }
            IndexEvent::Relist(dir) => match read_children(&self.shared.root, &dir) {
                Ok(children) => {
                    let mut tree = self.shared.tree.write();
                    relist(&mut tree, &dir, children, &mut followups);
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    followups.push(IndexEvent::Removed(dir));
                }
                Err(e) => tracing::warn!(%dir, "unable to relist directory: {}", e),
            },
        }
        followups
    }

    /// Apply an event and every follow-up it produces, in order.
    pub fn apply_all(&self, event: IndexEvent) {
        let mut pending = std::collections::VecDeque::from([event]);
        while let Some(next) = pending.pop_front() {
            pending.extend(self.apply(next));
        }
    }
}

fn display_order(a: &IndexNode, b: &IndexNode) -> CmpOrdering {
    b.is_dir
        .cmp(&a.is_dir)
        .then_with(|| a.name().cmp(b.name()))
}

fn stat(root: &Path, path: &TreePath) -> io::Result<NodeMeta> {
    let meta = std::fs::symlink_metadata(path.to_disk(root))?;
    Ok(NodeMeta::from_fs(&meta))
}

fn read_children(root: &Path, dir: &TreePath) -> io::Result<Vec<(String, NodeMeta)>> {
    let mut out = Vec::new();
    for item in std::fs::read_dir(dir.to_disk(root))? {
        let item = item?;
        let name = match item.file_name().into_string() {
            Ok(name) => name,
            Err(raw) => {
                tracing::debug!(%dir, "skipping non-unicode name {:?}", raw);
                continue;
            }
        };
        match std::fs::symlink_metadata(item.path()) {
            Ok(meta) => out.push((name, NodeMeta::from_fs(&meta))),
            Err(e) => tracing::debug!(%dir, name, "skipping entry: {}", e),
        }
    }
    Ok(out)
}

/// Insert any missing ancestors of `path` as unlisted directories.
fn ensure_ancestors(tree: &mut Tree, path: &TreePath, followups: &mut Vec<IndexEvent>) {
    let mut missing = Vec::new();
    let mut cursor = path.parent();
    while let Some(dir) = cursor {
        if tree.contains_key(&dir) {
            break;
        }
        cursor = dir.parent();
        missing.push(dir);
    }

    for dir in missing.into_iter().rev() {
        link_to_parent(tree, &dir);
        tree.insert(dir.clone(), Entry::new(dir.clone(), NodeMeta::unknown_dir()));
        followups.push(IndexEvent::Modified(dir));
    }
}

fn link_to_parent(tree: &mut Tree, path: &TreePath) {
    if let Some(parent) = path.parent() {
        if let Some(parent_entry) = tree.get_mut(&parent) {
            parent_entry.children.insert(path.name().to_string());
        }
    }
}

fn unlink_from_parent(tree: &mut Tree, path: &TreePath) {
    if let Some(parent) = path.parent() {
        if let Some(parent_entry) = tree.get_mut(&parent) {
            parent_entry.children.remove(path.name());
        }
    }
}

fn insert_fresh(tree: &mut Tree, path: &TreePath, meta: NodeMeta, followups: &mut Vec<IndexEvent>) {
    ensure_ancestors(tree, path, followups);
    link_to_parent(tree, path);
    tree.insert(path.clone(), Entry::new(path.clone(), meta));
    if meta.is_dir {
        followups.push(IndexEvent::Relist(path.clone()));
    }
}

fn upsert(tree: &mut Tree, path: &TreePath, meta: NodeMeta, followups: &mut Vec<IndexEvent>) {
    match tree.get_mut(path) {
        Some(entry) if entry.node.is_dir == meta.is_dir => {
            entry.refresh(meta);
            if meta.is_dir {
                followups.push(IndexEvent::Relist(path.clone()));
            }
        }
        Some(_) => {
            // replaced by a node of the other kind
            if path.is_root() {
                return;
            }
            detach_subtree(tree, path);
            insert_fresh(tree, path, meta, followups);
        }
        None => insert_fresh(tree, path, meta, followups),
    }
}

fn remove(tree: &mut Tree, path: &TreePath) {
    if path.is_root() {
        tracing::warn!("served root reported as removed; clearing index contents");
        let names: Vec<String> = tree
            .get(path)
            .map(|e| e.children.iter().cloned().collect())
            .unwrap_or_default();
        for name in names {
            detach_subtree(tree, &path.child(&name));
        }
        return;
    }
    detach_subtree(tree, path);
}

/// Remove `path` and every descendant, returning the removed entries.
fn detach_subtree(tree: &mut Tree, path: &TreePath) -> Vec<Entry> {
    let mut removed = Vec::new();
    if !tree.contains_key(path) {
        return removed;
    }
    unlink_from_parent(tree, path);

    let mut stack = vec![path.clone()];
    while let Some(current) = stack.pop() {
        if let Some(entry) = tree.remove(&current) {
            stack.extend(entry.children.iter().map(|name| current.child(name)));
            removed.push(entry);
        }
    }
    removed
}

fn rename(
    tree: &mut Tree,
    from: &TreePath,
    to: &TreePath,
    meta: Option<NodeMeta>,
    followups: &mut Vec<IndexEvent>,
) {
    if from == to || to.is_root() {
        return;
    }
    if from.is_root() || to.starts_with(from) {
        tracing::warn!(%from, %to, "ignoring rename into itself");
        return;
    }

    let moved = detach_subtree(tree, from);
    let Some(meta) = meta else {
        // destination already gone again; the source is gone either way
        detach_subtree(tree, to);
        return;
    };

    if moved.is_empty() {
        // never tracked the source; treat as a plain create
        upsert(tree, to, meta, followups);
        return;
    }

    detach_subtree(tree, to);
    ensure_ancestors(tree, to, followups);
    link_to_parent(tree, to);
    for mut entry in moved {
        let Some(new_path) = entry.node.path.rebase(from, to) else {
            continue;
        };
        entry.node.path = new_path.clone();
        tree.insert(new_path, entry);
    }

    if let Some(entry) = tree.get_mut(to) {
        if entry.node.is_dir == meta.is_dir {
            entry.refresh(meta);
        }
    }
}

fn relist(
    tree: &mut Tree,
    dir: &TreePath,
    children: Vec<(String, NodeMeta)>,
    followups: &mut Vec<IndexEvent>,
) {
    let known: BTreeSet<String> = match tree.get(dir) {
        Some(entry) if entry.node.is_dir => entry.children.clone(),
        _ => return,
    };
    let on_disk: BTreeSet<String> = children.iter().map(|(name, _)| name.clone()).collect();

    for gone in known.difference(&on_disk) {
        detach_subtree(tree, &dir.child(gone));
    }

    for (name, meta) in children {
        let child = dir.child(&name);
        match tree.get_mut(&child) {
            Some(entry) if entry.node.is_dir == meta.is_dir => entry.refresh(meta),
            Some(_) => {
                detach_subtree(tree, &child);
                insert_fresh(tree, &child, meta, followups);
            }
            None => insert_fresh(tree, &child, meta, followups),
        }
    }

    if let Some(entry) = tree.get_mut(dir) {
        entry.children = on_disk;
        entry.listed = true;
    }
}

/// Lazy, permission-confined search over the index.
///
/// Each step takes the read lock briefly, so a long-running consumer never
/// holds up the writer.
pub struct Search {
    index: FileIndex,
    needles: Vec<String>,
    stack: Vec<TreePath>,
    base: Option<TreePath>,
}

impl Search {
    /// Match and report paths relative to `base` instead of the tree root.
    pub fn relative_to(mut self, base: TreePath) -> Self {
        self.base = Some(base);
        self
    }

    fn matches(&self, path: &TreePath) -> bool {
        let haystack = path.as_str().to_lowercase();
        let name = path.name().to_lowercase();
        self.needles.iter().all(|n| haystack.contains(n.as_str()))
            && self.needles.iter().any(|n| name.contains(n.as_str()))
    }
}

impl Iterator for Search {
    type Item = SearchHit;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(path) = self.stack.pop() {
            let is_dir = {
                let tree = self.index.shared.tree.read();
                let Some(entry) = tree.get(&path) else {
                    continue;
                };
                let mut children: Vec<&IndexNode> = entry
                    .children
                    .iter()
                    .filter_map(|name| tree.get(&path.child(name)))
                    .map(|e| &e.node)
                    .collect();
                children.sort_by(|a, b| display_order(a, b));
                self.stack
                    .extend(children.into_iter().rev().map(|n| n.path.clone()));
                entry.node.is_dir
            };

            let shown = match &self.base {
                Some(base) => match path.rebase(base, &TreePath::root()) {
                    Some(shown) => shown,
                    None => continue,
                },
                None => path,
            };
            if !shown.is_root() && self.matches(&shown) {
                return Some(SearchHit { path: shown, is_dir });
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;

    fn t(raw: &str) -> TreePath {
        TreePath::parse(raw).unwrap()
    }

    fn names(index: &FileIndex, dir: &str) -> Vec<String> {
        index
            .list(&t(dir))
            .unwrap_or_default()
            .into_iter()
            .map(|n| n.name().to_string())
            .collect()
    }

    fn setup() -> (TempDir, FileIndex) {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("x")).unwrap();
        fs::create_dir_all(dir.path().join("public/reports")).unwrap();
        fs::create_dir_all(dir.path().join("private")).unwrap();
        fs::write(dir.path().join("public/reports/report-2023.pdf"), b"a").unwrap();
        fs::write(dir.path().join("public/annual report.txt"), b"bb").unwrap();
        fs::write(dir.path().join("private/report-secret.pdf"), b"ccc").unwrap();
        let index = FileIndex::scan(dir.path()).unwrap();
        (dir, index)
    }

    #[test]
    fn test_scan_mirrors_disk() {
        let (_dir, index) = setup();
        assert_eq!(names(&index, "/"), vec!["private", "public", "x"]);
        assert_eq!(names(&index, "/public"), vec!["reports", "annual report.txt"]);
        let node = index.get(&t("/private/report-secret.pdf")).unwrap();
        assert!(!node.is_dir);
        assert_eq!(node.size, 3);
        assert!(node.modified.is_some());
        assert!(index.list(&t("/private/report-secret.pdf")).is_none());
    }

    #[test]
    fn test_created_then_removed() {
        let (dir, index) = setup();
        fs::write(dir.path().join("x/y.txt"), b"hello").unwrap();
        index.apply_all(IndexEvent::Created(t("/x/y.txt")));
        assert_eq!(names(&index, "/x"), vec!["y.txt"]);
        assert_eq!(index.get(&t("/x/y.txt")).unwrap().size, 5);

        fs::remove_file(dir.path().join("x/y.txt")).unwrap();
        index.apply_all(IndexEvent::Removed(t("/x/y.txt")));
        assert!(names(&index, "/x").is_empty());
        assert!(!index.contains(&t("/x/y.txt")));
    }

    #[test]
    fn test_modified_refreshes_size() {
        let (dir, index) = setup();
        fs::write(dir.path().join("public/annual report.txt"), b"much longer").unwrap();
        index.apply_all(IndexEvent::Modified(t("/public/annual report.txt")));
        assert_eq!(index.get(&t("/public/annual report.txt")).unwrap().size, 11);
    }

    #[test]
    fn test_created_for_vanished_path_removes_it() {
        let (_dir, index) = setup();
        index.apply_all(IndexEvent::Created(t("/x/ghost.txt")));
        assert!(!index.contains(&t("/x/ghost.txt")));
    }

    #[test]
    fn test_removed_directory_drops_subtree() {
        let (dir, index) = setup();
        fs::remove_dir_all(dir.path().join("public")).unwrap();
        index.apply_all(IndexEvent::Removed(t("/public")));
        assert!(!index.contains(&t("/public")));
        assert!(!index.contains(&t("/public/reports")));
        assert!(!index.contains(&t("/public/reports/report-2023.pdf")));
        assert_eq!(names(&index, "/"), vec!["private", "x"]);
    }

    #[test]
    fn test_rename_file() {
        let (dir, index) = setup();
        fs::write(dir.path().join("x/a"), b"1").unwrap();
        index.apply_all(IndexEvent::Created(t("/x/a")));
        fs::rename(dir.path().join("x/a"), dir.path().join("x/b")).unwrap();
        index.apply_all(IndexEvent::Renamed {
            from: t("/x/a"),
            to: t("/x/b"),
        });
        assert_eq!(names(&index, "/x"), vec!["b"]);
    }

    #[test]
    fn test_rename_directory_moves_subtree() {
        let (dir, index) = setup();
        fs::rename(dir.path().join("public"), dir.path().join("x/moved")).unwrap();
        index.apply_all(IndexEvent::Renamed {
            from: t("/public"),
            to: t("/x/moved"),
        });
        assert!(!index.contains(&t("/public")));
        assert!(index.contains(&t("/x/moved/reports/report-2023.pdf")));
        assert_eq!(names(&index, "/x/moved"), vec!["reports", "annual report.txt"]);
    }

    #[test]
    fn test_created_directory_is_relisted_by_followup() {
        let (dir, index) = setup();
        fs::create_dir_all(dir.path().join("x/new/deeper")).unwrap();
        fs::write(dir.path().join("x/new/deeper/file.txt"), b"z").unwrap();

        let followups = index.apply(IndexEvent::Created(t("/x/new")));
        assert_eq!(followups, vec![IndexEvent::Relist(t("/x/new"))]);
        // before the follow-up runs, listing falls back to the disk
        assert_eq!(names(&index, "/x/new"), vec!["deeper"]);
        assert!(!index.contains(&t("/x/new/deeper")));

        for event in followups {
            index.apply_all(event);
        }
        assert!(index.contains(&t("/x/new/deeper/file.txt")));
    }

    #[test]
    fn test_vanished_unlisted_directory_is_not_listed() {
        let (dir, index) = setup();
        fs::create_dir_all(dir.path().join("x/brief")).unwrap();
        let _followups = index.apply(IndexEvent::Created(t("/x/brief")));
        fs::remove_dir(dir.path().join("x/brief")).unwrap();

        assert!(index.contains(&t("/x/brief")));
        assert_eq!(index.list(&t("/x/brief")), None);
    }

    #[test]
    fn test_missing_ancestors_are_created() {
        let (dir, index) = setup();
        fs::create_dir_all(dir.path().join("a/b")).unwrap();
        fs::write(dir.path().join("a/b/c.txt"), b"c").unwrap();
        index.apply_all(IndexEvent::Created(t("/a/b/c.txt")));
        assert!(index.get(&t("/a")).unwrap().is_dir);
        assert_eq!(names(&index, "/a/b"), vec!["c.txt"]);
    }

    #[test]
    fn test_rename_is_atomic_for_readers() {
        let (dir, index) = setup();
        fs::write(dir.path().join("x/a"), b"1").unwrap();
        index.apply_all(IndexEvent::Created(t("/x/a")));

        let stop = Arc::new(AtomicBool::new(false));
        let readers: Vec<_> = (0..4)
            .map(|_| {
                let index = index.clone();
                let stop = stop.clone();
                std::thread::spawn(move || {
                    while !stop.load(Ordering::Relaxed) {
                        let seen = names(&index, "/x");
                        assert_eq!(seen.len(), 1, "observed {:?}", seen);
                        assert!(seen[0] == "a" || seen[0] == "b");
                    }
                })
            })
            .collect();

        let (mut from, mut to) = ("a", "b");
        for _ in 0..200 {
            fs::rename(dir.path().join("x").join(from), dir.path().join("x").join(to)).unwrap();
            index.apply_all(IndexEvent::Renamed {
                from: t(&format!("/x/{}", from)),
                to: t(&format!("/x/{}", to)),
            });
            std::mem::swap(&mut from, &mut to);
        }

        stop.store(true, Ordering::Relaxed);
        for reader in readers {
            reader.join().unwrap();
        }
    }

    #[test]
    fn test_search_is_confined_to_visible_roots() {
        let (_dir, index) = setup();
        let hits: Vec<SearchHit> = index.search("report", &[t("/public")]).collect();
        assert!(!hits.is_empty());
        assert!(hits.iter().all(|h| h.path.starts_with(&t("/public"))));
        assert!(!hits.iter().any(|h| h.path == t("/private/report-secret.pdf")));
    }

    #[test]
    fn test_search_order_and_case() {
        let (_dir, index) = setup();
        let hits: Vec<String> = index
            .search("REPORT", &[TreePath::root()])
            .map(|h| h.path.to_string())
            .collect();
        assert_eq!(
            hits,
            vec![
                "/private/report-secret.pdf",
                "/public/reports",
                "/public/reports/report-2023.pdf",
                "/public/annual report.txt",
            ]
        );
    }

    #[test]
    fn test_search_tokens_and_nested_roots() {
        let (_dir, index) = setup();
        let hits: Vec<String> = index
            .search("public 2023", &[t("/public"), t("/public/reports"), t("/missing")])
            .map(|h| h.path.to_string())
            .collect();
        assert_eq!(hits, vec!["/public/reports/report-2023.pdf"]);

        assert_eq!(index.search("   ", &[TreePath::root()]).count(), 0);
        assert_eq!(index.search("report", &[]).count(), 0);
    }

    #[test]
    fn test_degraded_flag_is_sticky() {
        let (_dir, index) = setup();
        assert!(!index.is_degraded());
        index.mark_degraded("watcher stopped");
        index.mark_degraded("again");
        assert!(index.is_degraded());
    }
}
