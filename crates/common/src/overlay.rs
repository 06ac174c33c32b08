//! Layered asset lookup for the UI.
//!
//! An [`OverlayFs`] is an ordered list of [`AssetSource`]s fixed at startup.
//! Lookups walk the list in order and the first source that has the asset
//! wins; sources are never merged. Operators drop a theme directory in front
//! of the embedded defaults to override individual files without repackaging.

use std::borrow::Cow;
use std::fmt;
use std::io;
use std::path::PathBuf;

use crate::path::TreePath;

/// A read-only provider of UI assets.
pub trait AssetSource: Send + Sync {
    /// Name used in logs to identify which layer served an asset.
    fn name(&self) -> &str;

    /// Read an asset. `Ok(None)` means this source does not have it.
    fn read(&self, path: &TreePath) -> io::Result<Option<Cow<'static, [u8]>>>;

    fn contains(&self, path: &TreePath) -> bool {
        matches!(self.read(path), Ok(Some(_)))
    }
}

/// An asset resolved through the overlay.
#[derive(Debug, Clone)]
pub struct Asset {
    /// Name of the source that served the asset
    pub source: String,
    pub path: TreePath,
    pub data: Cow<'static, [u8]>,
}

/// A plain directory on disk, e.g. a theme.
#[derive(Debug, Clone)]
pub struct DirSource {
    name: String,
    dir: PathBuf,
}

impl DirSource {
    pub fn new(name: impl Into<String>, dir: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            dir: dir.into(),
        }
    }
}

impl AssetSource for DirSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn read(&self, path: &TreePath) -> io::Result<Option<Cow<'static, [u8]>>> {
        if path.is_root() {
            return Ok(None);
        }
        let disk = path.to_disk(&self.dir);
        if !disk.is_file() {
            return Ok(None);
        }
        match std::fs::read(&disk) {
            Ok(bytes) => Ok(Some(Cow::Owned(bytes))),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// Ordered, first-match-wins stack of asset sources.
#[derive(Default)]
pub struct OverlayFs {
    sources: Vec<Box<dyn AssetSource>>,
}

impl fmt::Debug for OverlayFs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.sources.iter().map(|s| s.name()))
            .finish()
    }
}

impl OverlayFs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a source below every source already present.
    pub fn with_source(mut self, source: impl AssetSource + 'static) -> Self {
        self.sources.push(Box::new(source));
        self
    }

    pub fn source_names(&self) -> Vec<&str> {
        self.sources.iter().map(|s| s.name()).collect()
    }

    /// Resolve `path` against each source in order.
    ///
    /// A source that fails with an I/O error is logged and skipped so a
    /// broken theme directory cannot hide the defaults beneath it.
    pub fn open(&self, path: &TreePath) -> Option<Asset> {
        for source in &self.sources {
            match source.read(path) {
                Ok(Some(data)) => {
                    tracing::trace!(source = source.name(), %path, "asset resolved");
                    return Some(Asset {
                        source: source.name().to_string(),
                        path: path.clone(),
                        data,
                    });
                }
                Ok(None) => continue,
                Err(e) => {
                    tracing::warn!(source = source.name(), %path, "asset source failed: {}", e);
                }
            }
        }
        None
    }

    pub fn exists(&self, path: &TreePath) -> bool {
        self.sources.iter().any(|s| s.contains(path))
    }
}
