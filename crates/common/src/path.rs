//! Normalized absolute paths within the served tree.
//!
//! Every path that crosses a trust boundary (request URLs, grant prefixes,
//! share targets, asset names) is parsed into a [`TreePath`] before it is used.
//! Parsing resolves `.` and `..` lexically and clamps at the root, so a
//! `TreePath` can always be joined onto an on-disk root without escaping it.

use std::fmt;
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};

/// A normalized, absolute, `/`-separated path inside the served tree.
///
/// The root is `"/"`; every other value starts with `/` and has no trailing
/// slash, no empty segments, and no `.` or `..` segments.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TreePath(String);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PathError {
    #[error("path contains a NUL byte")]
    Nul,
    #[error("path is not valid unicode: {0}")]
    NotUnicode(String),
    #[error("path {0} is not inside {1}")]
    NotInside(String, String),
}

impl TreePath {
    pub fn root() -> Self {
        Self("/".to_string())
    }

    /// Normalize a raw path. Relative input is treated as relative to the
    /// root, and `..` above the root is dropped.
    pub fn parse(raw: &str) -> Result<Self, PathError> {
        if raw.contains('\0') {
            return Err(PathError::Nul);
        }

        let mut segments: Vec<&str> = Vec::new();
        for part in raw.split('/') {
            match part {
                "" | "." => {}
                ".." => {
                    segments.pop();
                }
                other => segments.push(other),
            }
        }

        if segments.is_empty() {
            return Ok(Self::root());
        }
        Ok(Self(format!("/{}", segments.join("/"))))
    }

    /// Map an on-disk path below `root` into the tree.
    pub fn from_disk(root: &Path, disk: &Path) -> Result<Self, PathError> {
        let relative = disk.strip_prefix(root).map_err(|_| {
            PathError::NotInside(disk.display().to_string(), root.display().to_string())
        })?;

        let mut segments = Vec::new();
        for component in relative.components() {
            match component {
                Component::Normal(part) => segments.push(
                    part.to_str()
                        .ok_or_else(|| PathError::NotUnicode(part.to_string_lossy().into()))?,
                ),
                Component::CurDir => {}
                _ => {
                    return Err(PathError::NotInside(
                        disk.display().to_string(),
                        root.display().to_string(),
                    ))
                }
            }
        }

        Self::parse(&segments.join("/"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0 == "/"
    }

    /// Last segment, empty for the root.
    pub fn name(&self) -> &str {
        match self.0.rfind('/') {
            Some(idx) => &self.0[idx + 1..],
            None => "",
        }
    }

    pub fn parent(&self) -> Option<TreePath> {
        if self.is_root() {
            return None;
        }
        match self.0.rfind('/') {
            Some(0) => Some(Self::root()),
            Some(idx) => Some(Self(self.0[..idx].to_string())),
            None => None,
        }
    }

    /// Append a single child name. Names containing separators or dot
    /// segments are normalized like any other input.
    pub fn child(&self, name: &str) -> TreePath {
        self.join(name)
    }

    /// Append a relative path, normalizing the result. `..` in `rest` cannot
    /// climb above the root, but it can climb above `self`; callers that need
    /// confinement must check [`TreePath::starts_with`] afterwards.
    pub fn join(&self, rest: &str) -> TreePath {
        // a NUL in `rest` leaves the path unchanged
        Self::parse(&format!("{}/{}", self.0, rest)).unwrap_or_else(|_| self.clone())
    }

    /// True if `self` equals `base` or lies below it on a segment boundary.
    /// `"/foo"` does not start with `"/fo"`.
    pub fn starts_with(&self, base: &TreePath) -> bool {
        if base.is_root() || self.0 == base.0 {
            return true;
        }
        self.0.len() > base.0.len()
            && self.0.starts_with(&base.0)
            && self.0.as_bytes()[base.0.len()] == b'/'
    }

    /// Path of `self` relative to `base`, without a leading slash.
    pub fn strip_prefix(&self, base: &TreePath) -> Option<&str> {
        if !self.starts_with(base) {
            return None;
        }
        if base.is_root() {
            return Some(self.0.trim_start_matches('/'));
        }
        Some(self.0[base.0.len()..].trim_start_matches('/'))
    }

    /// Re-root `self` from `from` onto `to`; `None` if `self` is not below `from`.
    pub fn rebase(&self, from: &TreePath, to: &TreePath) -> Option<TreePath> {
        let rest = self.strip_prefix(from)?;
        if rest.is_empty() {
            return Some(to.clone());
        }
        Some(to.join(rest))
    }

    /// Resolve onto an on-disk root directory.
    pub fn to_disk(&self, root: &Path) -> PathBuf {
        let mut out = root.to_path_buf();
        for segment in self.0.split('/').filter(|s| !s.is_empty()) {
            out.push(segment);
        }
        out
    }
}

impl Default for TreePath {
    fn default() -> Self {
        Self::root()
    }
}

impl fmt::Display for TreePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for TreePath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for TreePath {
    type Error = PathError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl TryFrom<&str> for TreePath {
    type Error = PathError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<TreePath> for String {
    fn from(value: TreePath) -> Self {
        value.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(s: &str) -> TreePath {
        TreePath::parse(s).unwrap()
    }

    #[test]
    fn test_parse_normalizes() {
        assert_eq!(p("").as_str(), "/");
        assert_eq!(p("/").as_str(), "/");
        assert_eq!(p("a/b").as_str(), "/a/b");
        assert_eq!(p("//a///b/").as_str(), "/a/b");
        assert_eq!(p("/a/./b/../c").as_str(), "/a/c");
        assert_eq!(p("/docs/secret/../../etc").as_str(), "/etc");
        assert_eq!(p("/../../x").as_str(), "/x");
        assert!(TreePath::parse("/a\0b").is_err());
    }

    #[test]
    fn test_segment_boundary() {
        assert!(p("/foo").starts_with(&p("/foo")));
        assert!(p("/foo/bar").starts_with(&p("/foo")));
        assert!(!p("/foobar").starts_with(&p("/foo")));
        assert!(p("/anything").starts_with(&TreePath::root()));
        assert!(!p("/foo").starts_with(&p("/foo/bar")));
    }

    #[test]
    fn test_name_and_parent() {
        assert_eq!(p("/a/b.txt").name(), "b.txt");
        assert_eq!(p("/a/b.txt").parent(), Some(p("/a")));
        assert_eq!(p("/a").parent(), Some(TreePath::root()));
        assert_eq!(TreePath::root().parent(), None);
        assert_eq!(TreePath::root().name(), "");
    }

    #[test]
    fn test_rebase() {
        assert_eq!(p("/x/a/f").rebase(&p("/x/a"), &p("/x/b")), Some(p("/x/b/f")));
        assert_eq!(p("/x/a").rebase(&p("/x/a"), &p("/y")), Some(p("/y")));
        assert_eq!(p("/x/ab").rebase(&p("/x/a"), &p("/y")), None);
    }

    #[test]
    fn test_disk_round_trip() {
        let root = Path::new("/srv/files");
        let disk = p("/a/b").to_disk(root);
        assert_eq!(disk, PathBuf::from("/srv/files/a/b"));
        assert_eq!(TreePath::from_disk(root, &disk).unwrap(), p("/a/b"));
        assert_eq!(TreePath::from_disk(root, root).unwrap(), TreePath::root());
        assert!(TreePath::from_disk(root, Path::new("/etc/passwd")).is_err());
    }

    #[test]
    fn test_serde_normalizes() {
        let parsed: TreePath = serde_json::from_str("\"/a/../b/\"").unwrap();
        assert_eq!(parsed.as_str(), "/b");
        assert_eq!(serde_json::to_string(&parsed).unwrap(), "\"/b\"");
    }
}
