use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::state::{Credentials, CustomProvider};

#[derive(Debug, Clone)]
pub struct Config {
    // served tree
    /// directory exposed to users
    pub root: PathBuf,

    // http server configuration
    /// port for the HTTP server
    pub port: u16,
    /// path prefix the routes are mounted under, always starting and
    ///  ending with `/`
    pub base: String,
    /// maximum number of hits returned by a search request
    pub search_limit: usize,

    // ui assets, highest priority first
    /// resolved theme directories
    pub themes: Vec<PathBuf>,
    /// loose asset directory consulted after the themes
    pub www_dir: Option<PathBuf>,

    // identity
    /// active identity provider id
    pub auth: String,
    pub credentials: BTreeMap<String, Credentials>,
    pub custom_providers: Vec<CustomProvider>,
    /// external id of a user to promote to admin with a grant on `/`
    pub admin: Option<String>,

    // data store configuration
    /// a path to a sqlite database, if not set then an
    ///  in-memory database will be used
    pub sqlite_path: Option<PathBuf>,

    // logging
    pub log_level: tracing::Level,
    /// Directory for log files (optional, logs to stdout only if not set)
    pub log_dir: Option<PathBuf>,
}

/// Normalize a mount prefix to `/`, `/x/` or `/x/y/`.
pub fn normalize_base(raw: &str) -> String {
    let trimmed = raw.trim_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        format!("/{}/", trimmed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_base() {
        assert_eq!(normalize_base(""), "/");
        assert_eq!(normalize_base("/"), "/");
        assert_eq!(normalize_base("files"), "/files/");
        assert_eq!(normalize_base("/files/"), "/files/");
        assert_eq!(normalize_base("/a/b"), "/a/b/");
    }
}
