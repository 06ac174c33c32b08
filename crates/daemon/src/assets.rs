use std::borrow::Cow;
use std::io;
use std::path::{Path, PathBuf};

use rust_embed::RustEmbed;

use common::prelude::{AssetSource, DirSource, OverlayFs, TreePath};

/// The UI bundled into the binary. Always the last overlay layer.
#[derive(RustEmbed)]
#[folder = "static"]
struct StaticAssets;

#[derive(Debug, Clone, Copy, Default)]
pub struct EmbeddedAssets;

impl AssetSource for EmbeddedAssets {
    fn name(&self) -> &str {
        "embedded"
    }

    fn read(&self, path: &TreePath) -> io::Result<Option<Cow<'static, [u8]>>> {
        let key = path.as_str().trim_start_matches('/');
        Ok(StaticAssets::get(key).map(|file| file.data))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AssetsError {
    #[error("theme directory {0} does not exist")]
    MissingTheme(PathBuf),
    #[error("www directory {0} does not exist")]
    MissingWww(PathBuf),
}

fn require_dir(dir: &Path, err: fn(PathBuf) -> AssetsError) -> Result<(), AssetsError> {
    if dir.is_dir() {
        Ok(())
    } else {
        Err(err(dir.to_path_buf()))
    }
}

/// Stack the asset sources: themes in the given order, then the loose
/// asset directory, then the embedded bundle. Every configured directory
/// must exist.
pub fn build_overlay(
    themes: &[PathBuf],
    www_dir: Option<&PathBuf>,
) -> Result<OverlayFs, AssetsError> {
    let mut overlay = OverlayFs::new();

    for dir in themes {
        require_dir(dir, AssetsError::MissingTheme)?;
        let name = dir
            .file_name()
            .map(|n| format!("theme:{}", n.to_string_lossy()))
            .unwrap_or_else(|| "theme".to_string());
        overlay = overlay.with_source(DirSource::new(name, dir));
    }

    if let Some(www) = www_dir {
        require_dir(www, AssetsError::MissingWww)?;
        overlay = overlay.with_source(DirSource::new("www", www));
    }

    let overlay = overlay.with_source(EmbeddedAssets);
    tracing::info!(sources = ?overlay.source_names(), "asset overlay ready");
    Ok(overlay)
}
