//! Resource resolution.
//!
//! Resources are re-resolved on every request: existence and size are never
//! cached, so a file replaced on disk is picked up immediately.

use seekgate_common::paths::{guess_content_type, resolve_under_root};
use seekgate_common::{Error, Result};
use std::path::{Path, PathBuf};

/// A servable file under the resource root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceHandle {
    /// Logical name as it appeared in the URL.
    pub name: String,
    /// Resolved location on disk.
    pub path: PathBuf,
    /// Total size in bytes at resolution time.
    pub size: u64,
    pub content_type: &'static str,
}

/// Locate `name` under `root`.
///
/// Any name that is not a plain file name, that does not exist, that is not a
/// regular file, or whose canonical location escapes `root` (e.g. through a
/// symlink) is reported as [`Error::NotFound`].
pub async fn resolve(root: &Path, name: &str) -> Result<ResourceHandle> {
    let not_found = || Error::not_found(name);

    let candidate = resolve_under_root(root, name).ok_or_else(not_found)?;

    let canonical_root = tokio::fs::canonicalize(root).await.map_err(|e| {
        tracing::warn!("Resource root {} unavailable: {e}", root.display());
        not_found()
    })?;
    let canonical = tokio::fs::canonicalize(&candidate)
        .await
        .map_err(|_| not_found())?;
    if !canonical.starts_with(&canonical_root) {
        tracing::warn!(resource = %name, "Resource resolves outside the root");
        return Err(not_found());
    }

    let metadata = tokio::fs::metadata(&canonical)
        .await
        .map_err(|_| not_found())?;
    if !metadata.is_file() {
        return Err(not_found());
    }

    Ok(ResourceHandle {
        name: name.to_string(),
        path: canonical,
        size: metadata.len(),
        content_type: guess_content_type(name),
    })
}
