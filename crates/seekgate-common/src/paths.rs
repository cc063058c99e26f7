//! Path utilities for resolving resource names and guessing content types.
//!
//! A resource name arrives as a single URL path segment. It must never be
//! treated as a sequence of path components, so anything that could address a
//! parent or sibling directory is refused before the filesystem is touched.

use std::path::{Component, Path, PathBuf};

/// Check whether a resource name is a single, plain file name.
///
/// # Examples
///
/// ```
/// use seekgate_common::paths::is_safe_resource_name;
///
/// assert!(is_safe_resource_name("movie.mp4"));
/// assert!(!is_safe_resource_name(".."));
/// assert!(!is_safe_resource_name("a/b.mp4"));
/// assert!(!is_safe_resource_name("..\\boot.ini"));
/// ```
pub fn is_safe_resource_name(name: &str) -> bool {
    if name.is_empty()
        || name.contains('/')
        || name.contains('\\')
        || name.contains('\0')
        || name.starts_with('.')
    {
        return false;
    }

    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

/// Join a resource name onto the root, refusing anything that is not a
/// plain file name.
pub fn resolve_under_root(root: &Path, name: &str) -> Option<PathBuf> {
    if !is_safe_resource_name(name) {
        return None;
    }
    Some(root.join(name))
}

/// Guess the MIME type from the file extension.
///
/// # Examples
///
/// ```
/// use seekgate_common::paths::guess_content_type;
///
/// assert_eq!(guess_content_type("clip.MP4"), "video/mp4");
/// assert_eq!(guess_content_type("notes.bin"), "application/octet-stream");
/// ```
pub fn guess_content_type(file_name: &str) -> &'static str {
    let ext = Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "mp4" | "m4v" => "video/mp4",
        "mkv" => "video/x-matroska",
        "webm" => "video/webm",
        "avi" => "video/x-msvideo",
        "mov" => "video/quicktime",
        "ts" | "m2ts" => "video/mp2t",
        "ogv" => "video/ogg",
        "m4a" => "audio/mp4",
        "mp3" => "audio/mpeg",
        _ => "application/octet-stream",
    }
}
