//! Filesystem path normalization.
//!
//! - `absolutize` - lexical absolute form (no symlink resolution)
//! - `resolve_path` - resolve relative paths against a base directory

use std::path::{Component, Path, PathBuf};

/// Make `path` absolute and fold `.` / `..` components lexically.
///
/// Unlike `canonicalize`, this works for paths that do not exist yet and
/// never follows symlinks, so the same input always maps to the same key.
///
/// # Example
/// ```ignore
/// let abs = absolutize(Path::new("./docs/../docs"));
/// assert_eq!(abs, std::env::current_dir()?.join("docs"));
/// ```
pub fn absolutize(path: &Path) -> PathBuf {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir().map_or_else(|_| path.to_path_buf(), |cwd| cwd.join(path))
    };

    let mut out = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                // Never climb above the root
                if !matches!(out.components().next_back(), Some(Component::RootDir) | None) {
                    out.pop();
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Resolve `path` against `base` unless it is already absolute.
#[inline]
pub fn resolve_path(path: &Path, base: &Path) -> PathBuf {
    if path.is_absolute() {
        absolutize(path)
    } else {
        absolutize(&base.join(path))
    }
}

/// Display `path` relative to the current directory when it lives under it.
pub fn relative_to_cwd(path: &Path) -> PathBuf {
    std::env::current_dir()
        .ok()
        .and_then(|cwd| path.strip_prefix(cwd).ok().map(Path::to_path_buf))
        .unwrap_or_else(|| path.to_path_buf())
}
