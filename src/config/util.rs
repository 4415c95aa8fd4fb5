//! Configuration utility functions.

use std::path::{Path, PathBuf};

/// Path component of a URL, without surrounding slashes.
///
/// Returns `None` if the URL does not parse.
///
/// # Examples
/// ```ignore
/// extract_url_path("https://example.github.io/my-project/") -> Some("my-project")
/// extract_url_path("https://example.com:8080/a/b?q=1")    -> Some("a/b")
/// extract_url_path("https://example.com")                 -> Some("")
/// extract_url_path("invalid")                             -> None
/// ```
pub fn extract_url_path(url_str: &str) -> Option<String> {
    let parsed = url::Url::parse(url_str).ok()?;
    Some(parsed.path().trim_matches('/').to_string())
}

/// Find `config_name` in `start` or the nearest ancestor that has it.
///
/// ```text
/// /home/user/handbook/docs/guide/   ← start
/// /home/user/handbook/docsmith.toml ← found
/// ```
pub fn find_config_file(start: &Path, config_name: &Path) -> Option<PathBuf> {
    if config_name.is_absolute() {
        return config_name.is_file().then(|| config_name.to_path_buf());
    }

    start
        .ancestors()
        .map(|dir| dir.join(config_name))
        .find(|candidate| candidate.is_file())
}
