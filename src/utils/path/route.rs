//! URL path utilities for the dev server.

use std::borrow::Cow;

use percent_encoding::{AsciiSet, CONTROLS, percent_decode_str, utf8_percent_encode};

/// Characters escaped when a path is echoed back in a `Location` header.
const PATH_ESCAPE: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Request target → decoded path, without query string or fragment.
///
/// Invalid UTF-8 sequences are replaced rather than rejected.
pub fn decode_request_path(url: &str) -> String {
    let raw = url.split(['?', '#']).next().unwrap_or(url);
    percent_decode_str(raw).decode_utf8_lossy().into_owned()
}

/// Percent-encode a decoded URL path for use in a header.
pub fn quote_path(path: &str) -> Cow<'_, str> {
    utf8_percent_encode(path, PATH_ESCAPE).into()
}

/// Fold `.`, `..` and empty segments of a relative URL path.
///
/// The result is relative and can never climb above its root:
/// `"../../etc/passwd"` becomes `"etc/passwd"`.
///
/// # Examples
/// ```ignore
/// assert_eq!(normalize_rel_path("a/./b/../c"), "a/c");
/// assert_eq!(normalize_rel_path("../../etc/passwd"), "etc/passwd");
/// ```
pub fn normalize_rel_path(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }
    segments.join("/")
}

/// Ensure a mount path starts and ends with a slash.
///
/// # Examples
/// ```ignore
/// assert_eq!(normalize_mount_path(""), "/");
/// assert_eq!(normalize_mount_path("docs"), "/docs/");
/// assert_eq!(normalize_mount_path("/docs/"), "/docs/");
/// ```
pub fn normalize_mount_path(mount_path: &str) -> String {
    let trimmed = mount_path.trim_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        format!("/{trimmed}/")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_request_path() {
        assert_eq!(decode_request_path("/a%20b/?x=1"), "/a b/");
        assert_eq!(decode_request_path("/caf%C3%A9.html#top"), "/café.html");
        assert_eq!(decode_request_path("/plain"), "/plain");
    }

    #[test]
    fn test_quote_path() {
        assert_eq!(quote_path("/a b/"), "/a%20b/");
        assert_eq!(quote_path("/docs/"), "/docs/");
        assert_eq!(quote_path("/café/"), "/caf%C3%A9/");
    }

    #[test]
    fn test_normalize_rel_path() {
        assert_eq!(normalize_rel_path("a/./b/../c"), "a/c");
        assert_eq!(normalize_rel_path("../../etc/passwd"), "etc/passwd");
        assert_eq!(normalize_rel_path("a//b/"), "a/b");
        assert_eq!(normalize_rel_path(""), "");
        assert_eq!(normalize_rel_path(".."), "");
    }

    #[test]
    fn test_normalize_mount_path() {
        assert_eq!(normalize_mount_path(""), "/");
        assert_eq!(normalize_mount_path("/"), "/");
        assert_eq!(normalize_mount_path("docs"), "/docs/");
        assert_eq!(normalize_mount_path("/docs"), "/docs/");
        assert_eq!(normalize_mount_path("/a/b/"), "/a/b/");
    }
}
