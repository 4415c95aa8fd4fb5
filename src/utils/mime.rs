//! Content-Type detection for files served by the dev server.

use std::path::Path;

/// MIME types the server names explicitly.
pub mod types {
    pub const HTML: &str = "text/html; charset=utf-8";
    pub const PLAIN: &str = "text/plain; charset=utf-8";
    pub const CSS: &str = "text/css; charset=utf-8";
    pub const JAVASCRIPT: &str = "application/javascript";
    pub const GZIP: &str = "application/gzip";
    pub const OCTET_STREAM: &str = "application/octet-stream";
}

/// Extension (lowercase) → MIME type, for everything not in [`types`].
const BY_EXTENSION: &[(&[&str], &str)] = &[
    (&["json", "map"], "application/json"),
    (&["xml"], "application/xml"),
    (&["md", "markdown"], "text/markdown; charset=utf-8"),
    (&["csv"], "text/csv; charset=utf-8"),
    (&["yaml", "yml"], "text/yaml; charset=utf-8"),
    (&["rss"], "application/rss+xml"),
    (&["pdf"], "application/pdf"),
    (&["wasm"], "application/wasm"),
    (&["zip"], "application/zip"),
    (&["svg"], "image/svg+xml"),
    (&["png"], "image/png"),
    (&["jpg", "jpeg"], "image/jpeg"),
    (&["gif"], "image/gif"),
    (&["webp"], "image/webp"),
    (&["avif"], "image/avif"),
    (&["ico"], "image/x-icon"),
    (&["mp4"], "video/mp4"),
    (&["webm"], "video/webm"),
    (&["mp3"], "audio/mpeg"),
    (&["woff"], "font/woff"),
    (&["woff2"], "font/woff2"),
    (&["ttf"], "font/ttf"),
    (&["otf"], "font/otf"),
];

/// Content-Type for `path`, judged by extension only.
///
/// Scripts and gzip archives are pinned so browsers never refuse them over a
/// platform-specific guess; anything unknown is opaque binary.
pub fn from_path(path: &Path) -> &'static str {
    let Some(ext) = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
    else {
        return types::OCTET_STREAM;
    };

    match ext.as_str() {
        "html" | "htm" => types::HTML,
        "txt" => types::PLAIN,
        "css" => types::CSS,
        "js" | "mjs" | "cjs" => types::JAVASCRIPT,
        "gz" | "tgz" => types::GZIP,
        ext => BY_EXTENSION
            .iter()
            .find(|(exts, _)| exts.contains(&ext))
            .map_or(types::OCTET_STREAM, |(_, mime)| mime),
    }
}
