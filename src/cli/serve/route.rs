//! Request routing.
//!
//! - `/livereload/<epoch>/<id>` - long-poll for a newer site version
//! - `/` with a non-root mount - redirect to the mount path
//! - `<mount>/...` - static files from the built site

use std::fs::File;
use std::io::Read;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::PathBuf;
use std::sync::LazyLock;

use anyhow::Result;
use regex::Regex;

use super::Shared;
use super::content::inject_livereload;
use super::response::{Reply, error_reply};
use crate::reload::Epoch;
use crate::utils::mime;
use crate::utils::path::route::{decode_request_path, normalize_rel_path, quote_path};
use crate::{debug, log};

static POLL_PATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^/livereload/([0-9]+)/[0-9]+$").unwrap());

/// Poll ids remembered for the "browser connected" message before forgetting.
const MAX_SEEN_POLLS: usize = 1024;

/// Route a request. Never fails: faults become a 500, misses a 404.
pub(super) fn serve_request(shared: &Shared, url: &str, referer: Option<&str>) -> Reply {
    guarded(shared, url, || try_serve(shared, url, referer))
}

/// Run a handler, turning `Ok(None)` into a 404 and errors or panics into a 500.
pub(super) fn guarded(
    shared: &Shared,
    url: &str,
    handler: impl FnOnce() -> Result<Option<Reply>>,
) -> Reply {
    let outcome = catch_unwind(AssertUnwindSafe(handler));

    let status = match outcome {
        Ok(Ok(Some(reply))) => return reply,
        Ok(Ok(None)) => 404,
        Ok(Err(e)) => {
            log!("error"; "500 Internal Server Error: {} ({:#})", url, e);
            500
        }
        Err(_) => {
            log!("error"; "500 Internal Server Error: {} (handler panicked)", url);
            500
        }
    };

    error_reply(shared, status)
}

fn try_serve(shared: &Shared, url: &str, referer: Option<&str>) -> Result<Option<Reply>> {
    let path = decode_request_path(url);

    if let Some(epoch) = parse_poll(&path) {
        return Ok(Some(long_poll(shared, &path, epoch, referer)));
    }

    let Some(file_path) = resolve(shared, &path) else {
        if path == "/" {
            return Ok(Some(Reply::redirect(quote_path(&shared.mount_path))));
        }
        return Ok(None);
    };

    // Never serve a half-built site: wait out any rebuild in flight.
    let epoch = shared.gate.wait_converged();

    let file = File::open(&file_path)
        .ok()
        .filter(|f| f.metadata().is_ok_and(|m| m.is_file()));

    let Some(mut file) = file else {
        if !path.ends_with('/') && file_path.join("index.html").is_file() {
            return Ok(Some(Reply::redirect(format!("{}/", quote_path(&path)))));
        }
        return Ok(None);
    };

    let content_type = mime::from_path(&file_path);

    let is_html = file_path.extension().is_some_and(|e| e == "html");
    if is_html && shared.livereload() {
        let mut content = Vec::new();
        file.read_to_end(&mut content)?;
        let body = inject_livereload(&content, epoch, shared.clock.next());
        return Ok(Some(Reply::bytes(200, content_type, body)));
    }

    let len = file.metadata()?.len() as usize;
    Ok(Some(Reply::file(content_type, file, len)))
}

/// Epoch a browser last saw, for a well-formed long-poll path.
fn parse_poll(path: &str) -> Option<Epoch> {
    let caps = POLL_PATH.captures(path)?;
    caps[1].parse().ok().map(Epoch::new)
}

/// Map a URL path under the mount point to a file inside the site root.
///
/// `..` segments are folded before joining, so the result never leaves the
/// root.
fn resolve(shared: &Shared, path: &str) -> Option<PathBuf> {
    let mount = shared.mount_path.as_str();
    if !format!("{path}/").starts_with(mount) {
        return None;
    }

    let mut rel = path.get(mount.len()..).unwrap_or("").to_string();
    if path.ends_with('/') {
        rel.push_str("index.html");
    }

    Some(shared.root.join(normalize_rel_path(&rel)))
}

/// Hold the request until a newer site version is visible or the poll times out.
fn long_poll(shared: &Shared, request_id: &str, epoch: Epoch, referer: Option<&str>) -> Reply {
    let visible = shared.gate.visible();
    if visible > epoch {
        return Reply::plain(visible.to_string());
    }

    log_browser_connected(shared, request_id, referer);
    let visible = shared.gate.wait_newer_than(epoch, shared.poll_timeout);
    Reply::plain(visible.to_string())
}

/// Report each browser tab once, not on every poll.
fn log_browser_connected(shared: &Shared, request_id: &str, referer: Option<&str>) {
    let mut seen = shared.seen_polls.lock();
    if seen.contains(request_id) {
        debug!("serve"; "poll {}", request_id);
        return;
    }
    if seen.len() >= MAX_SEEN_POLLS {
        seen.clear();
    }
    seen.insert(request_id.to_string());
    log!("serve"; "browser connected: {}", referer.unwrap_or("-"));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_poll() {
        assert_eq!(parse_poll("/livereload/123/456"), Some(Epoch::new(123)));
        assert_eq!(parse_poll("/livereload/123/abc"), None);
        assert_eq!(parse_poll("/livereload/123"), None);
        assert_eq!(parse_poll("/livereload/123/456/extra"), None);
        assert_eq!(parse_poll("/livereload/99999999999999999999999/1"), None);
    }
}
