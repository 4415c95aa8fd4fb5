use std::fs;
use std::io::{Read, Write};
use std::net::TcpStream;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use clap::Parser;
use tempfile::TempDir;

use super::response::Reply;
use super::route::{guarded, serve_request};
use super::{ErrorHandler, LiveReloadServer, ServeOptions, site_builder};
use crate::cli::Cli;
use crate::config::SiteConfig;
use crate::reload::testing::ManualBackend;
use crate::reload::{Builder, ChangeEvent, Epoch};
use crate::utils::path::absolutize;

struct Site {
    temp: TempDir,
    backend: ManualBackend,
    server: LiveReloadServer,
}

impl Site {
    fn root(&self) -> std::path::PathBuf {
        self.temp.path().join("site")
    }

    fn docs(&self) -> std::path::PathBuf {
        absolutize(&self.temp.path().join("docs"))
    }

    fn write(&self, rel: &str, content: &str) {
        let path = self.root().join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn get(&self, url: &str) -> Reply {
        serve_request(&self.server.shared, url, None)
    }

    fn touch_docs(&self) {
        self.backend.fire(&ChangeEvent::file(self.docs().join("index.md")));
    }
}

fn site_with(builder: Builder, configure: impl FnOnce(&mut ServeOptions)) -> Site {
    let temp = TempDir::new().unwrap();
    fs::create_dir_all(temp.path().join("site")).unwrap();
    fs::create_dir_all(temp.path().join("docs")).unwrap();

    let mut options = ServeOptions::new(temp.path().join("site"));
    options.port = 0;
    options.build_delay = Duration::from_millis(50);
    options.shutdown_delay = Duration::from_millis(20);
    options.poll_timeout = Duration::from_millis(500);
    configure(&mut options);

    let backend = ManualBackend::new();
    let server = LiveReloadServer::with_backend(builder, options, Box::new(backend.clone()));
    Site {
        temp,
        backend,
        server,
    }
}

fn noop_builder() -> Builder {
    Arc::new(|| -> anyhow::Result<()> { Ok(()) })
}

fn site() -> Site {
    site_with(noop_builder(), |_| {})
}

fn body_text(reply: Reply) -> String {
    String::from_utf8(reply.read_body().unwrap()).unwrap()
}

/// Minimal HTTP/1.0 client: returns (status, raw headers, body).
fn http_get(addr: std::net::SocketAddr, path: &str) -> (u16, String, String) {
    let mut stream = TcpStream::connect(addr).unwrap();
    stream
        .set_read_timeout(Some(Duration::from_secs(10)))
        .unwrap();
    write!(stream, "GET {path} HTTP/1.0\r\n\r\n").unwrap();

    let mut raw = String::new();
    stream.read_to_string(&mut raw).unwrap();
    let (head, body) = raw.split_once("\r\n\r\n").unwrap();
    let status = head.split_whitespace().nth(1).unwrap().parse().unwrap();
    (status, head.to_string(), body.to_string())
}

fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < timeout {
        if cond() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    cond()
}

// ============================================================================
// Static files
// ============================================================================

#[test]
fn test_serves_file_with_type_and_length() {
    let site = site();
    site.write("css/style.css", "body{}");

    let reply = site.get("/css/style.css");
    assert_eq!(reply.status, 200);
    assert_eq!(reply.header("Content-Type"), Some("text/css; charset=utf-8"));
    assert_eq!(reply.header("Content-Length"), Some("6"));
    assert_eq!(body_text(reply), "body{}");
}

#[test]
fn test_script_content_type() {
    let site = site();
    site.write("app.js", "1");
    site.write("bundle.mjs", "1");
    site.write("archive.gz", "1");
    site.write("blob.unknownext", "1");

    assert_eq!(site.get("/app.js").header("Content-Type"), Some("application/javascript"));
    assert_eq!(site.get("/bundle.mjs").header("Content-Type"), Some("application/javascript"));
    assert_eq!(site.get("/archive.gz").header("Content-Type"), Some("application/gzip"));
    assert_eq!(
        site.get("/blob.unknownext").header("Content-Type"),
        Some("application/octet-stream")
    );
}

#[test]
fn test_trailing_slash_serves_index() {
    let site = site();
    site.write("guide/index.html", "<p>guide</p>");

    let reply = site.get("/guide/");
    assert_eq!(reply.status, 200);
    assert_eq!(body_text(reply), "<p>guide</p>");
}

#[test]
fn test_directory_without_slash_redirects() {
    let site = site();
    site.write("guide/index.html", "<p>guide</p>");

    let reply = site.get("/guide");
    assert_eq!(reply.status, 302);
    assert_eq!(reply.header("Location"), Some("/guide/"));
}

#[test]
fn test_redirect_location_is_quoted() {
    let site = site();
    site.write("my guide/index.html", "x");

    let reply = site.get("/my%20guide");
    assert_eq!(reply.status, 302);
    assert_eq!(reply.header("Location"), Some("/my%20guide/"));
}

#[test]
fn test_missing_file_is_404() {
    let site = site();
    let reply = site.get("/nope.html");
    assert_eq!(reply.status, 404);
    assert_eq!(reply.header("Content-Type"), Some("text/html; charset=utf-8"));
    assert_eq!(body_text(reply), "404 Not Found");
}

#[test]
fn test_path_traversal_stays_in_root() {
    let site = site();
    fs::write(site.temp.path().join("secret.txt"), "secret").unwrap();

    for url in ["/../secret.txt", "/../../etc/passwd", "/a/../../secret.txt", "/%2e%2e/secret.txt"] {
        let reply = site.get(url);
        assert_eq!(reply.status, 404, "{url}");
        assert!(!body_text(reply).contains("secret"));
    }
}

#[test]
fn test_traversal_folds_to_file_inside_root() {
    let site = site();
    site.write("etc/passwd", "inside");

    let reply = site.get("/../../etc/passwd");
    assert_eq!(reply.status, 200);
    assert_eq!(body_text(reply), "inside");
}

#[test]
fn test_query_string_ignored() {
    let site = site();
    site.write("page.html", "<p>x</p>");
    assert_eq!(site.get("/page.html?v=3").status, 200);
}

// ============================================================================
// Mount path
// ============================================================================

#[test]
fn test_root_redirects_to_mount() {
    let site = site_with(noop_builder(), |o| o.mount_path = "project".into());
    let reply = site.get("/");
    assert_eq!(reply.status, 302);
    assert_eq!(reply.header("Location"), Some("/project/"));
}

#[test]
fn test_mounted_site() {
    let site = site_with(noop_builder(), |o| o.mount_path = "/project/".into());
    site.write("index.html", "home");
    site.write("a.txt", "a");

    assert_eq!(body_text(site.get("/project/")), "home");
    assert_eq!(body_text(site.get("/project/a.txt")), "a");
    assert_eq!(site.get("/a.txt").status, 404);
    assert_eq!(site.get("/projectx/a.txt").status, 404);

    let reply = site.get("/project");
    assert_eq!(reply.status, 302);
    assert_eq!(reply.header("Location"), Some("/project/"));
}

// ============================================================================
// HTML injection
// ============================================================================

#[test]
fn test_html_injected_with_visible_epoch() {
    let site = site();
    site.server.watch(&site.docs(), true).unwrap();
    site.write("index.html", "<html><body>Hi</body></html>");

    let (visible, _) = site.server.epochs();
    let reply = site.get("/");
    assert_eq!(reply.status, 200);
    let len: usize = reply.header("Content-Length").unwrap().parse().unwrap();
    let html = body_text(reply);

    assert_eq!(len, html.len());
    assert!(html.starts_with("<html><body>Hi<script>"));
    assert!(html.ends_with("</script></body></html>"));
    assert!(html.contains(&format!("}})({visible}, ")));
}

#[test]
fn test_request_ids_differ_between_pages() {
    let site = site();
    site.server.watch(&site.docs(), true).unwrap();
    site.write("index.html", "<body></body>");

    let a = body_text(site.get("/"));
    let b = body_text(site.get("/"));
    assert_ne!(a, b);
}

#[test]
fn test_no_injection_without_watch() {
    let site = site();
    site.write("index.html", "<html><body>Hi</body></html>");
    assert_eq!(body_text(site.get("/")), "<html><body>Hi</body></html>");
}

#[test]
fn test_non_html_not_injected() {
    let site = site();
    site.server.watch(&site.docs(), true).unwrap();
    site.write("notes.txt", "</body>");
    assert_eq!(body_text(site.get("/notes.txt")), "</body>");
}

// ============================================================================
// Long-poll
// ============================================================================

#[test]
fn test_poll_older_epoch_returns_immediately() {
    let site = site();
    let (visible, _) = site.server.epochs();
    let old = Epoch::new(visible.get() - 2);

    let start = Instant::now();
    let reply = site.get(&format!("/livereload/{old}/1"));
    assert!(start.elapsed() < Duration::from_millis(400));
    assert_eq!(reply.status, 200);
    assert_eq!(reply.header("Content-Type"), Some("text/plain; charset=utf-8"));
    assert_eq!(body_text(reply), visible.to_string());
}

#[test]
fn test_poll_current_epoch_waits_for_timeout() {
    let site = site();
    let (visible, _) = site.server.epochs();

    let start = Instant::now();
    let reply = site.get(&format!("/livereload/{visible}/1"));
    assert!(start.elapsed() >= Duration::from_millis(450));
    assert_eq!(body_text(reply), visible.to_string());
}

#[test]
fn test_malformed_poll_is_404() {
    let site = site();
    assert_eq!(site.get("/livereload/abc/1").status, 404);
    assert_eq!(site.get("/livereload/1").status, 404);
}

// ============================================================================
// Error hook
// ============================================================================

#[test]
fn test_error_hook_overrides_body() {
    let site = site();
    let hook: ErrorHandler = Arc::new(|code: u16| -> anyhow::Result<Option<Vec<u8>>> {
        Ok((code == 404).then(|| b"custom".to_vec()))
    });
    site.server.set_error_handler(hook);

    assert_eq!(body_text(site.get("/missing")), "custom");
}

#[test]
fn test_failing_error_hook_falls_back() {
    let site = site();
    let hook: ErrorHandler = Arc::new(|_: u16| -> anyhow::Result<Option<Vec<u8>>> {
        anyhow::bail!("template missing")
    });
    site.server.set_error_handler(hook);

    let reply = site.get("/missing");
    assert_eq!(reply.status, 404);
    assert_eq!(body_text(reply), "404 Not Found");
}

#[test]
fn test_handler_error_is_500() {
    let site = site();
    let reply = guarded(&site.server.shared, "/broken.html", || {
        anyhow::bail!("disk went away")
    });
    assert_eq!(reply.status, 500);
    assert_eq!(reply.header("Content-Type"), Some("text/html; charset=utf-8"));
    assert_eq!(body_text(reply), "500 Internal Server Error");
}

#[test]
fn test_handler_panic_is_500() {
    let site = site();
    let reply = guarded(&site.server.shared, "/broken.html", || -> anyhow::Result<Option<Reply>> {
        panic!("handler bug")
    });
    assert_eq!(reply.status, 500);
    assert_eq!(body_text(reply), "500 Internal Server Error");
}

#[test]
fn test_error_hook_body_for_500() {
    let site = site();
    let hook: ErrorHandler = Arc::new(|code: u16| -> anyhow::Result<Option<Vec<u8>>> {
        Ok((code == 500).then(|| b"<h1>oops</h1>".to_vec()))
    });
    site.server.set_error_handler(hook);

    let reply = guarded(&site.server.shared, "/x", || anyhow::bail!("render failed"));
    assert_eq!(reply.status, 500);
    assert_eq!(body_text(reply), "<h1>oops</h1>");
}

#[test]
fn test_panicking_error_hook_falls_back() {
    let site = site();
    let hook: ErrorHandler = Arc::new(|_: u16| -> anyhow::Result<Option<Vec<u8>>> {
        panic!("hook bug")
    });
    site.server.set_error_handler(hook);

    let reply = site.get("/missing");
    assert_eq!(reply.status, 404);
    assert_eq!(body_text(reply), "404 Not Found");
}

#[test]
fn test_directory_named_like_page_is_404() {
    let site = site();
    site.server.watch(&site.docs(), true).unwrap();
    fs::create_dir_all(site.root().join("weird.html")).unwrap();
    assert_eq!(site.get("/weird.html").status, 404);
}

// ============================================================================
// Watch API
// ============================================================================

#[test]
fn test_watch_refcount_through_server() {
    let site = site();
    let docs = site.docs();

    site.server.watch(&docs, true).unwrap();
    site.server.watch(&docs, true).unwrap();
    site.server.unwatch(&docs).unwrap();
    assert!(site.server.is_watched(&docs));

    site.server.unwatch(&docs).unwrap();
    assert!(!site.server.is_watched(&docs));
    assert!(site.server.unwatch(&docs).is_err());
}

// ============================================================================
// End to end over sockets
// ============================================================================

#[test]
fn test_serve_over_socket_and_shutdown() {
    let site = site();
    site.write("index.html", "<p>hello</p>");
    site.server.serve().unwrap();
    let addr = site.server.bound_addr().unwrap();
    assert_ne!(addr.port(), 0);
    assert!(site.server.url().ends_with('/'));

    let (status, head, body) = http_get(addr, "/");
    assert_eq!(status, 200);
    assert!(head.to_ascii_lowercase().contains("content-length: 12"));
    assert_eq!(body, "<p>hello</p>");

    let (status, _, _) = http_get(addr, "/missing");
    assert_eq!(status, 404);

    let start = Instant::now();
    site.server.shutdown(true);
    assert!(start.elapsed() < Duration::from_secs(2));
    assert!(site.backend.is_stopped());
}

#[test]
fn test_bind_failure_propagates() {
    let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = taken.local_addr().unwrap().port();

    let site = site_with(noop_builder(), |o| o.port = port);
    assert!(site.server.serve().is_err());
}

#[test]
fn test_change_triggers_rebuild_and_poll_sees_it() {
    let builds = Arc::new(AtomicUsize::new(0));
    let counter = builds.clone();
    let site = site_with(
        Arc::new(move || -> anyhow::Result<()> {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }),
        |_| {},
    );
    site.server.watch(&site.docs(), true).unwrap();
    site.server.serve().unwrap();
    let addr = site.server.bound_addr().unwrap();
    let (before, _) = site.server.epochs();

    let poller = thread::spawn(move || http_get(addr, &format!("/livereload/{before}/42")));
    thread::sleep(Duration::from_millis(50));
    site.touch_docs();

    let (status, _, body) = poller.join().unwrap();
    assert_eq!(status, 200);
    let seen: u64 = body.trim().parse().unwrap();
    assert!(seen > before.get());
    assert_eq!(builds.load(Ordering::SeqCst), 1);
    assert_eq!(site.server.stats().rebuilds, 1);

    site.server.shutdown(true);
}

#[test]
fn test_request_during_rebuild_sees_new_content() {
    let temp_root = Arc::new(parking_lot::Mutex::new(None::<std::path::PathBuf>));
    let root_for_build = temp_root.clone();
    let site = site_with(
        Arc::new(move || -> anyhow::Result<()> {
            thread::sleep(Duration::from_millis(400));
            if let Some(root) = root_for_build.lock().as_ref() {
                fs::write(root.join("page.txt"), "new")?;
            }
            Ok(())
        }),
        |_| {},
    );
    *temp_root.lock() = Some(site.root());
    site.write("page.txt", "old");
    site.server.watch(&site.docs(), true).unwrap();
    site.server.serve().unwrap();
    let addr = site.server.bound_addr().unwrap();

    site.touch_docs();
    assert!(wait_until(Duration::from_secs(5), || {
        let (visible, wanted) = site.server.epochs();
        wanted > visible
    }));

    let (status, _, body) = http_get(addr, "/page.txt");
    assert_eq!(status, 200);
    assert_eq!(body, "new");

    site.server.shutdown(true);
}

#[test]
fn test_failed_rebuild_keeps_serving_old_content() {
    let fail = Arc::new(AtomicBool::new(true));
    let flag = fail.clone();
    let site = site_with(
        Arc::new(move || -> anyhow::Result<()> {
            if flag.load(Ordering::SeqCst) {
                anyhow::bail!("syntax error in nav");
            }
            Ok(())
        }),
        |_| {},
    );
    site.write("page.txt", "old");
    site.server.watch(&site.docs(), true).unwrap();
    site.server.serve().unwrap();
    let addr = site.server.bound_addr().unwrap();
    let (before, _) = site.server.epochs();

    site.touch_docs();
    assert!(wait_until(Duration::from_secs(5), || site.server.stats().rebuilds == 1));
    assert!(wait_until(Duration::from_secs(5), || {
        site.server.epochs() == (before, before)
    }));

    let (status, _, body) = http_get(addr, "/page.txt");
    assert_eq!(status, 200);
    assert_eq!(body, "old");
    assert_eq!(site.server.epochs().0, before);

    site.server.shutdown(true);
}

#[test]
fn test_shutdown_is_idempotent() {
    let site = site();
    site.server.serve().unwrap();
    site.server.shutdown(false);
    site.server.shutdown(true);
    site.server.shutdown(true);
}

#[test]
fn test_shutdown_waits_for_build_while_run_is_joining() {
    let finished = Arc::new(AtomicBool::new(false));
    let flag = finished.clone();
    let site = site_with(
        Arc::new(move || -> anyhow::Result<()> {
            thread::sleep(Duration::from_millis(1000));
            flag.store(true, Ordering::SeqCst);
            Ok(())
        }),
        |_| {},
    );
    site.server.watch(&site.docs(), true).unwrap();

    thread::scope(|s| {
        let runner = s.spawn(|| site.server.run());
        assert!(wait_until(Duration::from_secs(5), || site.server.bound_addr().is_some()));

        site.touch_docs();
        assert!(wait_until(Duration::from_secs(5), || site.server.stats().rebuilds == 1));
        assert!(!finished.load(Ordering::SeqCst));

        site.server.shutdown(true);
        assert!(finished.load(Ordering::SeqCst));
        runner.join().unwrap().unwrap();
    });
}

#[test]
fn test_serve_after_shutdown_is_rejected() {
    let site = site();
    site.server.shutdown(true);
    assert!(site.server.serve().is_err());
    assert!(site.server.bound_addr().is_none());
}

#[test]
fn test_rebuild_rereads_config() {
    let temp = TempDir::new().unwrap();
    let config_file = temp.path().join("docsmith.toml");
    fs::write(&config_file, "[site]\nname = \"Old Name\"").unwrap();
    fs::create_dir_all(temp.path().join("docs")).unwrap();
    fs::write(temp.path().join("docs/index.md"), "# Home").unwrap();

    let cli = Cli::parse_from(["docsmith", "serve", "-C", config_file.to_str().unwrap()]);
    let config = SiteConfig::load(&cli).unwrap();
    let builder = site_builder(&config);
    let page = temp.path().join("site/index.html");

    builder().unwrap();
    assert!(fs::read_to_string(&page).unwrap().contains("<title>Home - Old Name</title>"));

    fs::write(&config_file, "[site]\nname = \"New Name\"").unwrap();
    builder().unwrap();
    assert!(fs::read_to_string(&page).unwrap().contains("<title>Home - New Name</title>"));
}
