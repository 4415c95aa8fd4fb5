//! Development server with live reload support.
//!
//! # Request flow
//!
//! ```text
//! tiny_http accept thread ──spawn──▶ request thread ──▶ route ──▶ Reply ──▶ socket
//!                                                         │
//!                                        EpochGate waits ─┘ (long-poll / converge)
//! ```
//!
//! - `route` - URL → `Reply` (long-poll, redirects, static files)
//! - `response` - `Reply` type, error bodies, conversion to `tiny_http`
//! - `content` - live-reload script injection
//! - `lifecycle` - bind, threads, shutdown, Ctrl+C

mod content;
mod lifecycle;
mod response;
mod route;

#[cfg(test)]
mod tests;

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use anyhow::Result;
use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashSet;
use tiny_http::Server;

use crate::config::SiteConfig;
use crate::reload::{
    BuildStats, Builder, DEFAULT_BUILD_DELAY, DEFAULT_SHUTDOWN_DELAY, Epoch, EpochClock, EpochGate,
    NotifyBackend, RebuildSignal, WatchBackend, WatchError, WatchRegistry, WatcherKind,
};
use crate::utils::path::{absolutize, route::normalize_mount_path};
use crate::{cli::build::build_site, log};

pub use lifecycle::install_interrupt_handler;

/// How long a long-poll request is held open when nothing changes.
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(60);

/// Maps an HTTP status code to a custom error page body.
///
/// `Ok(None)` falls back to the default text body.
pub type ErrorHandler = Arc<dyn Fn(u16) -> Result<Option<Vec<u8>>> + Send + Sync>;

/// Dev server settings.
#[derive(Debug, Clone)]
pub struct ServeOptions {
    pub interface: IpAddr,
    pub port: u16,
    /// Built site served from disk.
    pub root: PathBuf,
    /// URL prefix the site is served under, e.g. `/` or `/project/`.
    pub mount_path: String,
    pub build_delay: Duration,
    pub shutdown_delay: Duration,
    pub poll_timeout: Duration,
    pub watcher: WatcherKind,
}

impl ServeOptions {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            interface: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 8000,
            root: root.into(),
            mount_path: "/".to_string(),
            build_delay: DEFAULT_BUILD_DELAY,
            shutdown_delay: DEFAULT_SHUTDOWN_DELAY,
            poll_timeout: DEFAULT_POLL_TIMEOUT,
            watcher: WatcherKind::Native,
        }
    }

    pub fn from_config(config: &SiteConfig) -> Self {
        let serve = &config.serve;
        Self {
            interface: serve.interface,
            port: serve.port,
            root: config.build.site_dir.clone(),
            mount_path: config.mount_path(),
            build_delay: Duration::from_millis(serve.build_delay_ms),
            shutdown_delay: Duration::from_millis(serve.shutdown_delay_ms),
            poll_timeout: Duration::from_secs(serve.poll_timeout_secs),
            watcher: serve.watcher_kind(),
        }
    }
}

/// State shared by the accept thread and every request thread.
pub(super) struct Shared {
    pub(super) root: PathBuf,
    pub(super) mount_path: String,
    pub(super) poll_timeout: Duration,
    pub(super) clock: Arc<EpochClock>,
    pub(super) gate: Arc<EpochGate>,
    pub(super) registry: WatchRegistry,
    pub(super) error_handler: RwLock<ErrorHandler>,
    /// Long-poll request ids already reported as connected browsers.
    pub(super) seen_polls: Mutex<FxHashSet<String>>,
}

impl Shared {
    /// Live reload is active while anything is watched.
    pub(super) fn livereload(&self) -> bool {
        !self.registry.is_empty()
    }
}

#[derive(Default)]
struct Threads {
    serve: Option<JoinHandle<()>>,
    build: Option<JoinHandle<()>>,
}

/// HTTP server that rebuilds on file changes and reloads connected browsers.
pub struct LiveReloadServer {
    shared: Arc<Shared>,
    signal: Arc<RebuildSignal>,
    builder: Builder,
    interface: IpAddr,
    port: u16,
    build_delay: Duration,
    shutdown_delay: Duration,
    http: Mutex<Option<Arc<Server>>>,
    bound: Mutex<Option<SocketAddr>>,
    threads: Mutex<Threads>,
    /// Held for the whole of a join.
    joining: Mutex<()>,
}

impl LiveReloadServer {
    pub fn new(builder: Builder, options: ServeOptions) -> Self {
        let backend = NotifyBackend::new(options.watcher);
        Self::with_backend(builder, options, Box::new(backend))
    }

    /// Construct with a custom filesystem observer.
    pub fn with_backend(
        builder: Builder,
        options: ServeOptions,
        backend: Box<dyn WatchBackend>,
    ) -> Self {
        let clock = Arc::new(EpochClock::new());
        let gate = Arc::new(EpochGate::new(clock.next()));
        let signal = Arc::new(RebuildSignal::new());
        let registry = WatchRegistry::new(backend, Arc::clone(&signal));
        let no_custom_pages: ErrorHandler =
            Arc::new(|_: u16| -> Result<Option<Vec<u8>>> { Ok(None) });

        let shared = Shared {
            root: absolutize(&options.root),
            mount_path: normalize_mount_path(&options.mount_path),
            poll_timeout: options.poll_timeout,
            clock,
            gate,
            registry,
            error_handler: RwLock::new(no_custom_pages),
            seen_polls: Mutex::new(FxHashSet::default()),
        };

        Self {
            shared: Arc::new(shared),
            signal,
            builder,
            interface: options.interface,
            port: options.port,
            build_delay: options.build_delay,
            shutdown_delay: options.shutdown_delay,
            http: Mutex::new(None),
            bound: Mutex::new(None),
            threads: Mutex::new(Threads::default()),
            joining: Mutex::new(()),
        }
    }

    /// Rebuild whenever a file under `path` changes.
    pub fn watch(&self, path: &Path, recursive: bool) -> Result<(), WatchError> {
        self.shared.registry.watch(path, recursive)
    }

    /// Undo one [`watch`](Self::watch) call.
    pub fn unwatch(&self, path: &Path) -> Result<(), WatchError> {
        self.shared.registry.unwatch(path)
    }

    pub fn is_watched(&self, path: &Path) -> bool {
        self.shared.registry.is_watched(path)
    }

    /// Replace the hook consulted for error page bodies.
    pub fn set_error_handler(&self, handler: ErrorHandler) {
        *self.shared.error_handler.write() = handler;
    }

    /// `(visible, wanted)` epochs.
    pub fn epochs(&self) -> (Epoch, Epoch) {
        self.shared.gate.snapshot()
    }

    pub fn stats(&self) -> BuildStats {
        self.signal.stats()
    }

    /// Address the listener is bound to, once serving.
    pub fn bound_addr(&self) -> Option<SocketAddr> {
        *self.bound.lock()
    }

    /// Public URL of the mounted site.
    pub fn url(&self) -> String {
        let addr = self
            .bound_addr()
            .unwrap_or_else(|| SocketAddr::new(self.interface, self.port));
        format!("http://{}{}", addr, self.shared.mount_path)
    }
}

/// `docsmith serve`: build once, then serve with live reload.
pub fn serve_site(config: &SiteConfig) -> Result<()> {
    log!("build"; "building documentation...");
    build_site(config, config.build.dirty)?;

    let server = Arc::new(LiveReloadServer::new(
        site_builder(config),
        ServeOptions::from_config(config),
    ));
    server.set_error_handler(site_error_pages(config.build.site_dir.clone()));

    if config.serve.livereload {
        server.watch(&config.build.docs_dir, true)?;
        if config.config_path.is_file() {
            server.watch(&config.config_path, false)?;
        }
        for path in &config.serve.watch {
            server.watch(path, true)?;
        }
    }

    install_interrupt_handler(Arc::clone(&server))?;
    server.run()
}

/// Rebuild callback: re-reads the config file, then builds the whole site.
fn site_builder(config: &SiteConfig) -> Builder {
    let served = config.clone();
    Arc::new(move || {
        let config = served.reload()?;
        build_site(&config, config.build.dirty).map(|_| ())
    })
}

/// Serve `<site_dir>/<code>.html` as the error body when the build produced one.
fn site_error_pages(site_dir: PathBuf) -> ErrorHandler {
    Arc::new(move |code: u16| -> Result<Option<Vec<u8>>> {
        let page = site_dir.join(format!("{code}.html"));
        if !page.is_file() {
            return Ok(None);
        }
        Ok(Some(std::fs::read(&page)?))
    })
}
