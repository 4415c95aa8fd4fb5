//! Server lifecycle management.

use std::net::SocketAddr;
use std::sync::Arc;
use std::thread;

use anyhow::{Context, Result, anyhow, bail};
use tiny_http::Server;

use super::{LiveReloadServer, Shared, response, route};
use crate::reload::BuildLoop;
use crate::utils::path::relative_to_cwd;
use crate::{debug, log};

impl LiveReloadServer {
    /// Bind the listener and start the request and build-loop threads.
    ///
    /// Returns once both threads are running. Bind failures are returned
    /// as-is; there is no port retry.
    pub fn serve(&self) -> Result<()> {
        // held until both handles are stored, so shutdown never sees a half-started server
        let mut threads = self.threads.lock();
        if self.signal.is_shutdown() {
            bail!("server is already shut down");
        }

        let addr = SocketAddr::new(self.interface, self.port);
        let server = Server::http(addr).map_err(|e| anyhow!("failed to bind {}: {}", addr, e))?;
        let bound = server.server_addr().to_ip().unwrap_or(addr);
        let server = Arc::new(server);

        *self.bound.lock() = Some(bound);
        *self.http.lock() = Some(Arc::clone(&server));

        let watched = self.shared.registry.paths();
        if !watched.is_empty() {
            let paths = watched
                .iter()
                .map(|p| format!("'{}'", relative_to_cwd(p).display()))
                .collect::<Vec<_>>()
                .join(", ");
            log!("watch"; "watching paths for changes: {}", paths);
        }
        log!("serve"; "serving on {}", self.url());

        let shared = Arc::clone(&self.shared);
        let serve = thread::Builder::new()
            .name("http-accept".into())
            .spawn(move || accept_loop(&server, &shared))
            .context("failed to spawn server thread")?;
        threads.serve = Some(serve);

        let build = BuildLoop::new(
            Arc::clone(&self.builder),
            Arc::clone(&self.signal),
            Arc::clone(&self.shared.gate),
            Arc::clone(&self.shared.clock),
        )
        .with_build_delay(self.build_delay)
        .with_shutdown_delay(self.shutdown_delay)
        .spawn()
        .context("failed to spawn build loop")?;

        threads.build = Some(build);
        Ok(())
    }

    /// Serve until [`shutdown`](Self::shutdown) is called from another thread.
    pub fn run(&self) -> Result<()> {
        self.serve()?;
        self.join();
        Ok(())
    }

    /// Stop watching, stop the build loop and close the listener.
    ///
    /// Requests already being handled run to completion. With `wait`, blocks
    /// until the build loop and the accept thread have exited, even when
    /// another thread is already joining them in [`run`](Self::run). Safe to
    /// call more than once.
    pub fn shutdown(&self, wait: bool) {
        {
            let _starting = self.threads.lock();
            self.shared.registry.stop();
            self.signal.request_shutdown();

            if let Some(server) = self.http.lock().take() {
                server.unblock();
            }
        }

        if wait {
            self.join();
        }
    }

    fn join(&self) {
        let _joining = self.joining.lock();
        let (serve, build) = {
            let mut threads = self.threads.lock();
            (threads.serve.take(), threads.build.take())
        };

        for handle in [build, serve].into_iter().flatten() {
            let name = handle.thread().name().unwrap_or("worker").to_string();
            if handle.join().is_err() {
                log!("error"; "{} thread panicked", name);
            }
        }
    }
}

/// Accept connections until the server is unblocked, one thread per request.
fn accept_loop(server: &Server, shared: &Arc<Shared>) {
    for request in server.incoming_requests() {
        let shared = Arc::clone(shared);
        let spawned = thread::Builder::new()
            .name("http-request".into())
            .spawn(move || handle_request(request, &shared));
        if let Err(e) = spawned {
            log!("serve"; "failed to spawn request thread: {}", e);
        }
    }
    debug!("serve"; "listener closed");
}

fn handle_request(request: tiny_http::Request, shared: &Shared) {
    let url = request.url().to_string();
    let referer = request
        .headers()
        .iter()
        .find(|h| h.field.equiv("Referer"))
        .map(|h| h.value.to_string());

    let reply = route::serve_request(shared, &url, referer.as_deref());

    let line = format!("\"{} {}\" code {}", request.method(), url, reply.status);
    if reply.status == 200 {
        debug!("serve"; "{}", line);
    } else {
        log!("serve"; "{}", line);
    }

    if let Err(e) = request.respond(response::into_response(reply)) {
        debug!("serve"; "failed to send response: {}", e);
    }
}

/// Shut the server down gracefully on Ctrl+C.
pub fn install_interrupt_handler(server: Arc<LiveReloadServer>) -> Result<()> {
    ctrlc::set_handler(move || {
        log!("serve"; "shutting down...");
        server.shutdown(false);
    })
    .map_err(|e| anyhow!("failed to set Ctrl+C handler: {}", e))
}
