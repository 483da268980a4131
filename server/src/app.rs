//! Wires config, store and handlers into a running directory server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use protocol::{Engine, ServerHandle, StaticFiles};
use tokio::net::TcpListener;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::config::ServerConfig;
use crate::db::DirectoryStore;
use crate::directory::Directory;
use crate::handlers;
use crate::monitor::LivenessMonitor;

const SWEEP_INTERVAL: Duration = Duration::from_secs(30);

/// A running directory server and its background tasks.
pub struct DirectoryServer {
    http: ServerHandle,
    directory: Arc<Directory>,
    monitor: LivenessMonitor,
    token: CancellationToken,
    tracker: TaskTracker,
}

impl DirectoryServer {
    pub fn local_addr(&self) -> SocketAddr {
        self.http.local_addr()
    }

    pub fn directory(&self) -> &Arc<Directory> {
        &self.directory
    }

    pub fn monitor(&self) -> &LivenessMonitor {
        &self.monitor
    }

    /// Stops the listener and the sweeper; safe to call more than once.
    pub async fn shutdown(&self) {
        self.token.cancel();
        self.tracker.close();
        self.http.shutdown().await;
        self.tracker.wait().await;
        log::info!("Directory server stopped");
    }
}

/// Binds `config.listen` and starts serving with `store` as the backend.
pub async fn serve(
    config: &ServerConfig,
    store: Arc<dyn DirectoryStore>,
) -> anyhow::Result<DirectoryServer> {
    let addr = config.bind_addr();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    serve_on(listener, config, store)
}

pub fn serve_on(
    listener: TcpListener,
    config: &ServerConfig,
    store: Arc<dyn DirectoryStore>,
) -> anyhow::Result<DirectoryServer> {
    let directory = Arc::new(Directory::new(store));
    let monitor = LivenessMonitor::new();

    let mut router = handlers::routes(directory.clone(), monitor.clone());
    if let Some(dir) = &config.static_dir {
        log::info!("Serving static files from {}", dir.display());
        router = router.fallback(StaticFiles::new(dir));
    }

    let engine = Engine::new(router)
        .with_sessions(Arc::new(directory.sessions().clone()))
        .with_limits(config.engine_limits());

    let http = engine.serve(listener).context("failed to start listener")?;
    log::info!("Directory server listening on {}", http.local_addr());

    let token = CancellationToken::new();
    let tracker = TaskTracker::new();
    tracker.spawn(sweep_liveness(monitor.clone(), token.clone()));

    Ok(DirectoryServer {
        http,
        directory,
        monitor,
        token,
        tracker,
    })
}

async fn sweep_liveness(monitor: LivenessMonitor, token: CancellationToken) {
    let mut interval = time::interval(SWEEP_INTERVAL);
    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = interval.tick() => {
                let removed = monitor.cleanup_stale();
                if removed > 0 {
                    log::info!("Background cleanup: marked {} peers as offline", removed);
                }
            }
        }
    }
}
