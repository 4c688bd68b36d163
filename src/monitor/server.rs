//! HTTP surface for the monitor: an axum router over a [`StatusSource`].

use crate::error::{MirrorError, Result};
use crate::monitor::{MonitorSnapshot, StatusSource, page};
use axum::{
    Json, Router,
    extract::State,
    http::header,
    response::{Html, IntoResponse},
    routing::get,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{debug, info};

type SharedSource = Arc<dyn StatusSource>;

/// `GET /` renders the status page, `GET /status` returns the snapshot
/// as JSON. Unknown paths get 404 and other methods 405.
pub fn router(source: SharedSource) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/index.html", get(index_handler))
        .route("/status", get(status_handler))
        .with_state(source)
}

async fn index_handler(State(source): State<SharedSource>) -> impl IntoResponse {
    (
        [(header::CACHE_CONTROL, "no-store")],
        Html(page::render(&source.snapshot())),
    )
}

async fn status_handler(State(source): State<SharedSource>) -> Json<MonitorSnapshot> {
    Json(source.snapshot())
}

/// Stops a running [`MonitorServer`]. Cheap to clone.
#[derive(Debug, Clone)]
pub struct MonitorStopper {
    shutdown: Arc<watch::Sender<bool>>,
}

impl MonitorStopper {
    /// Ask the server to finish in-flight requests and return.
    pub fn stop(&self) {
        self.shutdown.send_replace(true);
    }
}

/// HTTP server bound to a TCP address.
pub struct MonitorServer {
    listener: TcpListener,
    shutdown: Arc<watch::Sender<bool>>,
}

impl MonitorServer {
    /// Bind to `addr`, e.g. `"0.0.0.0:8787"`. Port 0 picks a free port.
    pub async fn bind(addr: &str) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| MirrorError::Monitor {
                message: format!("Failed to bind {}: {}", addr, e),
            })?;
        let (shutdown, _) = watch::channel(false);
        Ok(Self {
            listener,
            shutdown: Arc::new(shutdown),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn stopper(&self) -> MonitorStopper {
        MonitorStopper {
            shutdown: Arc::clone(&self.shutdown),
        }
    }

    /// Serve `source` until [`MonitorStopper::stop`] is called.
    pub async fn serve(self, source: SharedSource) -> Result<()> {
        let MonitorServer { listener, shutdown } = self;
        if let Ok(addr) = listener.local_addr() {
            info!(%addr, "Monitor listening on http://{}", addr);
        }

        axum::serve(listener, router(source))
            .with_graceful_shutdown(wait_for_stop(shutdown.subscribe()))
            .await
            .map_err(|e| MirrorError::Monitor {
                message: format!("Monitor server failed: {}", e),
            })?;

        debug!("Monitor server stopped");
        Ok(())
    }
}

async fn wait_for_stop(mut stop: watch::Receiver<bool>) {
    if stop.wait_for(|stopped| *stopped).await.is_err() {
        debug!("Monitor stop handle dropped");
    }
}
