//! Local benchmark target server.
//!
//! Runs an axum router on a dedicated thread with its own current-thread
//! runtime, so the server's work never shares the measuring thread.
//!
//! Routes:
//! - `GET /`             : fixed body
//! - `GET /status/:code` : empty response with that status

use std::io;
use std::net::SocketAddr;
use std::thread;
use std::time::Duration;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::oneshot;

use instrbench_core::error::{BenchError, Result};

use crate::config::ServerSection;

pub fn build_router(body: String) -> Router {
    Router::new()
        .route("/", get(hello))
        .route("/status/:code", get(status))
        .with_state(body)
}

async fn hello(State(body): State<String>) -> String {
    body
}

async fn status(Path(code): Path<u16>) -> StatusCode {
    StatusCode::from_u16(code).unwrap_or(StatusCode::BAD_REQUEST)
}

/// Handle to a running server. Dropping it without `stop` still signals
/// shutdown; `stop` additionally waits for the port to be released.
pub struct LocalServer {
    addr: SocketAddr,
    shutdown_timeout: Duration,
    shutdown_tx: Option<oneshot::Sender<()>>,
    done_rx: Option<oneshot::Receiver<io::Result<()>>>,
    thread: Option<thread::JoinHandle<()>>,
}

impl LocalServer {
    pub async fn start(cfg: &ServerSection) -> Result<Self> {
        let listen = cfg.listen_addr()?;
        let body = cfg.body.clone();

        let (ready_tx, ready_rx) = oneshot::channel::<io::Result<SocketAddr>>();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let (done_tx, done_rx) = oneshot::channel::<io::Result<()>>();

        let handle = thread::Builder::new()
            .name("instrbench-server".into())
            .spawn(move || {
                let rt = match tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                {
                    Ok(rt) => rt,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                let res = rt.block_on(serve(listen, body, ready_tx, shutdown_rx));
                let _ = done_tx.send(res);
            })
            .map_err(|e| BenchError::setup("server", format!("spawn server thread: {e}")))?;

        let addr = match ready_rx.await {
            Ok(Ok(addr)) => addr,
            Ok(Err(e)) => {
                join_detached(handle).await;
                return Err(BenchError::setup("server", format!("bind {listen}: {e}")));
            }
            Err(_) => {
                join_detached(handle).await;
                return Err(BenchError::setup("server", "server thread exited before binding"));
            }
        };

        tracing::info!(%addr, "local server listening");
        Ok(Self {
            addr,
            shutdown_timeout: cfg.shutdown_timeout(),
            shutdown_tx: Some(shutdown_tx),
            done_rx: Some(done_rx),
            thread: Some(handle),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Graceful shutdown; returns once the listener is closed.
    pub async fn stop(mut self) -> Result<()> {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        let Some(done_rx) = self.done_rx.take() else {
            return Ok(());
        };

        match tokio::time::timeout(self.shutdown_timeout, done_rx).await {
            Ok(Ok(Ok(()))) => {}
            Ok(Ok(Err(e))) => return Err(BenchError::release("server", e)),
            Ok(Err(_)) => {
                return Err(BenchError::release("server", "server thread exited without reporting"))
            }
            Err(_) => {
                // thread is left detached
                return Err(BenchError::release(
                    "server",
                    format!("graceful shutdown timed out after {:?}", self.shutdown_timeout),
                ));
            }
        }

        if let Some(handle) = self.thread.take() {
            match tokio::task::spawn_blocking(move || handle.join()).await {
                Ok(Ok(())) => {}
                Ok(Err(_)) => return Err(BenchError::release("server", "server thread panicked")),
                Err(e) => return Err(BenchError::release("server", e)),
            }
        }

        tracing::info!(addr = %self.addr, "local server stopped");
        Ok(())
    }
}

/// Join a server thread that already returned, off the async thread.
async fn join_detached(handle: thread::JoinHandle<()>) {
    if let Err(e) = tokio::task::spawn_blocking(move || handle.join()).await {
        tracing::warn!(error = %e, "server thread join failed");
    }
}

impl Drop for LocalServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

async fn serve(
    listen: SocketAddr,
    body: String,
    ready: oneshot::Sender<io::Result<SocketAddr>>,
    shutdown: oneshot::Receiver<()>,
) -> io::Result<()> {
    let listener = match TcpListener::bind(listen).await {
        Ok(l) => l,
        Err(e) => {
            let _ = ready.send(Err(e));
            return Ok(());
        }
    };
    let addr = listener.local_addr()?;
    let _ = ready.send(Ok(addr));

    axum::serve(listener, build_router(body))
        .with_graceful_shutdown(async {
            let _ = shutdown.await;
        })
        .await
}
