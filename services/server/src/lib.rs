//! `vstream-server`: an append-only event-stream server speaking RESP.
//!
//! Ties the ordered store ([`vstream_store`]), the broadcaster
//! ([`vstream_bus`]), and the wire codec ([`vstream_protocol`]) together
//! behind a RESP command dispatcher (§4–§5 of the governing design).

pub mod config;
pub mod context;
pub mod dispatcher;
pub mod error;
pub mod handlers;

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tracing::info;

pub use config::{Cli, ServerConfig};
pub use context::AppContext;
pub use error::CmdError;

fn open_context(config: &ServerConfig) -> std::io::Result<AppContext> {
    std::fs::create_dir_all(&config.out)?;
    let store = vstream_store::open(config.backend, &config.out)
        .map_err(|err| std::io::Error::other(err.to_string()))?;
    info!(backend = ?config.backend, out = %config.out.display(), "store opened");
    Ok(AppContext {
        store: Arc::from(store),
        bus: vstream_bus::Broadcaster::new(),
    })
}

/// Opens the configured store, wires up the broadcaster, and serves
/// connections until `shutdown` resolves. Mirrors
/// `services/server/src/main.rs`'s split between building an `AppState`
/// and handing it to the serve loop.
pub async fn run(
    config: ServerConfig,
    shutdown: impl std::future::Future<Output = ()>,
) -> std::io::Result<()> {
    let ctx = open_context(&config)?;
    let listener = TcpListener::bind(("0.0.0.0", config.port)).await?;

    let result = dispatcher::serve(listener, ctx.clone(), shutdown).await;

    ctx.bus.shutdown();
    if let Err(err) = ctx.store.close() {
        tracing::warn!(error = %err, "error while closing the store");
    }

    result
}

/// A server running in the background, for tests that want to connect a
/// real client rather than calling handlers directly. Grounded on
/// `rt-test-utils::MockWsServer`'s bind-now/serve-in-a-task/expose-the-port
/// shape.
pub struct RunningServer {
    pub addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: tokio::task::JoinHandle<std::io::Result<()>>,
}

impl RunningServer {
    /// Signals graceful shutdown and waits for the accept loop to exit.
    pub async fn shutdown(mut self) -> std::io::Result<()> {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        self.task
            .await
            .unwrap_or_else(|err| Err(std::io::Error::other(err.to_string())))
    }
}

/// Binds a random local port and serves in a background task, returning
/// immediately once the listener is bound. Intended for integration tests;
/// `config.port` is ignored (always binds to port 0).
pub async fn spawn(mut config: ServerConfig) -> std::io::Result<RunningServer> {
    config.port = 0;
    let ctx = open_context(&config)?;
    let listener = TcpListener::bind(("127.0.0.1", 0)).await?;
    let addr = listener.local_addr()?;

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let shutdown = async move {
        let _ = shutdown_rx.await;
    };

    let task_ctx = ctx.clone();
    let task = tokio::spawn(async move {
        let result = dispatcher::serve(listener, task_ctx.clone(), shutdown).await;
        task_ctx.bus.shutdown();
        let _ = task_ctx.store.close();
        result
    });

    Ok(RunningServer {
        addr,
        shutdown_tx: Some(shutdown_tx),
        task,
    })
}
