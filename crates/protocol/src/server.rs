//! Accept loop and cooperative shutdown.
//!
//! Each service runs one listener. Every accepted connection is handled by its own task and
//! the loop goes straight back to accepting. When shutdown is requested the loop stops
//! accepting, gives in-flight connections the drain window to finish, then aborts the rest.

use crate::ProtocolResult;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::Instrument;

/// Pause after a failed `accept` (for example when out of file descriptors).
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// A bidirectional byte stream a handler can serve.
pub trait Connection: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> Connection for T {}

/// Serves one exchange on an accepted connection.
pub trait ConnectionHandler: Send + Sync + 'static {
    /// Name used in logs.
    const SERVICE: &'static str;

    fn handle<S: Connection>(&self, stream: S) -> impl Future<Output = ProtocolResult<()>> + Send;
}

/// Requests shutdown of every [`ShutdownToken`] cloned from the same channel.
#[derive(Debug)]
pub struct ShutdownTrigger(watch::Sender<bool>);

/// Resolves once shutdown has been requested.
#[derive(Debug, Clone)]
pub struct ShutdownToken(watch::Receiver<bool>);

pub fn shutdown_channel() -> (ShutdownTrigger, ShutdownToken) {
    let (tx, rx) = watch::channel(false);
    (ShutdownTrigger(tx), ShutdownToken(rx))
}

impl ShutdownTrigger {
    pub fn trigger(&self) {
        self.0.send_replace(true);
    }
}

impl ShutdownToken {
    pub fn is_shutdown(&self) -> bool {
        *self.0.borrow()
    }

    /// Waits for shutdown. A dropped trigger counts as shutdown.
    pub async fn wait(&mut self) {
        while !*self.0.borrow_and_update() {
            if self.0.changed().await.is_err() {
                return;
            }
        }
    }
}

/// Waits for Ctrl-C, or SIGTERM on unix.
pub async fn wait_for_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => tracing::info!("Received SIGINT"),
                    _ = sigterm.recv() => tracing::info!("Received SIGTERM"),
                }
                return;
            }
            Err(e) => tracing::warn!(error = %e, "cannot listen for SIGTERM, using Ctrl-C only"),
        }
    }

    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Received SIGINT"),
        Err(e) => tracing::error!(error = %e, "cannot listen for Ctrl-C"),
    }
}

/// Accepts connections on `listener` until `shutdown` resolves, then drains.
///
/// Connection errors are logged and end only that connection.
///
/// # Errors
///
/// Returns an I/O error only if the listener's local address cannot be read.
pub async fn serve<H: ConnectionHandler>(
    listener: TcpListener,
    handler: Arc<H>,
    mut shutdown: ShutdownToken,
    drain_window: Duration,
) -> ProtocolResult<()> {
    let addr = listener.local_addr()?;
    tracing::info!(service = H::SERVICE, %addr, "listening");

    let mut workers = JoinSet::new();
    loop {
        tokio::select! {
            () = shutdown.wait() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    if let Err(e) = stream.set_nodelay(true) {
                        tracing::debug!(%peer, error = %e, "cannot set TCP_NODELAY");
                    }
                    let handler = Arc::clone(&handler);
                    let span = tracing::info_span!("connection", service = H::SERVICE, %peer);
                    workers.spawn(run_worker(handler, stream, peer).instrument(span));
                }
                Err(e) => {
                    tracing::warn!(service = H::SERVICE, error = %e, "accept failed");
                    tokio::time::sleep(ACCEPT_BACKOFF).await;
                }
            },
            Some(joined) = workers.join_next(), if !workers.is_empty() => log_join(joined),
        }
    }

    tracing::info!(
        service = H::SERVICE,
        in_flight = workers.len(),
        "stopped accepting, draining connections"
    );
    drain(&mut workers, drain_window).await;
    tracing::info!(service = H::SERVICE, "stopped");
    Ok(())
}

async fn run_worker<H: ConnectionHandler, S: Connection>(handler: Arc<H>, stream: S, peer: SocketAddr) {
    match handler.handle(stream).await {
        Ok(()) => tracing::debug!(%peer, "exchange complete"),
        Err(e) => tracing::warn!(%peer, error = %e, "exchange failed"),
    }
}

async fn drain(workers: &mut JoinSet<()>, window: Duration) {
    let drained = tokio::time::timeout(window, async {
        while let Some(joined) = workers.join_next().await {
            log_join(joined);
        }
    })
    .await;

    if drained.is_err() {
        tracing::warn!(
            remaining = workers.len(),
            "drain window elapsed, aborting connections"
        );
        workers.abort_all();
        while workers.join_next().await.is_some() {}
    }
}

fn log_join(joined: Result<(), tokio::task::JoinError>) {
    if let Err(e) = joined {
        if e.is_panic() {
            tracing::error!(error = %e, "connection worker panicked");
        }
    }
}
