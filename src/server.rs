//! TCP listener that spawns one handler task per tracker connection

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::GatewayConfig;
use crate::connection::ConnectionHandler;
use crate::sink::LocationSink;
use crate::{GatewayError, Result};

/// A bound listener, ready to accept trackers
pub struct Server {
    listener: TcpListener,
    config: Arc<GatewayConfig>,
    sink: Arc<dyn LocationSink>,
    cancel: CancellationToken,
}

/// Handle to a server running on a background task
pub struct ServerHandle {
    local_addr: SocketAddr,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl Server {
    /// Bind the configured listen address.
    pub async fn bind(config: GatewayConfig, sink: Arc<dyn LocationSink>) -> Result<Self> {
        config.validate()?;
        let addr = config.listen_addr();
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| GatewayError::io_error(format!("binding {}", addr), e))?;

        Ok(Self { listener, config: Arc::new(config), sink, cancel: CancellationToken::new() })
    }

    /// Address actually bound (useful with port 0).
    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener.local_addr().map_err(|e| GatewayError::io_error("reading local address", e))
    }

    /// Token that stops the accept loop and every connection when cancelled.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Accept connections until the shutdown token is cancelled, then wait for
    /// open connections to finish their current chunk and close.
    ///
    /// Accept failures are logged and retried with backoff; they never end the loop.
    pub async fn run(self) {
        let addr = self.local_addr().map(|a| a.to_string()).unwrap_or_default();
        info!(%addr, reassemble = self.config.reassemble_fragments, "Accepting GT06 trackers");

        let mut connection_count = 0u64;
        let mut error_count = 0u32;
        let mut connections = JoinSet::new();

        loop {
            let accepted = tokio::select! {
                _ = self.cancel.cancelled() => {
                    info!("Listener cancelled");
                    break;
                }
                Some(finished) = connections.join_next(), if !connections.is_empty() => {
                    if let Err(e) = finished {
                        warn!("Connection task ended abnormally: {}", e);
                    }
                    continue;
                }
                accepted = self.listener.accept() => accepted,
            };

            match accepted {
                Ok((stream, peer)) => {
                    error_count = 0;
                    connection_count += 1;
                    if let Err(e) = stream.set_nodelay(true) {
                        debug!(%peer, "Failed to set TCP_NODELAY: {}", e);
                    }

                    let handler = ConnectionHandler::new(
                        stream,
                        peer,
                        &self.config,
                        Arc::clone(&self.sink),
                        self.cancel.child_token(),
                    );
                    connections.spawn(handler.run());
                }
                Err(e) => {
                    error_count += 1;
                    error!("Accept failed ({} in a row): {}", error_count, e);

                    // Exponential backoff: 50ms, 100ms, 200ms, ... capped at 1.6s
                    let backoff = Duration::from_millis(50 * (1 << error_count.min(5)));
                    tokio::time::sleep(backoff).await;
                }
            }
        }

        debug!(open = connections.len(), "Waiting for open connections to close");
        while let Some(finished) = connections.join_next().await {
            if let Err(e) = finished {
                warn!("Connection task ended abnormally: {}", e);
            }
        }

        info!("Listener stopped after {} connections", connection_count);
    }

    /// Run the accept loop on a background task.
    pub fn spawn(self) -> Result<ServerHandle> {
        let local_addr = self.local_addr()?;
        let cancel = self.shutdown_token();
        let task = tokio::spawn(self.run());
        Ok(ServerHandle { local_addr, cancel, task })
    }
}

impl ServerHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Cancel the listener and all connections, then wait until every
    /// connection has closed.
    pub async fn shutdown(mut self) -> Result<()> {
        self.cancel.cancel();
        (&mut self.task).await.map_err(|e| {
            warn!("Accept loop ended abnormally: {}", e);
            GatewayError::io_error("joining accept loop", std::io::Error::other(e))
        })
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        // Cancel tasks on drop for clean shutdown
        self.cancel.cancel();
    }
}
