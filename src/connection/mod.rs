//! Per-connection handler
//!
//! A [`ConnectionHandler`] owns one socket. For every read it runs the
//! session over the chunk, writes acknowledgements in frame order, then
//! forwards the chunk's location fixes to the sink before reading again, so
//! events from one device reach the sink in the order they were sent.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::GatewayConfig;
use crate::session::{FrameOutcome, Session};
use crate::sink::{LocationRecord, LocationSink};
use crate::{GatewayError, Result};

#[cfg(test)]
mod tests;

/// Counters for one connection
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionStats {
    pub chunks_received: u64,
    /// Chunks dropped whole (missing start marker, buffer overflow)
    pub chunks_rejected: u64,
    pub frames_decoded: u64,
    pub frames_skipped: u64,
    pub acks_sent: u64,
    pub fixes_forwarded: u64,
    /// Location fixes received before any login
    pub fixes_quarantined: u64,
    pub sink_failures: u64,
}

/// Why a connection ended
#[derive(Debug)]
pub enum CloseReason {
    PeerClosed,
    IdleTimeout,
    Cancelled,
    Error(GatewayError),
}

/// Final state of a connection
#[derive(Debug)]
pub struct ConnectionReport {
    pub peer: SocketAddr,
    pub stats: ConnectionStats,
    pub reason: CloseReason,
}

/// Drives one device connection
pub struct ConnectionHandler<S> {
    stream: S,
    peer: SocketAddr,
    session: Session,
    sink: Arc<dyn LocationSink>,
    idle_timeout: Option<Duration>,
    read_buffer_size: usize,
    cancel: CancellationToken,
    stats: ConnectionStats,
}

impl<S> ConnectionHandler<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    pub fn new(
        stream: S,
        peer: SocketAddr,
        config: &GatewayConfig,
        sink: Arc<dyn LocationSink>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            stream,
            peer,
            session: config.new_session(),
            sink,
            idle_timeout: config.idle_timeout(),
            read_buffer_size: config.read_buffer_size,
            cancel,
            stats: ConnectionStats::default(),
        }
    }

    /// Serve the connection until the peer closes, goes idle, fails, or the
    /// token is cancelled.
    pub async fn run(mut self) -> ConnectionReport {
        info!(peer = %self.peer, "Tracker connected");
        let mut buf = vec![0u8; self.read_buffer_size];

        let reason = loop {
            let read = tokio::select! {
                _ = self.cancel.cancelled() => break CloseReason::Cancelled,
                read = read_chunk(&mut self.stream, &mut buf, self.idle_timeout) => read,
            };

            match read {
                Ok(0) => break CloseReason::PeerClosed,
                Ok(n) => {
                    if let Err(error) = self.handle_chunk(&buf[..n]).await {
                        break CloseReason::Error(error);
                    }
                }
                Err(GatewayError::Timeout { .. }) => break CloseReason::IdleTimeout,
                Err(error) => break CloseReason::Error(error),
            }
        };

        let stats = self.stats;
        match &reason {
            CloseReason::Error(error) => warn!(
                peer = %self.peer,
                device = ?self.session.identity().map(|d| d.value()),
                %error,
                ?stats,
                "Tracker connection failed"
            ),
            reason => info!(
                peer = %self.peer,
                device = ?self.session.identity().map(|d| d.value()),
                ?reason,
                ?stats,
                "Tracker disconnected"
            ),
        }

        ConnectionReport { peer: self.peer, stats, reason }
    }

    /// Decode one chunk, acknowledge its frames and forward its fixes.
    ///
    /// Only socket write failures are returned; everything else is logged.
    async fn handle_chunk(&mut self, chunk: &[u8]) -> Result<()> {
        self.stats.chunks_received += 1;

        if let Err(error) = self.session.receive(chunk) {
            self.stats.chunks_rejected += 1;
            warn!(peer = %self.peer, %error, "Rejecting chunk");
        }

        let mut acked = false;
        while let Some(outcome) = self.session.process_next() {
            match outcome {
                FrameOutcome::Decoded { kind, ack } => {
                    self.stats.frames_decoded += 1;
                    if let Some(ack) = ack {
                        self.stream
                            .write_all(&ack)
                            .await
                            .map_err(|e| GatewayError::io_error("writing acknowledgement", e))?;
                        self.stats.acks_sent += 1;
                        acked = true;
                        debug!(peer = %self.peer, %kind, "Acknowledged frame");
                    }
                }
                FrameOutcome::Skipped(_) => self.stats.frames_skipped += 1,
            }
        }

        if acked {
            self.stream
                .flush()
                .await
                .map_err(|e| GatewayError::io_error("flushing acknowledgements", e))?;
        }

        self.forward_events().await;
        Ok(())
    }

    /// Drain the session's events and store their location fixes.
    async fn forward_events(&mut self) {
        for event in self.session.drain_events() {
            let record = match LocationRecord::from_event(&event) {
                Ok(Some(record)) => record,
                Ok(None) => continue,
                Err(error) => {
                    self.stats.fixes_quarantined += 1;
                    warn!(peer = %self.peer, %error, "Quarantining location fix");
                    continue;
                }
            };

            match self.sink.store_location_fix(record).await {
                Ok(()) => self.stats.fixes_forwarded += 1,
                Err(error) => {
                    self.stats.sink_failures += 1;
                    warn!(peer = %self.peer, %error, "Failed to store location fix");
                }
            }
        }
    }
}

/// Read once, failing with [`GatewayError::Timeout`] after `idle` of silence.
async fn read_chunk<S>(stream: &mut S, buf: &mut [u8], idle: Option<Duration>) -> Result<usize>
where
    S: AsyncRead + Unpin,
{
    let read = stream.read(buf);
    let result = match idle {
        Some(duration) => tokio::time::timeout(duration, read)
            .await
            .map_err(|_| GatewayError::Timeout { duration })?,
        None => read.await,
    };
    result.map_err(|e| GatewayError::io_error("reading from tracker", e))
}
