//! TCP ingestion core for GT06-family GPS trackers.
//!
//! Trackers open a long-lived TCP connection and push binary frames: a login
//! carrying the device IMEI, periodic location fixes, heartbeats and alarms.
//! This crate reassembles those frames from the byte stream, validates their
//! CRC-ITU checksum, decodes them into typed events, acknowledges the frames
//! that require it and hands identified location fixes to a [`LocationSink`].
//!
//! # Layers
//!
//! - [`protocol`]: framing, checksum, field decoding and acknowledgements. Pure
//!   functions over byte slices, no I/O.
//! - [`session`]: per-connection state (bound identity, pending frames).
//! - [`connection`]: drives one session over any `AsyncRead + AsyncWrite` stream.
//! - [`server`]: the TCP accept loop.
//!
//! # Example
//!
//! ```rust,no_run
//! use gt06_gateway::{Gateway, GatewayConfig, LoggingSink};
//!
//! #[tokio::main]
//! async fn main() -> gt06_gateway::Result<()> {
//!     let config = GatewayConfig::default().with_env_overrides()?;
//!     let handle = Gateway::bind(config, LoggingSink).await?.spawn()?;
//!
//!     tokio::signal::ctrl_c().await?;
//!     handle.shutdown().await
//! }
//! ```

mod error;
#[cfg(any(test, feature = "benchmark"))]
pub mod test_utils;

pub mod config;
pub mod connection;
pub mod protocol;
pub mod server;
pub mod session;
pub mod sink;
pub mod types;

pub use error::*;
pub use types::*;

pub use config::GatewayConfig;
pub use connection::{CloseReason, ConnectionHandler, ConnectionReport, ConnectionStats};
pub use server::{Server, ServerHandle};
pub use session::Session;
pub use sink::{ChannelSink, LocationRecord, LocationSink, LocationStream, LoggingSink};

use std::sync::Arc;

/// Entry point for running the gateway.
pub struct Gateway;

impl Gateway {
    /// Bind a listener for `config` that forwards fixes to `sink`.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the address cannot be bound.
    pub async fn bind<K: LocationSink>(config: GatewayConfig, sink: K) -> Result<Server> {
        Server::bind(config, Arc::new(sink)).await
    }

    /// Bind and serve until the process is interrupted with Ctrl-C.
    pub async fn serve<K: LocationSink>(config: GatewayConfig, sink: K) -> Result<()> {
        let handle = Self::bind(config, sink).await?.spawn()?;
        tokio::signal::ctrl_c()
            .await
            .map_err(|e| GatewayError::io_error("waiting for interrupt", e))?;
        tracing::info!("Interrupt received, shutting down");
        handle.shutdown().await
    }
}
