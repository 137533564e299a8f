//! Error types for GT06 ingestion.
//!
//! Every error in this crate is locally recoverable. The variants fall into
//! the classes a connection handler has to tell apart:
//!
//! - **Frame-local**: checksum mismatch, unknown message type, truncated
//!   payload, invalid field. The offending frame is skipped and its siblings
//!   in the same chunk are still decoded.
//! - **Chunk-level**: a chunk that does not begin with the start marker, or a
//!   reassembly buffer that overflowed. The chunk is dropped, the connection
//!   stays open.
//! - **Transport**: socket errors and idle timeouts. The session is released.
//! - **Downstream**: the location sink rejected a record. Logged, not retried.
//!
//! ```rust
//! use gt06_gateway::GatewayError;
//!
//! let error = GatewayError::ChecksumMismatch { computed: 0x8CDD, found: 0x0000 };
//! assert!(error.is_frame_local());
//! for suggestion in error.recovery_suggestions() {
//!     println!("  - {}", suggestion);
//! }
//! ```

use std::time::Duration;
use thiserror::Error;

/// Result type alias for gateway operations.
pub type Result<T, E = GatewayError> = std::result::Result<T, E>;

/// Main error type for gateway operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum GatewayError {
    #[error("Chunk of {len} bytes does not begin with the 0x7878 start marker")]
    MissingStartMarker { len: usize },

    #[error("Checksum mismatch: computed {computed:#06x}, frame carries {found:#06x}")]
    ChecksumMismatch { computed: u16, found: u16 },

    #[error("Unknown message type {code:#04x}")]
    UnknownMessageType { code: u8 },

    #[error("Truncated {context}: need {needed} bytes, have {available}")]
    Truncated { context: String, needed: usize, available: usize },

    #[error("Invalid {field}: {details}")]
    InvalidField { field: String, details: String },

    #[error("Reassembly buffer exceeded {capacity} bytes")]
    BufferOverflow { capacity: usize },

    #[error("I/O error during {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Location sink failed: {reason}")]
    Sink {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Configuration error: {reason}")]
    Config {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("No data received for {duration:?}")]
    Timeout { duration: Duration },

    #[error("Location fix received before any login on this connection")]
    UnidentifiedDevice,
}

impl GatewayError {
    /// Returns whether this error concerns a single frame only.
    ///
    /// Frame-local errors skip the offending frame; decoding continues with the
    /// next candidate frame of the same chunk.
    pub fn is_frame_local(&self) -> bool {
        matches!(
            self,
            GatewayError::ChecksumMismatch { .. }
                | GatewayError::UnknownMessageType { .. }
                | GatewayError::Truncated { .. }
                | GatewayError::InvalidField { .. }
        )
    }

    /// Returns whether this error is potentially recoverable through retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            GatewayError::Io { .. } => true,
            GatewayError::Sink { .. } => true,
            GatewayError::Timeout { .. } => true,
            GatewayError::MissingStartMarker { .. } => false,
            GatewayError::ChecksumMismatch { .. } => false,
            GatewayError::UnknownMessageType { .. } => false,
            GatewayError::Truncated { .. } => false,
            GatewayError::InvalidField { .. } => false,
            GatewayError::BufferOverflow { .. } => false,
            GatewayError::Config { .. } => false,
            GatewayError::UnidentifiedDevice => false,
        }
    }

    /// Returns suggested recovery actions for this error.
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            GatewayError::MissingStartMarker { .. } => vec![
                "Check that the device speaks the GT06 protocol",
                "Verify nothing else is connecting to the tracker port",
            ],
            GatewayError::ChecksumMismatch { .. } => vec![
                "Check for line noise on the device uplink",
                "Verify the device firmware uses CRC-ITU checksums",
            ],
            GatewayError::UnknownMessageType { .. } => vec![
                "Check the device firmware protocol variant",
                "Disable unsupported report types on the device",
            ],
            GatewayError::Truncated { .. } => vec![
                "Verify the frame length byte matches the payload",
                "Enable fragment reassembly",
            ],
            GatewayError::InvalidField { .. } => vec![
                "Check device clock and IMEI configuration",
                "Verify source data integrity",
            ],
            GatewayError::BufferOverflow { .. } => vec![
                "Increase max_buffered_bytes",
                "Check the device is not streaming garbage",
            ],
            GatewayError::Io { .. } => vec![
                "Check network connectivity to the device",
                "Verify the listen port is not in use",
            ],
            GatewayError::Sink { .. } => vec![
                "Check the persistence backend is reachable",
                "Inspect sink logs for rejected records",
            ],
            GatewayError::Config { .. } => vec![
                "Check the configuration file syntax",
                "Verify TCP_PORT is a valid port number",
            ],
            GatewayError::Timeout { .. } => vec![
                "Increase idle_timeout_secs",
                "Check the device heartbeat interval",
            ],
            GatewayError::UnidentifiedDevice => vec![
                "Wait for the device to send a login frame",
                "Check the device reconnects with a login after power cycles",
            ],
        }
    }

    /// Helper constructor for truncated payload errors.
    pub fn truncated(context: impl Into<String>, needed: usize, available: usize) -> Self {
        GatewayError::Truncated { context: context.into(), needed, available }
    }

    /// Helper constructor for invalid field errors.
    pub fn invalid_field(field: impl Into<String>, details: impl Into<String>) -> Self {
        GatewayError::InvalidField { field: field.into(), details: details.into() }
    }

    /// Helper constructor for I/O errors with context.
    pub fn io_error(context: impl Into<String>, source: std::io::Error) -> Self {
        GatewayError::Io { context: context.into(), source }
    }

    /// Helper constructor for sink errors.
    pub fn sink_failed(reason: impl Into<String>) -> Self {
        GatewayError::Sink { reason: reason.into(), source: None }
    }

    /// Helper constructor for sink errors with source.
    pub fn sink_failed_with_source(
        reason: impl Into<String>,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        GatewayError::Sink { reason: reason.into(), source: Some(source) }
    }

    /// Helper constructor for configuration errors.
    pub fn config_error(reason: impl Into<String>) -> Self {
        GatewayError::Config { reason: reason.into(), source: None }
    }

    /// Helper constructor for configuration errors with source.
    pub fn config_error_with_source(
        reason: impl Into<String>,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        GatewayError::Config { reason: reason.into(), source: Some(source) }
    }
}

impl From<std::io::Error> for GatewayError {
    fn from(err: std::io::Error) -> Self {
        GatewayError::Io { context: "<unknown>".to_string(), source: err }
    }
}
