//! Gateway configuration
//!
//! Configuration is read from YAML (every key optional) and then overridden
//! from the environment:
//!
//! ```yaml
//! host: 0.0.0.0
//! port: 5023
//! idle_timeout_secs: 600
//! read_buffer_size: 1024
//! max_buffered_bytes: 4096
//! reassemble_fragments: true
//! ```
//!
//! | Variable | Overrides |
//! |----------|-----------|
//! | `TCP_PORT` | `port` |
//! | `GT06_HOST` | `host` |

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::protocol::MAX_FRAME_LEN;
use crate::session::Session;
use crate::{GatewayError, Result};

/// Default tracker port
pub const DEFAULT_PORT: u16 = 5023;

pub const PORT_ENV: &str = "TCP_PORT";
pub const HOST_ENV: &str = "GT06_HOST";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GatewayConfig {
    /// Address to listen on
    pub host: IpAddr,
    pub port: u16,
    /// Close connections silent for this long; `None` disables the timeout
    pub idle_timeout_secs: Option<u64>,
    /// Size of each socket read
    pub read_buffer_size: usize,
    /// Cap on bytes held for reassembly; at least `read_buffer_size` plus one maximal frame
    pub max_buffered_bytes: usize,
    /// Reassemble frames split across reads; `false` splits each read on its own
    pub reassemble_fragments: bool,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            idle_timeout_secs: Some(600),
            read_buffer_size: 1024,
            max_buffered_bytes: 4 * 1024,
            reassemble_fragments: true,
        }
    }
}

impl GatewayConfig {
    /// Parse YAML configuration.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self = serde_yaml_ng::from_str(yaml).map_err(|e| {
            GatewayError::config_error_with_source("invalid YAML configuration", Box::new(e))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a YAML configuration file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path).map_err(|e| {
            GatewayError::io_error(format!("reading configuration {}", path.display()), e)
        })?;
        debug!("Loaded configuration from {}", path.display());
        Self::from_yaml_str(&yaml)
    }

    /// Apply `TCP_PORT` and `GT06_HOST` from the process environment.
    pub fn with_env_overrides(self) -> Result<Self> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary variable lookup.
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = lookup(PORT_ENV) {
            self.port = port.trim().parse().map_err(|e| {
                GatewayError::config_error_with_source(
                    format!("{}={:?} is not a port number", PORT_ENV, port),
                    Box::new(e),
                )
            })?;
        }
        if let Some(host) = lookup(HOST_ENV) {
            self.host = host.trim().parse().map_err(|e| {
                GatewayError::config_error_with_source(
                    format!("{}={:?} is not an IP address", HOST_ENV, host),
                    Box::new(e),
                )
            })?;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        if self.read_buffer_size == 0 {
            return Err(GatewayError::config_error("read_buffer_size must be positive"));
        }
        // An incomplete tail is shorter than one frame, so a full read always fits after it.
        let min_buffered = self.read_buffer_size.saturating_add(MAX_FRAME_LEN);
        if self.reassemble_fragments && self.max_buffered_bytes < min_buffered {
            return Err(GatewayError::config_error(format!(
                "max_buffered_bytes must hold one read plus one full frame ({} bytes)",
                min_buffered
            )));
        }
        if self.idle_timeout_secs == Some(0) {
            return Err(GatewayError::config_error("idle_timeout_secs must be positive when set"));
        }
        Ok(())
    }

    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    pub fn idle_timeout(&self) -> Option<Duration> {
        self.idle_timeout_secs.map(Duration::from_secs)
    }

    /// Fresh decoder state for a new connection.
    pub fn new_session(&self) -> Session {
        if self.reassemble_fragments {
            Session::reassembling(self.max_buffered_bytes)
        } else {
            Session::per_read()
        }
    }
}
