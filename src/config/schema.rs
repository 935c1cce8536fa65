//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the server.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

use crate::config::address::{AddressError, BindTarget};

/// Root configuration for the server.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ServerConfig {
    /// Listening address and port.
    pub http: HttpConfig,

    /// File watching.
    pub watch: WatchConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Host to bind, or `<network>:<address>` when `port` is 0.
    pub addr: String,

    /// TCP port. 0 selects the `<network>:<address>` form of `addr`.
    pub port: u16,
}

impl HttpConfig {
    /// Resolve the listen address. A non-zero `port_override` replaces `port`.
    pub fn bind_target(&self, port_override: u16) -> Result<BindTarget, AddressError> {
        let port = if port_override != 0 { port_override } else { self.port };
        BindTarget::resolve(&self.addr, port)
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            addr: String::new(),
            port: 9000,
        }
    }
}

/// File watching configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Insert the watch filter at the front of the chain.
    pub enabled: bool,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error) or a full filter directive.
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
