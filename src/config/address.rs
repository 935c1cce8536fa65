//! Bind address resolution.
//!
//! A non-zero port always means TCP on `host:port`. With port 0 the
//! configured address carries its own transport as `<network>:<address>`,
//! e.g. `unix:/tmp/app.socket` or `tcp6:[::1]:9000`.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Transport a listener binds on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Network {
    /// TCP over any address family.
    Tcp,
    /// TCP restricted to IPv4.
    Tcp4,
    /// TCP restricted to IPv6.
    Tcp6,
    /// Unix domain stream socket.
    Unix,
}

impl Network {
    /// Name as written in configuration.
    pub fn as_str(&self) -> &'static str {
        match self {
            Network::Tcp => "tcp",
            Network::Tcp4 => "tcp4",
            Network::Tcp6 => "tcp6",
            Network::Unix => "unix",
        }
    }

    /// Whether this is one of the TCP variants.
    pub fn is_tcp(&self) -> bool {
        !matches!(self, Network::Unix)
    }
}

impl std::str::FromStr for Network {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "tcp" => Ok(Network::Tcp),
            "tcp4" => Ok(Network::Tcp4),
            "tcp6" => Ok(Network::Tcp6),
            "unix" => Ok(Network::Unix),
            other => Err(AddressError::UnsupportedNetwork(other.to_string())),
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors produced while resolving a bind target.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AddressError {
    /// Port 0 with an address that lacks the `<network>:` prefix.
    #[error("address {0:?} must be of the form <network>:<address> when no port is set")]
    MissingNetwork(String),
    /// Unknown network prefix.
    #[error("unsupported network {0:?} (expected tcp, tcp4, tcp6 or unix)")]
    UnsupportedNetwork(String),
    /// Network prefix with nothing after it.
    #[error("empty local address for network {0}")]
    EmptyAddress(Network),
}

/// Where the listener should bind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindTarget {
    /// Transport.
    pub network: Network,
    /// Address in the transport's own notation (`host:port` or a path).
    pub address: String,
}

impl BindTarget {
    /// Resolve the configured address and port into a bind target.
    pub fn resolve(address: &str, port: u16) -> Result<Self, AddressError> {
        if port != 0 {
            let host = if address.is_empty() { "0.0.0.0" } else { address };
            return Ok(Self {
                network: Network::Tcp,
                address: format!("{}:{}", host, port),
            });
        }

        let (network, local) = address
            .split_once(':')
            .ok_or_else(|| AddressError::MissingNetwork(address.to_string()))?;
        let network: Network = network.parse()?;
        if local.is_empty() {
            return Err(AddressError::EmptyAddress(network));
        }

        Ok(Self {
            network,
            address: local.to_string(),
        })
    }

    /// Socket path for Unix targets.
    pub fn unix_path(&self) -> Option<PathBuf> {
        match self.network {
            Network::Unix => Some(PathBuf::from(&self.address)),
            _ => None,
        }
    }
}

impl fmt::Display for BindTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.network, self.address)
    }
}
