//! Listening socket: fresh bind, inherited descriptor, accept and close.
//!
//! # Responsibilities
//! - Bind to the resolved target (TCP of any family, or a Unix socket path)
//! - Adopt a listening descriptor inherited from a predecessor process
//! - Accept incoming connections
//! - Close exactly once, reporting failure

use std::io;
use std::os::fd::{AsRawFd, FromRawFd, RawFd};
use std::path::PathBuf;
use tokio::net::{TcpListener, UnixListener};

use crate::config::{BindTarget, Network};
use crate::net::connection::{Connection, PeerAddr, Stream};

/// Error type for listener operations.
#[derive(Debug)]
pub enum ListenerError {
    /// Failed to bind to address.
    Bind(io::Error),
    /// Failed to adopt an inherited descriptor.
    Inherit(io::Error),
    /// Failed to accept connection.
    Accept(io::Error),
    /// Failed to release the socket.
    Close(io::Error),
}

impl std::fmt::Display for ListenerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ListenerError::Bind(e) => write!(f, "Failed to bind: {}", e),
            ListenerError::Inherit(e) => write!(f, "Failed to inherit listener: {}", e),
            ListenerError::Accept(e) => write!(f, "Failed to accept: {}", e),
            ListenerError::Close(e) => write!(f, "Failed to close listener: {}", e),
        }
    }
}

impl std::error::Error for ListenerError {}

/// A listening descriptor passed in by a predecessor process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InheritedSocket {
    pub fd: RawFd,
    pub network: Network,
}

#[derive(Debug)]
enum ListenerKind {
    Tcp(TcpListener),
    Unix {
        inner: UnixListener,
        path: Option<PathBuf>,
    },
}

/// The process's listening socket.
#[derive(Debug)]
pub struct Listener {
    kind: ListenerKind,
    network: Network,
}

impl Listener {
    /// Bind a fresh socket.
    pub async fn bind(target: &BindTarget) -> Result<Self, ListenerError> {
        let kind = match target.network {
            Network::Tcp => {
                let listener = TcpListener::bind(&target.address)
                    .await
                    .map_err(ListenerError::Bind)?;
                ListenerKind::Tcp(listener)
            }
            Network::Tcp4 | Network::Tcp6 => {
                ListenerKind::Tcp(bind_family(&target.address, target.network).await?)
            }
            Network::Unix => {
                let path = target
                    .unix_path()
                    .ok_or_else(|| ListenerError::Bind(io::ErrorKind::InvalidInput.into()))?;
                let inner = UnixListener::bind(&path).map_err(ListenerError::Bind)?;
                ListenerKind::Unix {
                    inner,
                    path: Some(path),
                }
            }
        };

        let listener = Self {
            kind,
            network: target.network,
        };
        tracing::debug!(address = %listener.local_addr(), "Listener bound");
        Ok(listener)
    }

    /// Adopt an inherited listening descriptor.
    ///
    /// # Safety
    ///
    /// `socket.fd` must be an open listening socket of the given network that
    /// nothing else in this process owns. The returned listener takes ownership.
    pub unsafe fn from_inherited(socket: InheritedSocket) -> Result<Self, ListenerError> {
        let kind = if socket.network.is_tcp() {
            // SAFETY: ownership of the descriptor is guaranteed by the caller.
            let std = unsafe { std::net::TcpListener::from_raw_fd(socket.fd) };
            std.set_nonblocking(true).map_err(ListenerError::Inherit)?;
            ListenerKind::Tcp(TcpListener::from_std(std).map_err(ListenerError::Inherit)?)
        } else {
            // SAFETY: as above.
            let std = unsafe { std::os::unix::net::UnixListener::from_raw_fd(socket.fd) };
            std.set_nonblocking(true).map_err(ListenerError::Inherit)?;
            let path = std
                .local_addr()
                .ok()
                .and_then(|addr| addr.as_pathname().map(|p| p.to_path_buf()));
            ListenerKind::Unix {
                inner: UnixListener::from_std(std).map_err(ListenerError::Inherit)?,
                path,
            }
        };

        Ok(Self {
            kind,
            network: socket.network,
        })
    }

    /// Accept the next connection.
    pub async fn accept(&self) -> Result<Connection, ListenerError> {
        let connection = match &self.kind {
            ListenerKind::Tcp(listener) => {
                let (stream, addr) = listener.accept().await.map_err(ListenerError::Accept)?;
                Connection::new(Stream::Tcp(stream), PeerAddr::Tcp(addr))
            }
            ListenerKind::Unix { inner, .. } => {
                let (stream, _) = inner.accept().await.map_err(ListenerError::Accept)?;
                Connection::new(Stream::Unix(stream), PeerAddr::Unix)
            }
        };

        tracing::trace!(
            connection_id = %connection.id,
            peer_addr = %connection.peer,
            "Connection accepted"
        );
        metrics::counter!("stagehand_connections_total").increment(1);

        Ok(connection)
    }

    /// Human-readable local address, e.g. `127.0.0.1:9000` or `unix:/tmp/app.socket`.
    pub fn local_addr(&self) -> String {
        match &self.kind {
            ListenerKind::Tcp(listener) => listener
                .local_addr()
                .map(|addr| addr.to_string())
                .unwrap_or_else(|_| "tcp:?".to_string()),
            ListenerKind::Unix { path, .. } => match path {
                Some(path) => format!("unix:{}", path.display()),
                None => "unix:?".to_string(),
            },
        }
    }

    /// Transport of this listener.
    pub fn network(&self) -> Network {
        self.network
    }

    /// Close the socket. Unix socket files are removed when `unlink` is set.
    pub fn close(self, unlink: bool) -> Result<(), ListenerError> {
        match self.kind {
            ListenerKind::Tcp(listener) => {
                drop(listener.into_std().map_err(ListenerError::Close)?);
            }
            ListenerKind::Unix { inner, path } => {
                drop(inner.into_std().map_err(ListenerError::Close)?);
                if let (true, Some(path)) = (unlink, path) {
                    match std::fs::remove_file(&path) {
                        Ok(()) => {}
                        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                        Err(e) => return Err(ListenerError::Close(e)),
                    }
                }
            }
        }
        Ok(())
    }
}

impl AsRawFd for Listener {
    fn as_raw_fd(&self) -> RawFd {
        match &self.kind {
            ListenerKind::Tcp(listener) => listener.as_raw_fd(),
            ListenerKind::Unix { inner, .. } => inner.as_raw_fd(),
        }
    }
}

/// Bind TCP on the first resolved address of the requested family.
async fn bind_family(address: &str, network: Network) -> Result<TcpListener, ListenerError> {
    let want_v4 = network == Network::Tcp4;
    let mut last_err = None;

    for addr in tokio::net::lookup_host(address)
        .await
        .map_err(ListenerError::Bind)?
        .filter(|addr| addr.is_ipv4() == want_v4)
    {
        match TcpListener::bind(addr).await {
            Ok(listener) => return Ok(listener),
            Err(e) => last_err = Some(e),
        }
    }

    Err(ListenerError::Bind(last_err.unwrap_or_else(|| {
        io::Error::new(
            io::ErrorKind::AddrNotAvailable,
            format!("no {} address for {}", network, address),
        )
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn socket_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("stagehand-{}-{}.sock", name, std::process::id()))
    }

    #[tokio::test]
    async fn binds_tcp_and_accepts() {
        let target = BindTarget::resolve("tcp:127.0.0.1:0", 0).unwrap();
        let listener = Listener::bind(&target).await.unwrap();
        let addr = listener.local_addr();

        let client = tokio::spawn(async move { tokio::net::TcpStream::connect(addr).await });
        let connection = listener.accept().await.unwrap();
        client.await.unwrap().unwrap();

        assert!(matches!(connection.stream, Stream::Tcp(_)));
        assert!(matches!(connection.peer, PeerAddr::Tcp(_)));
        listener.close(true).unwrap();
    }

    #[tokio::test]
    async fn tcp4_rejects_ipv6_only_host() {
        let target = BindTarget::resolve("tcp4:[::1]:0", 0).unwrap();
        let err = Listener::bind(&target).await.unwrap_err();
        assert!(matches!(err, ListenerError::Bind(_)));
    }

    #[tokio::test]
    async fn unix_close_unlinks_path() {
        let path = socket_path("unlink");
        let _ = std::fs::remove_file(&path);
        let target = BindTarget::resolve(&format!("unix:{}", path.display()), 0).unwrap();

        let listener = Listener::bind(&target).await.unwrap();
        assert_eq!(listener.network(), Network::Unix);
        assert!(path.exists());

        listener.close(true).unwrap();
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn unix_close_keeps_path_for_successor() {
        let path = socket_path("keep");
        let _ = std::fs::remove_file(&path);
        let target = BindTarget::resolve(&format!("unix:{}", path.display()), 0).unwrap();

        let listener = Listener::bind(&target).await.unwrap();
        listener.close(false).unwrap();
        assert!(path.exists());
        std::fs::remove_file(&path).unwrap();
    }

    #[tokio::test]
    async fn adopts_inherited_descriptor() {
        use std::os::fd::IntoRawFd;

        let std = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let expected = std.local_addr().unwrap().to_string();
        let fd = std.into_raw_fd();

        let listener = unsafe {
            Listener::from_inherited(InheritedSocket {
                fd,
                network: Network::Tcp,
            })
        }
        .unwrap();

        assert_eq!(listener.local_addr(), expected);
        assert_eq!(listener.as_raw_fd(), fd);
        listener.close(true).unwrap();
    }
}
