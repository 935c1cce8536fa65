//! Listener handoff between process images.
//!
//! # Protocol ([`EnvHandoff`])
//! ```text
//! old process (SIGUSR2)
//!     → clear FD_CLOEXEC on the listener, spawn current_exe with
//!       STAGEHAND_LISTEN_FD / STAGEHAND_LISTEN_NETWORK / STAGEHAND_PPID
//!     → keep serving
//! new process
//!     → adopt the fd, start the accept loop
//!     → SIGQUIT to STAGEHAND_PPID once serving
//! old process (SIGQUIT)
//!     → close listener, drain, exit
//! ```
//!
//! The manager only sees the [`Handoff`] trait, so another mechanism
//! (systemd socket activation, SCM_RIGHTS) can be plugged in instead.

use std::io;
use std::os::fd::RawFd;
use std::process::Command;

use nix::errno::Errno;
use nix::fcntl::{fcntl, FcntlArg, FdFlag};
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use thiserror::Error;

use crate::config::Network;
use crate::net::InheritedSocket;

/// Variable holding the inherited listener's descriptor number.
pub const LISTEN_FD_VAR: &str = "STAGEHAND_LISTEN_FD";
/// Variable holding the inherited listener's network (`tcp` or `unix`).
pub const LISTEN_NETWORK_VAR: &str = "STAGEHAND_LISTEN_NETWORK";
/// Variable holding the pid of the process that spawned us.
pub const PPID_VAR: &str = "STAGEHAND_PPID";

/// Errors raised by the handoff protocol.
#[derive(Debug, Error)]
pub enum HandoffError {
    #[error("invalid {name}={value:?}")]
    InvalidVar { name: &'static str, value: String },
    #[error("listener descriptor: {0}")]
    Descriptor(Errno),
    #[error("failed to signal predecessor: {0}")]
    Signal(Errno),
    #[error("failed to spawn successor: {0}")]
    Spawn(io::Error),
    #[error("restart is not supported by this handoff")]
    Unsupported,
}

/// Socket inheritance across process images.
pub trait Handoff: Send + Sync {
    /// The listener passed in by a predecessor, if any.
    fn inherited(&self) -> Result<Option<InheritedSocket>, HandoffError>;

    /// Tell the predecessor to stop. Called only once this process is serving.
    fn kill_predecessor(&self) -> Result<(), HandoffError>;

    /// Start a successor that inherits `socket`. Returns its pid.
    fn spawn_successor(&self, socket: InheritedSocket) -> Result<u32, HandoffError>;
}

/// Handoff through environment variables and descriptor inheritance.
#[derive(Debug, Clone, Default)]
pub struct EnvHandoff {
    fd: Option<String>,
    network: Option<String>,
    ppid: Option<String>,
}

impl EnvHandoff {
    /// Read the handoff variables from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            fd: lookup(LISTEN_FD_VAR),
            network: lookup(LISTEN_NETWORK_VAR),
            ppid: lookup(PPID_VAR),
        }
    }

    fn predecessor(&self) -> Result<Option<Pid>, HandoffError> {
        self.ppid
            .as_deref()
            .map(|raw| {
                raw.parse::<i32>()
                    .ok()
                    .filter(|pid| *pid > 0)
                    .map(Pid::from_raw)
                    .ok_or_else(|| invalid(PPID_VAR, raw))
            })
            .transpose()
    }
}

impl Handoff for EnvHandoff {
    fn inherited(&self) -> Result<Option<InheritedSocket>, HandoffError> {
        let Some(raw_fd) = self.fd.as_deref() else {
            return Ok(None);
        };

        let fd: RawFd = raw_fd
            .parse()
            .ok()
            .filter(|fd| *fd > 2)
            .ok_or_else(|| invalid(LISTEN_FD_VAR, raw_fd))?;

        let network = match self.network.as_deref() {
            None | Some("tcp") => Network::Tcp,
            Some("unix") => Network::Unix,
            Some(other) => return Err(invalid(LISTEN_NETWORK_VAR, other)),
        };

        // Also proves the descriptor is open.
        set_cloexec(fd, true)?;

        Ok(Some(InheritedSocket { fd, network }))
    }

    fn kill_predecessor(&self) -> Result<(), HandoffError> {
        let Some(ppid) = self.predecessor()? else {
            tracing::warn!("Inherited a listener without {}; not signalling", PPID_VAR);
            return Ok(());
        };

        if Pid::parent() != ppid {
            tracing::warn!(
                predecessor = %ppid,
                parent = %Pid::parent(),
                "Predecessor is no longer our parent; not signalling"
            );
            return Ok(());
        }

        kill(ppid, Signal::SIGQUIT).map_err(HandoffError::Signal)?;
        tracing::info!(predecessor = %ppid, "Signalled predecessor to drain");
        Ok(())
    }

    fn spawn_successor(&self, socket: InheritedSocket) -> Result<u32, HandoffError> {
        let exe = std::env::current_exe().map_err(HandoffError::Spawn)?;
        let network = if socket.network.is_tcp() { "tcp" } else { "unix" };

        set_cloexec(socket.fd, false)?;
        let spawned = Command::new(exe)
            .args(std::env::args_os().skip(1))
            .env(LISTEN_FD_VAR, socket.fd.to_string())
            .env(LISTEN_NETWORK_VAR, network)
            .env(PPID_VAR, std::process::id().to_string())
            .spawn();
        let restored = set_cloexec(socket.fd, true);

        let child = spawned.map_err(HandoffError::Spawn)?;
        restored?;
        Ok(child.id())
    }
}

/// No predecessor, no successor. Restart requests are refused.
#[derive(Debug, Clone, Copy, Default)]
pub struct Standalone;

impl Handoff for Standalone {
    fn inherited(&self) -> Result<Option<InheritedSocket>, HandoffError> {
        Ok(None)
    }

    fn kill_predecessor(&self) -> Result<(), HandoffError> {
        Ok(())
    }

    fn spawn_successor(&self, _socket: InheritedSocket) -> Result<u32, HandoffError> {
        Err(HandoffError::Unsupported)
    }
}

fn invalid(name: &'static str, value: &str) -> HandoffError {
    HandoffError::InvalidVar {
        name,
        value: value.to_string(),
    }
}

fn set_cloexec(fd: RawFd, enabled: bool) -> Result<(), HandoffError> {
    let bits = fcntl(fd, FcntlArg::F_GETFD).map_err(HandoffError::Descriptor)?;
    let mut flags = FdFlag::from_bits_truncate(bits);
    flags.set(FdFlag::FD_CLOEXEC, enabled);
    fcntl(fd, FcntlArg::F_SETFD(flags)).map_err(HandoffError::Descriptor)?;
    Ok(())
}
