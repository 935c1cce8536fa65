//! Fatal server errors.

use thiserror::Error;

use crate::config::AddressError;
use crate::lifecycle::handoff::HandoffError;
use crate::net::ListenerError;
use crate::watch::WatchError;

/// An error that stops the server. `main` logs it and exits non-zero.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("invalid listen address: {0}")]
    Address(#[from] AddressError),
    #[error("failed to acquire listener: {0}")]
    Bind(ListenerError),
    #[error("handoff failed: {0}")]
    Handoff(#[from] HandoffError),
    #[error(transparent)]
    Watch(#[from] WatchError),
    #[error("failed to install signal handlers: {0}")]
    Signals(std::io::Error),
    #[error("failed to serve: {0}")]
    Serve(ListenerError),
    #[error("accept loop stopped unexpectedly")]
    AcceptStopped,
    #[error("accept task failed: {0}")]
    AcceptTask(#[from] tokio::task::JoinError),
    #[error("failed to close listener: {0}")]
    Close(ListenerError),
}
