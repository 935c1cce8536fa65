//! OS signal handling.
//!
//! # Signals
//! - SIGTERM / SIGINT → [`LifecycleSignal::Terminate`]: drain and exit
//! - SIGUSR2 → [`LifecycleSignal::Restart`]: spawn a successor that inherits the listener
//! - SIGQUIT → [`LifecycleSignal::Superseded`]: the successor is serving, drain and exit
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - Signals are forwarded over a channel so the lifecycle manager can be
//!   driven by something other than the OS in tests

use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::mpsc;

/// Lifecycle events the manager reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleSignal {
    /// Stop accepting, drain, exit.
    Terminate,
    /// Hand the listener to a new process image and keep serving until superseded.
    Restart,
    /// A successor has taken over the listener; drain and exit.
    Superseded,
}

/// Install the signal handlers and forward them as [`LifecycleSignal`]s.
pub fn listen() -> std::io::Result<mpsc::Receiver<LifecycleSignal>> {
    let mut terminate = signal(SignalKind::terminate())?;
    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut restart = signal(SignalKind::user_defined2())?;
    let mut quit = signal(SignalKind::quit())?;

    let (tx, rx) = mpsc::channel(8);
    tokio::spawn(async move {
        loop {
            let event = tokio::select! {
                _ = terminate.recv() => LifecycleSignal::Terminate,
                _ = interrupt.recv() => LifecycleSignal::Terminate,
                _ = restart.recv() => LifecycleSignal::Restart,
                _ = quit.recv() => LifecycleSignal::Superseded,
            };
            tracing::info!(signal = ?event, "Signal received");
            if tx.send(event).await.is_err() {
                break;
            }
        }
    });

    Ok(rx)
}
