//! Listener lifecycle.
//!
//! # Responsibilities
//! - Acquire the listener: adopt an inherited socket or bind a fresh one
//! - Run startup hooks, then serve until told to stop
//! - Hand the socket to a successor on restart
//! - Close the listener, wait for open connections and in-flight work,
//!   run shutdown hooks
//!
//! # Design Decisions
//! - Every failure here is fatal and returned to `main`
//! - Startup hooks run after the socket is acquired and before any request
//!   is accepted, so a bind failure never runs them
//! - The predecessor is signalled only once the accept loop is running

use std::os::fd::AsRawFd;
use std::sync::Arc;

use axum::Router;
use tokio::sync::{mpsc, oneshot, watch};

use crate::config::BindTarget;
use crate::error::ServerError;
use crate::http::server;
use crate::lifecycle::handoff::Handoff;
use crate::lifecycle::hooks::Hooks;
use crate::lifecycle::inflight::{InFlight, CONNECTIONS_GAUGE};
use crate::lifecycle::shutdown::Shutdown;
use crate::lifecycle::signals::LifecycleSignal;
use crate::lifecycle::state::LifecycleState;
use crate::net::{InheritedSocket, Listener};

/// Owns the listening socket from acquisition to close.
pub struct ListenerManager {
    router: Router,
    hooks: Hooks,
    tracker: InFlight,
    handoff: Arc<dyn Handoff>,
    state: watch::Sender<LifecycleState>,
}

impl ListenerManager {
    pub fn new(
        router: Router,
        hooks: Hooks,
        tracker: InFlight,
        handoff: Arc<dyn Handoff>,
        state: watch::Sender<LifecycleState>,
    ) -> Self {
        Self {
            router,
            hooks,
            tracker,
            handoff,
            state,
        }
    }

    /// Serve on `target` until a terminating signal, then drain.
    ///
    /// `target` is ignored when the handoff supplies an inherited socket.
    pub async fn run(
        mut self,
        target: &BindTarget,
        mut signals: mpsc::Receiver<LifecycleSignal>,
    ) -> Result<(), ServerError> {
        let inherited = self.handoff.inherited()?;
        let listener = match inherited {
            Some(socket) => {
                // SAFETY: the handoff names a listening descriptor passed to
                // this process for serving; nothing else here has adopted it.
                unsafe { Listener::from_inherited(socket) }.map_err(ServerError::Bind)?
            }
            None => Listener::bind(target).await.map_err(ServerError::Bind)?,
        };
        let resumed = inherited.is_some();
        self.set_state(LifecycleState::Bound { inherited: resumed });

        self.hooks.run_startup();

        let socket = InheritedSocket {
            fd: listener.as_raw_fd(),
            network: listener.network(),
        };
        let address = listener.local_addr();

        let shutdown = Shutdown::new();
        let connections = InFlight::with_gauge(CONNECTIONS_GAUGE);
        let (ready_tx, ready_rx) = oneshot::channel();
        let mut accept = tokio::spawn(server::serve(
            listener,
            self.router.clone(),
            shutdown.clone(),
            connections.clone(),
            ready_tx,
        ));
        if ready_rx.await.is_err() {
            // The accept task exited before it started serving.
            return Err(match accept.await? {
                Ok(_) => ServerError::AcceptStopped,
                Err(e) => ServerError::Serve(e),
            });
        }
        self.set_state(LifecycleState::Serving);

        if resumed {
            tracing::info!("Resuming listening on {}", address);
            self.handoff.kill_predecessor()?;
        } else {
            tracing::info!("Listening on {}", address);
        }

        let mut handed_off = false;
        loop {
            tokio::select! {
                finished = &mut accept => {
                    return Err(match finished? {
                        Ok(_) => ServerError::AcceptStopped,
                        Err(e) => ServerError::Serve(e),
                    });
                }
                signal = signals.recv() => match signal {
                    Some(LifecycleSignal::Restart) => match self.handoff.spawn_successor(socket) {
                        Ok(pid) => {
                            handed_off = true;
                            tracing::info!(successor = pid, "Spawned successor");
                        }
                        Err(e) => tracing::error!(error = %e, "Restart failed; still serving"),
                    },
                    Some(LifecycleSignal::Superseded) => {
                        handed_off = true;
                        break;
                    }
                    Some(LifecycleSignal::Terminate) | None => break,
                },
            }
        }

        self.set_state(LifecycleState::Draining);
        shutdown.trigger();
        let listener = accept.await?.map_err(ServerError::Serve)?;
        listener.close(!handed_off).map_err(ServerError::Close)?;
        tracing::info!(address = %address, "Listener closed");

        let outstanding = self.tracker.active();
        let open = connections.active();
        if outstanding > 0 || open > 0 {
            tracing::info!(outstanding, open, "Waiting for in-flight work");
        }
        // A connection closes only after its last response is written.
        connections.wait_for_drain().await;
        self.tracker.wait_for_drain().await;

        self.hooks.run_shutdown();
        self.set_state(LifecycleState::Closed);
        tracing::info!("Exit");
        Ok(())
    }

    fn set_state(&self, state: LifecycleState) {
        tracing::debug!(state = %state, "Lifecycle state changed");
        self.state.send_replace(state);
    }
}
