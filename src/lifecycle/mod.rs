//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (manager.rs):
//!     Inherited fd or fresh bind → startup hooks (hooks.rs) → accept loop → Serving
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → drain and exit
//!     SIGUSR2 → spawn successor (handoff.rs), keep serving
//!     SIGQUIT → successor is serving, drain and exit
//!
//! Shutdown (shutdown.rs, inflight.rs):
//!     Stop accept → close listener → wait for in-flight work → exit hooks → Closed
//! ```
//!
//! # Design Decisions
//! - Ordered startup: listener first, then hooks, then traffic
//! - Ordered shutdown: stop accept, close, drain, hooks
//! - No drain deadline: in-flight work is waited for indefinitely

pub mod handoff;
pub mod hooks;
pub mod inflight;
pub mod manager;
pub mod shutdown;
pub mod signals;
pub mod state;

pub use handoff::{EnvHandoff, Handoff, HandoffError, Standalone};
pub use hooks::Hooks;
pub use inflight::{InFlight, WorkGuard};
pub use manager::ListenerManager;
pub use shutdown::{Shutdown, ShutdownReceiver};
pub use signals::LifecycleSignal;
pub use state::LifecycleState;
