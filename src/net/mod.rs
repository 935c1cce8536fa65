//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Fresh bind (listener.rs)  ─┐
//!                            ├→ Listener → accept loop → Connection (connection.rs)
//! Inherited fd (listener.rs)─┘                            → Hand off to HTTP layer
//! ```
//!
//! # Design Decisions
//! - TCP and Unix domain sockets behind one listener type
//! - No connection cap; admission control belongs to whoever deploys the server
//! - Closing is explicit and fallible so a leaked socket is never silent

pub mod connection;
pub mod listener;

pub use connection::{Connection, ConnectionId, PeerAddr, Stream};
pub use listener::{InheritedSocket, Listener, ListenerError};
