//! Stagehand: HTTP and WebSocket serving through an ordered filter chain,
//! with graceful drain and zero-downtime restarts.

#[cfg(not(unix))]
compile_error!("stagehand relies on Unix signals and descriptor inheritance");

pub mod app;
pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod watch;

pub use app::App;
pub use config::schema::ServerConfig;
pub use error::ServerError;
pub use http::{ActionResult, Envelope, Filter, Next};
pub use lifecycle::{LifecycleSignal, LifecycleState};
