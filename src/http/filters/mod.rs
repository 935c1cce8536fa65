//! Built-in filter stages.
//!
//! - [`WatchFilter`]: refreshes changed resources before the rest of the chain;
//!   inserted first automatically when `watch.enabled` is set
//! - [`PanicFilter`]: turns a panic further down the chain into a 500 response

pub mod panic;
pub mod watch;

pub use panic::PanicFilter;
pub use watch::WatchFilter;
