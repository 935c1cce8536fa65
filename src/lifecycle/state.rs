//! Observable lifecycle state.

use std::fmt;

/// Where the server is in its life.
///
/// ```text
/// Unbound → Bound → Serving → Draining → Closed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LifecycleState {
    #[default]
    Unbound,
    /// Listener acquired; `inherited` when it came from a predecessor.
    Bound { inherited: bool },
    Serving,
    /// Listener closed, waiting for in-flight work.
    Draining,
    Closed,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifecycleState::Unbound => write!(f, "unbound"),
            LifecycleState::Bound { inherited: true } => write!(f, "bound (inherited)"),
            LifecycleState::Bound { inherited: false } => write!(f, "bound"),
            LifecycleState::Serving => write!(f, "serving"),
            LifecycleState::Draining => write!(f, "draining"),
            LifecycleState::Closed => write!(f, "closed"),
        }
    }
}
