//! Startup and shutdown hook registries.

use std::fmt;

/// A zero-argument callback run once.
pub type Hook = Box<dyn FnOnce() + Send>;

/// Two independent FIFO lists of callbacks.
///
/// Startup hooks run after the listener is acquired and before it starts
/// accepting. Shutdown hooks run after the listener is closed and every
/// in-flight request has finished. Within each list, hooks run in the order
/// they were registered; duplicates are not removed.
///
/// A panicking hook is not caught. It takes the process down, so hooks
/// should leave nothing half done before they can fail.
#[derive(Default)]
pub struct Hooks {
    startup: Vec<Hook>,
    shutdown: Vec<Hook>,
}

impl Hooks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a function to run at startup, before connections are accepted.
    pub fn on_app_start(&mut self, hook: impl FnOnce() + Send + 'static) {
        self.startup.push(Box::new(hook));
    }

    /// Register a function to run at shutdown, after in-flight work has drained.
    pub fn on_app_exit(&mut self, hook: impl FnOnce() + Send + 'static) {
        self.shutdown.push(Box::new(hook));
    }

    /// Run and consume the startup hooks.
    pub fn run_startup(&mut self) {
        run_all("startup", std::mem::take(&mut self.startup));
    }

    /// Run and consume the shutdown hooks.
    pub fn run_shutdown(&mut self) {
        run_all("shutdown", std::mem::take(&mut self.shutdown));
    }

    pub fn startup_len(&self) -> usize {
        self.startup.len()
    }

    pub fn shutdown_len(&self) -> usize {
        self.shutdown.len()
    }
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks")
            .field("startup", &self.startup.len())
            .field("shutdown", &self.shutdown.len())
            .finish()
    }
}

fn run_all(phase: &'static str, hooks: Vec<Hook>) {
    tracing::debug!(phase, count = hooks.len(), "Running hooks");
    for hook in hooks {
        hook();
    }
}
