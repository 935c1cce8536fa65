//! In-flight work tracking for graceful shutdown.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

/// Gauge for dispatched requests.
pub const REQUESTS_GAUGE: &str = "stagehand_in_flight_requests";
/// Gauge for accepted connections that are still open.
pub const CONNECTIONS_GAUGE: &str = "stagehand_open_connections";

#[derive(Debug)]
struct Inner {
    active: AtomicUsize,
    drained: Notify,
    gauge: &'static str,
}

/// Counts units of work (requests, connections) that have not finished.
///
/// [`begin`](InFlight::begin) returns a guard that decrements on drop, so the
/// count is released on every exit path, panics included. There is no limit;
/// the tracker only counts.
#[derive(Debug, Clone)]
pub struct InFlight {
    inner: Arc<Inner>,
}

impl InFlight {
    /// A request tracker.
    pub fn new() -> Self {
        Self::with_gauge(REQUESTS_GAUGE)
    }

    /// A tracker publishing its count on `gauge`.
    pub fn with_gauge(gauge: &'static str) -> Self {
        Self {
            inner: Arc::new(Inner {
                active: AtomicUsize::new(0),
                drained: Notify::new(),
                gauge,
            }),
        }
    }

    /// Record the start of a unit of work.
    pub fn begin(&self) -> WorkGuard {
        let active = self.inner.active.fetch_add(1, Ordering::SeqCst) + 1;
        metrics::gauge!(self.inner.gauge).set(active as f64);
        WorkGuard {
            inner: Arc::clone(&self.inner),
        }
    }

    /// Current number of unfinished units of work.
    pub fn active(&self) -> usize {
        self.inner.active.load(Ordering::SeqCst)
    }

    /// Wait until no work is outstanding.
    ///
    /// Only meaningful once no new work can be admitted (the listener is
    /// closed); otherwise new `begin` calls can keep it waiting forever.
    pub async fn wait_for_drain(&self) {
        loop {
            let notified = self.inner.drained.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.active() == 0 {
                return;
            }
            notified.await;
        }
    }
}

impl Default for InFlight {
    fn default() -> Self {
        Self::new()
    }
}

/// Guard for one unit of in-flight work. Dropping it ends the work.
#[derive(Debug)]
pub struct WorkGuard {
    inner: Arc<Inner>,
}

impl Drop for WorkGuard {
    fn drop(&mut self) {
        let previous = self.inner.active.fetch_sub(1, Ordering::SeqCst);
        metrics::gauge!(self.inner.gauge).set((previous - 1) as f64);
        if previous == 1 {
            self.inner.drained.notify_waiters();
        }
    }
}
