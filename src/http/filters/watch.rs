//! Refresh-on-change stage.

use std::sync::Arc;

use futures_util::future::BoxFuture;

use crate::http::envelope::Envelope;
use crate::http::filter::{Filter, Next};
use crate::http::result::ErrorResult;
use crate::watch::{RefreshError, Watcher};

/// Refreshes dirty resources, then continues the chain.
///
/// A failed refresh answers the request with the error instead.
pub struct WatchFilter {
    watcher: Arc<Watcher>,
}

impl WatchFilter {
    pub fn new(watcher: Arc<Watcher>) -> Self {
        Self { watcher }
    }
}

impl Filter for WatchFilter {
    fn call<'a>(&'a self, env: &'a mut Envelope, next: Next<'a>) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            let watcher = Arc::clone(&self.watcher);
            let refreshed = tokio::task::spawn_blocking(move || watcher.notify())
                .await
                .unwrap_or_else(|e| Err(RefreshError(e.to_string())));

            if let Err(e) = refreshed {
                tracing::error!(error = %e, "Refresh failed");
                env.set_result(ErrorResult::internal(e.to_string()));
                return;
            }
            next.run(env).await;
        })
    }
}
