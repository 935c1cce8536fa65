//! Application entry point.
//!
//! [`App`] collects the filter chain, lifecycle hooks and refreshable
//! resources, then hands them to the [`ListenerManager`] when run.
//! Registration happens before `run`, which consumes the app.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::{mpsc, watch};

use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::http::filter::{Filter, FilterChain};
use crate::http::filters::WatchFilter;
use crate::http::server::{router, Dispatcher};
use crate::lifecycle::handoff::{EnvHandoff, Handoff};
use crate::lifecycle::hooks::Hooks;
use crate::lifecycle::inflight::InFlight;
use crate::lifecycle::manager::ListenerManager;
use crate::lifecycle::signals::{self, LifecycleSignal};
use crate::lifecycle::state::LifecycleState;
use crate::watch::{refresh_all, Refresh, WatchTarget, Watcher};

/// A configured, not yet running server.
pub struct App {
    config: ServerConfig,
    filters: Vec<Arc<dyn Filter>>,
    hooks: Hooks,
    watch_targets: Vec<WatchTarget>,
    handoff: Arc<dyn Handoff>,
    state: watch::Sender<LifecycleState>,
}

impl App {
    /// Create an app that inherits its listener through the environment when
    /// started by a predecessor.
    pub fn new(config: ServerConfig) -> Self {
        let (state, _) = watch::channel(LifecycleState::Unbound);
        Self {
            config,
            filters: Vec::new(),
            hooks: Hooks::new(),
            watch_targets: Vec::new(),
            handoff: Arc::new(EnvHandoff::from_env()),
            state,
        }
    }

    /// Append a stage to the filter chain.
    pub fn add_filter(mut self, filter: impl Filter + 'static) -> Self {
        self.filters.push(Arc::new(filter));
        self
    }

    /// Run `hook` once the listener is acquired, before serving.
    pub fn on_app_start(mut self, hook: impl FnOnce() + Send + 'static) -> Self {
        self.hooks.on_app_start(hook);
        self
    }

    /// Run `hook` after the server has drained.
    pub fn on_app_exit(mut self, hook: impl FnOnce() + Send + 'static) -> Self {
        self.hooks.on_app_exit(hook);
        self
    }

    /// Refresh `target` whenever one of `paths` changes.
    pub fn watch(mut self, target: Arc<dyn Refresh>, paths: Vec<PathBuf>) -> Self {
        self.watch_targets.push(WatchTarget { target, paths });
        self
    }

    /// Replace the listener handoff mechanism.
    pub fn with_handoff(mut self, handoff: Arc<dyn Handoff>) -> Self {
        self.handoff = handoff;
        self
    }

    /// Observe lifecycle transitions. Subscribe before calling `run`.
    pub fn state(&self) -> watch::Receiver<LifecycleState> {
        self.state.subscribe()
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Serve until SIGTERM/SIGINT, or until a successor takes over.
    ///
    /// A non-zero `port` overrides `http.port`.
    pub async fn run(self, port: u16) -> Result<(), ServerError> {
        let signals = signals::listen().map_err(ServerError::Signals)?;
        self.run_with_signals(port, signals).await
    }

    /// Like [`run`](App::run), driven by `signals` instead of the OS.
    pub async fn run_with_signals(
        self,
        port: u16,
        signals: mpsc::Receiver<LifecycleSignal>,
    ) -> Result<(), ServerError> {
        let target = self.config.http.bind_target(port)?;

        let mut stages = self.filters;
        if self.config.watch.enabled {
            let mut watcher = Watcher::new();
            for target in &self.watch_targets {
                watcher.listen(Arc::clone(&target.target), &target.paths)?;
            }
            stages.insert(0, Arc::new(WatchFilter::new(Arc::new(watcher))));
        } else {
            refresh_all(&self.watch_targets);
        }

        tracing::info!(
            address = %target,
            filters = stages.len(),
            watch = self.config.watch.enabled,
            "Starting server"
        );

        let tracker = InFlight::new();
        let dispatcher = Arc::new(Dispatcher::new(FilterChain::new(stages), tracker.clone()));
        ListenerManager::new(
            router(dispatcher),
            self.hooks,
            tracker,
            self.handoff,
            self.state,
        )
        .run(&target, signals)
        .await
    }
}

impl std::fmt::Debug for App {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("App")
            .field("config", &self.config)
            .field("filters", &self.filters.len())
            .field("hooks", &self.hooks)
            .field("watch_targets", &self.watch_targets)
            .finish_non_exhaustive()
    }
}
