//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::time::Duration;

use futures_util::future::BoxFuture;
use stagehand::config::ServerConfig;
use stagehand::http::{Envelope, Filter, Next, PlainText};
use stagehand::lifecycle::{LifecycleSignal, LifecycleState};
use stagehand::{App, ServerError};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

/// A server running in the test's runtime, driven by a signal channel.
pub struct TestServer {
    pub signals: mpsc::Sender<LifecycleSignal>,
    pub state: watch::Receiver<LifecycleState>,
    pub handle: JoinHandle<Result<(), ServerError>>,
}

impl TestServer {
    pub async fn signal(&self, signal: LifecycleSignal) {
        self.signals.send(signal).await.unwrap();
    }

    /// Terminate and wait for the run to finish.
    pub async fn stop(self) -> Result<(), ServerError> {
        let _ = self.signals.send(LifecycleSignal::Terminate).await;
        tokio::time::timeout(Duration::from_secs(10), self.handle)
            .await
            .expect("server did not stop")
            .unwrap()
    }
}

/// Config listening on `127.0.0.1:port` with watching off.
pub fn tcp_config(port: u16) -> ServerConfig {
    let mut config = ServerConfig::default();
    config.http.addr = "127.0.0.1".to_string();
    config.http.port = port;
    config.watch.enabled = false;
    config
}

/// Config listening on a Unix socket at `path`.
pub fn unix_config(path: &std::path::Path) -> ServerConfig {
    let mut config = ServerConfig::default();
    config.http.addr = format!("unix:{}", path.display());
    config.http.port = 0;
    config.watch.enabled = false;
    config
}

/// Run `app` and wait until it is serving.
pub async fn start(app: App) -> TestServer {
    let mut state = app.state();
    let (signals, rx) = mpsc::channel(4);
    let handle = tokio::spawn(app.run_with_signals(0, rx));

    tokio::time::timeout(
        Duration::from_secs(5),
        state.wait_for(|s| *s == LifecycleState::Serving),
    )
    .await
    .expect("server did not start")
    .expect("server exited before serving");

    TestServer {
        signals,
        state,
        handle,
    }
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .no_proxy()
        .timeout(Duration::from_secs(5))
        .build()
        .unwrap()
}

/// Answers every request with `body`.
pub struct Reply(pub &'static str);

impl Filter for Reply {
    fn call<'a>(&'a self, env: &'a mut Envelope, _next: Next<'a>) -> BoxFuture<'a, ()> {
        Box::pin(async move { env.set_result(PlainText::new(self.0)) })
    }
}
