//! Request dispatch and connection serving.
//!
//! # Responsibilities
//! - Wrap each request in an [`Envelope`] and run the filter chain on it
//! - Bracket every dispatch with the in-flight tracker
//! - Finalize the response (result, raw status, or nothing) and close the output
//! - Complete WebSocket handshakes and run the chain on the upgraded socket
//! - Drive the accept loop and serve each connection in its own task
//! - Close connections gracefully on shutdown, counting each until it closes

use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Body,
    extract::{ws::WebSocketUpgrade, FromRequestParts, State},
    http::Request,
    response::{IntoResponse, Response},
    Router,
};
use hyper::body::Incoming;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto;
use tokio::sync::oneshot;
use tower::Service;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::http::envelope::Envelope;
use crate::http::filter::FilterChain;
use crate::http::websocket::is_websocket_upgrade;
use crate::lifecycle::inflight::{InFlight, WorkGuard};
use crate::lifecycle::shutdown::{Shutdown, ShutdownReceiver};
use crate::net::{Connection, Listener, ListenerError};
use crate::observability::metrics;

/// Runs the filter chain for every request.
#[derive(Debug)]
pub struct Dispatcher {
    chain: FilterChain,
    tracker: InFlight,
}

impl Dispatcher {
    pub fn new(chain: FilterChain, tracker: InFlight) -> Self {
        Self { chain, tracker }
    }

    pub fn tracker(&self) -> &InFlight {
        &self.tracker
    }

    /// Run the chain on `env` and finalize it, tracked as in-flight work.
    pub async fn execute(&self, env: Envelope) -> Envelope {
        let work = self.tracker.begin();
        self.run_chain(env, work).await
    }

    async fn run_chain(&self, mut env: Envelope, _work: WorkGuard) -> Envelope {
        self.chain.run(&mut env).await;
        env.finalize();
        env
    }

    /// Handle one HTTP request.
    pub async fn handle(self: Arc<Self>, request: Request<Body>) -> Response {
        if is_websocket_upgrade(request.headers()) {
            return self.upgrade(request).await;
        }

        let start = Instant::now();
        let method = request.method().clone();
        let response = self.execute(Envelope::new(request)).await.into_response();
        metrics::record_request(method.as_str(), response.status().as_u16(), start);
        response
    }

    async fn upgrade(self: Arc<Self>, request: Request<Body>) -> Response {
        let (mut parts, _body) = request.into_parts();
        let upgrade = match WebSocketUpgrade::from_request_parts(&mut parts, &()).await {
            Ok(upgrade) => upgrade,
            Err(rejection) => return rejection.into_response(),
        };

        // Counted from the handshake, so a drain cannot miss the upgraded connection.
        let work = self.tracker.begin();
        upgrade.on_upgrade(move |socket| async move {
            let env = Envelope::upgraded(parts, socket);
            self.run_chain(env, work).await;
        })
    }
}

async fn dispatch(State(dispatcher): State<Arc<Dispatcher>>, request: Request<Body>) -> Response {
    dispatcher.handle(request).await
}

/// Build the service every connection is served with.
pub fn router(dispatcher: Arc<Dispatcher>) -> Router {
    Router::new()
        .fallback(dispatch)
        .with_state(dispatcher)
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
}

/// Accept connections until shutdown is triggered, then hand the listener back.
///
/// `ready` fires once the loop is running. An accept error ends the loop
/// with that error; it is not retried. Each accepted connection holds a
/// guard on `connections` until it closes. On shutdown, open connections
/// finish their current request and then close.
pub async fn serve(
    listener: Listener,
    router: Router,
    shutdown: Shutdown,
    connections: InFlight,
    ready: oneshot::Sender<()>,
) -> Result<Listener, ListenerError> {
    let mut stop = shutdown.subscribe();
    let _ = ready.send(());

    loop {
        let accepted = tokio::select! {
            _ = stop.recv() => None,
            accepted = listener.accept() => Some(accepted),
        };

        match accepted {
            None => return Ok(listener),
            Some(accepted) => {
                let connection = accepted?;
                let open = connections.begin();
                tokio::spawn(serve_connection(
                    connection,
                    router.clone(),
                    shutdown.subscribe(),
                    open,
                ));
            }
        }
    }
}

async fn serve_connection(
    connection: Connection,
    router: Router,
    mut shutdown: ShutdownReceiver,
    _open: WorkGuard,
) {
    let Connection { id, stream, peer } = connection;

    let service = hyper::service::service_fn(move |mut request: Request<Incoming>| {
        request.extensions_mut().insert(peer.clone());
        router.clone().call(request)
    });

    let builder = auto::Builder::new(TokioExecutor::new());
    let conn = builder.serve_connection_with_upgrades(TokioIo::new(stream), service);
    tokio::pin!(conn);

    let mut draining = false;
    let result = loop {
        tokio::select! {
            result = conn.as_mut() => break result,
            _ = shutdown.recv(), if !draining => {
                draining = true;
                conn.as_mut().graceful_shutdown();
            }
        }
    };

    if let Err(e) = result {
        tracing::debug!(connection_id = %id, error = %e, "Connection ended with error");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::filter::{Filter, Next};
    use crate::http::result::PlainText;
    use axum::http::StatusCode;
    use futures_util::future::BoxFuture;
    use std::io::Write;

    struct Teapot;

    impl Filter for Teapot {
        fn call<'a>(&'a self, env: &'a mut Envelope, _next: Next<'a>) -> BoxFuture<'a, ()> {
            Box::pin(async move {
                env.response.status = StatusCode::IM_A_TEAPOT.as_u16();
            })
        }
    }

    struct WritesBody;

    impl Filter for WritesBody {
        fn call<'a>(&'a self, env: &'a mut Envelope, _next: Next<'a>) -> BoxFuture<'a, ()> {
            Box::pin(async move {
                let _ = env.response.out.write_all(b"streamed");
            })
        }
    }

    struct Panics;

    impl Filter for Panics {
        fn call<'a>(&'a self, _env: &'a mut Envelope, _next: Next<'a>) -> BoxFuture<'a, ()> {
            Box::pin(async move { panic!("stage failed") })
        }
    }

    struct Greets;

    impl Filter for Greets {
        fn call<'a>(&'a self, env: &'a mut Envelope, _next: Next<'a>) -> BoxFuture<'a, ()> {
            Box::pin(async move { env.set_result(PlainText::new("hello")) })
        }
    }

    fn dispatcher(stage: impl Filter + 'static) -> Arc<Dispatcher> {
        Arc::new(Dispatcher::new(
            FilterChain::new(vec![Arc::new(stage)]),
            InFlight::new(),
        ))
    }

    fn request() -> Request<Body> {
        Request::builder().uri("/").body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn raw_status_has_no_body() {
        let response = dispatcher(Teapot).handle(request()).await;
        assert_eq!(response.status(), StatusCode::IM_A_TEAPOT);
        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn direct_writes_pass_through() {
        let response = dispatcher(WritesBody).handle(request()).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        assert_eq!(&body[..], b"streamed");
    }

    #[tokio::test]
    async fn result_is_applied() {
        let response = dispatcher(Greets).handle(request()).await;
        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        assert_eq!(&body[..], b"hello");
    }

    #[tokio::test]
    async fn execute_closes_output() {
        let env = dispatcher(Teapot).execute(Envelope::new(request())).await;
        assert!(env.response.out.is_closed());
    }

    #[tokio::test]
    async fn tracker_released_when_chain_panics() {
        let dispatcher = dispatcher(Panics);
        let task = {
            let dispatcher = dispatcher.clone();
            tokio::spawn(async move { dispatcher.handle(request()).await })
        };

        assert!(task.await.unwrap_err().is_panic());
        assert_eq!(dispatcher.tracker().active(), 0);
    }

    #[tokio::test]
    async fn upgrade_header_without_handshake_is_rejected() {
        let request = Request::builder()
            .uri("/ws")
            .header("upgrade", "websocket")
            .body(Body::empty())
            .unwrap();
        let dispatcher = dispatcher(Greets);
        let response = dispatcher.clone().handle(request).await;
        assert!(response.status().is_client_error());
        assert_eq!(dispatcher.tracker().active(), 0);
    }
}
