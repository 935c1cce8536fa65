//! Startup, restart and graceful drain.

use std::io::{Read, Write};
use std::os::fd::IntoRawFd;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::future::BoxFuture;
use stagehand::config::Network;
use stagehand::http::{Envelope, Filter, Next, PlainText};
use stagehand::lifecycle::{Handoff, HandoffError, LifecycleSignal, LifecycleState, Standalone};
use stagehand::net::InheritedSocket;
use stagehand::App;
use tokio::sync::mpsc;

mod common;

type Events = Arc<Mutex<Vec<String>>>;

fn record(events: &Events, event: &str) {
    events.lock().unwrap().push(event.to_string());
}

/// Holds the request until released, then answers.
struct Slow {
    entered: mpsc::Sender<()>,
    events: Events,
}

impl Filter for Slow {
    fn call<'a>(&'a self, env: &'a mut Envelope, _next: Next<'a>) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            let _ = self.entered.send(()).await;
            tokio::time::sleep(Duration::from_millis(300)).await;
            record(&self.events, "request finished");
            env.set_result(PlainText::new("done"));
        })
    }
}

const LARGE_BODY: usize = 8 * 1024 * 1024;

/// Answers with a body far larger than the socket buffers.
struct Large {
    entered: std::sync::mpsc::Sender<()>,
}

impl Filter for Large {
    fn call<'a>(&'a self, env: &'a mut Envelope, _next: Next<'a>) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            let _ = self.entered.send(());
            tokio::time::sleep(Duration::from_millis(100)).await;
            env.set_result(PlainText::new("x".repeat(LARGE_BODY)));
        })
    }
}

/// Hands out a pre-bound socket as if a predecessor had passed it in.
struct Predecessor {
    socket: Mutex<Option<InheritedSocket>>,
    events: Events,
}

impl Handoff for Predecessor {
    fn inherited(&self) -> Result<Option<InheritedSocket>, HandoffError> {
        Ok(self.socket.lock().unwrap().take())
    }

    fn kill_predecessor(&self) -> Result<(), HandoffError> {
        record(&self.events, "predecessor signalled");
        Ok(())
    }

    fn spawn_successor(&self, _socket: InheritedSocket) -> Result<u32, HandoffError> {
        Err(HandoffError::Unsupported)
    }
}

#[tokio::test]
async fn drain_waits_for_in_flight_request() {
    let events: Events = Arc::default();
    let (entered_tx, mut entered_rx) = mpsc::channel(1);
    let app = App::new(common::tcp_config(28321))
        .add_filter(Slow {
            entered: entered_tx,
            events: events.clone(),
        })
        .on_app_exit({
            let events = events.clone();
            move || record(&events, "exit hook")
        });
    let server = common::start(app).await;

    let request = tokio::spawn(
        common::client()
            .get("http://127.0.0.1:28321/slow")
            .send(),
    );
    entered_rx.recv().await.unwrap();

    server.signal(LifecycleSignal::Terminate).await;
    let response = request.await.unwrap().unwrap();
    assert_eq!(response.text().await.unwrap(), "done");

    server.stop().await.unwrap();
    assert_eq!(
        *events.lock().unwrap(),
        vec!["request finished".to_string(), "exit hook".to_string()]
    );
    assert!(tokio::net::TcpStream::connect("127.0.0.1:28321").await.is_err());
}

#[tokio::test]
async fn hooks_run_in_registration_order() {
    let events: Events = Arc::default();
    let hook = |name: &'static str| {
        let events = events.clone();
        move || record(&events, name)
    };
    let app = App::new(common::tcp_config(28322))
        .add_filter(common::Reply("ok"))
        .on_app_start(hook("start 1"))
        .on_app_start(hook("start 2"))
        .on_app_exit(hook("exit 1"))
        .on_app_exit(hook("exit 2"));
    let server = common::start(app).await;

    assert_eq!(
        *events.lock().unwrap(),
        vec!["start 1".to_string(), "start 2".to_string()]
    );

    server.stop().await.unwrap();
    assert_eq!(events.lock().unwrap().len(), 4);
    assert_eq!(events.lock().unwrap()[2..], ["exit 1", "exit 2"]);
}

#[tokio::test]
async fn refused_restart_keeps_serving() {
    let app = App::new(common::tcp_config(28323))
        .add_filter(common::Reply("still here"))
        .with_handoff(Arc::new(Standalone));
    let server = common::start(app).await;

    server.signal(LifecycleSignal::Restart).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(*server.state.borrow(), LifecycleState::Serving);

    let body = common::client()
        .get("http://127.0.0.1:28323/")
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert_eq!(body, "still here");

    server.stop().await.unwrap();
}

#[tokio::test]
async fn inherited_socket_is_resumed() {
    let events: Events = Arc::default();
    let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = std_listener.local_addr().unwrap();
    let handoff = Predecessor {
        socket: Mutex::new(Some(InheritedSocket {
            fd: std_listener.into_raw_fd(),
            network: Network::Tcp,
        })),
        events: events.clone(),
    };

    // The configured port is never bound when a socket is inherited.
    let app = App::new(common::tcp_config(1))
        .add_filter(common::Reply("resumed"))
        .with_handoff(Arc::new(handoff));
    let server = common::start(app).await;
    assert_eq!(*events.lock().unwrap(), vec!["predecessor signalled".to_string()]);

    let body = common::client()
        .get(format!("http://{addr}/"))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert_eq!(body, "resumed");

    server.signal(LifecycleSignal::Superseded).await;
    tokio::time::timeout(Duration::from_secs(10), server.handle)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
}

#[test]
fn response_is_written_before_run_returns() {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let (entered_tx, entered_rx) = std::sync::mpsc::channel();
    let app = App::new(common::tcp_config(28324)).add_filter(Large {
        entered: entered_tx,
    });
    let mut state = app.state();
    let (signals, rx) = mpsc::channel(4);
    let run = runtime.spawn(app.run_with_signals(0, rx));
    runtime.block_on(async {
        tokio::time::timeout(
            Duration::from_secs(5),
            state.wait_for(|s| *s == LifecycleState::Serving),
        )
        .await
        .unwrap()
        .unwrap();
    });

    // A slow reader keeps the response in flight long after the chain returns.
    let client = std::thread::spawn(|| {
        let mut stream = std::net::TcpStream::connect("127.0.0.1:28324").unwrap();
        stream
            .write_all(b"GET /large HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
            .unwrap();
        let mut raw = Vec::new();
        let mut chunk = [0u8; 64 * 1024];
        loop {
            let n = stream.read(&mut chunk).unwrap();
            if n == 0 {
                break raw;
            }
            raw.extend_from_slice(&chunk[..n]);
            std::thread::sleep(Duration::from_millis(2));
        }
    });

    entered_rx.recv_timeout(Duration::from_secs(5)).unwrap();
    runtime.block_on(async {
        signals.send(LifecycleSignal::Terminate).await.unwrap();
        run.await.unwrap().unwrap();
    });
    // As in `main`: nothing keeps running once `run` has returned.
    drop(runtime);

    let raw = client.join().unwrap();
    let split = raw
        .windows(4)
        .position(|w| w == b"\r\n\r\n")
        .expect("no header terminator");
    assert!(raw.starts_with(b"HTTP/1.1 200 OK"));
    assert_eq!(raw.len() - (split + 4), LARGE_BODY);
}
