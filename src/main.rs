//! Stagehand server binary.
//!
//! Serves a small demo chain: a panic guard, then a stage that answers
//! plain requests with a greeting and echoes WebSocket messages.
//!
//! ```text
//! stagehand [--config stagehand.toml] [--port 9000]
//! kill -USR2 <pid>   # restart without dropping the socket
//! kill -TERM <pid>   # drain and exit
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use axum::extract::ws::Message;
use clap::Parser;
use futures_util::future::BoxFuture;

use stagehand::config::{load_config, ServerConfig};
use stagehand::http::{Envelope, Filter, Next, PanicFilter, PlainText};
use stagehand::observability::{logging, metrics};
use stagehand::App;

#[derive(Parser, Debug)]
#[command(name = "stagehand", version, about = "Filter-chain HTTP server")]
struct Cli {
    /// Path to a TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen port, overriding http.port
    #[arg(short, long, default_value_t = 0)]
    port: u16,
}

struct Demo;

impl Filter for Demo {
    fn call<'a>(&'a self, env: &'a mut Envelope, _next: Next<'a>) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            let Some(mut socket) = env.request.take_websocket() else {
                env.set_result(PlainText::new(format!(
                    "Hello from stagehand: {} {}\n",
                    env.request.method,
                    env.request.path()
                )));
                return;
            };

            while let Some(Ok(message)) = socket.recv().await {
                match message {
                    Message::Text(_) | Message::Binary(_) => {
                        if socket.send(message).await.is_err() {
                            break;
                        }
                    }
                    Message::Close(_) => break,
                    Message::Ping(_) | Message::Pong(_) => {}
                }
            }
        })
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => match load_config(path, cli.port) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("stagehand: {}", e);
                return ExitCode::FAILURE;
            }
        },
        None => ServerConfig::default(),
    };

    logging::init(&config.observability.log_level);
    tracing::info!(pid = std::process::id(), "stagehand v{} starting", env!("CARGO_PKG_VERSION"));

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let app = App::new(config).add_filter(PanicFilter).add_filter(Demo);

    match app.run(cli.port).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Server stopped");
            ExitCode::FAILURE
        }
    }
}
