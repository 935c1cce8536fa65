//! HTTP dispatch subsystem.
//!
//! # Data Flow
//! ```text
//! Connection (net)
//!     → server.rs (hyper-util auto builder, request-id + trace layers)
//!     → Dispatcher: Envelope (envelope.rs) wraps request.rs + response.rs
//!     → FilterChain (filter.rs): stage 0 … stage n, each may call Next
//!     → Envelope::finalize: ActionResult (result.rs) or raw status
//!     → Output closed → HTTP response
//!
//! Upgrade: websocket
//!     → handshake (websocket.rs) → same chain with method WS
//! ```

pub mod envelope;
pub mod filter;
pub mod filters;
pub mod request;
pub mod response;
pub mod result;
pub mod server;
pub mod websocket;

pub use envelope::Envelope;
pub use filter::{Filter, FilterChain, Next};
pub use filters::{PanicFilter, WatchFilter};
pub use request::{Request, WS_METHOD, X_REQUEST_ID};
pub use response::{Output, Response};
pub use result::{ActionResult, ErrorResult, JsonResult, PlainText, Redirect};
pub use server::Dispatcher;
