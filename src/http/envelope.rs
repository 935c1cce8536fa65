//! Per-request envelope passed through the filter chain.

use axum::body::Body;
use axum::extract::ws::WebSocket;
use axum::http::{self, request::Parts, StatusCode};

use crate::http::request::Request;
use crate::http::response::Response;
use crate::http::result::ActionResult;

/// Request metadata, response state and the result slot for one request.
///
/// Created once per dispatched request and owned by that dispatch until the
/// response is finalized.
pub struct Envelope {
    pub request: Request,
    pub response: Response,
    /// Deferred action applied after the chain returns. Takes precedence over
    /// `response.status`.
    pub result: Option<Box<dyn ActionResult>>,
}

impl Envelope {
    /// Wrap an incoming HTTP request. Performs no I/O.
    pub fn new(request: http::Request<Body>) -> Self {
        let (parts, body) = request.into_parts();
        Self::from_request(Request::from_parts(parts, body))
    }

    /// Wrap a request whose connection was upgraded to a WebSocket.
    pub fn upgraded(parts: Parts, socket: WebSocket) -> Self {
        Self::from_request(Request::upgraded(parts, socket))
    }

    pub fn from_request(request: Request) -> Self {
        Self {
            request,
            response: Response::new(),
            result: None,
        }
    }

    /// Set the result to apply once the chain unwinds.
    pub fn set_result(&mut self, result: impl ActionResult + 'static) {
        self.result = Some(Box::new(result));
    }

    /// Apply the result, or write the raw status, then close the output.
    ///
    /// Exactly one of the two paths runs. With neither set the chain is
    /// assumed to have written the response itself and nothing is added.
    pub fn finalize(&mut self) {
        if let Some(result) = self.result.take() {
            result.apply(&self.request, &mut self.response);
        } else if self.response.status != 0 {
            let status = StatusCode::from_u16(self.response.status).unwrap_or_else(|_| {
                tracing::error!(status = self.response.status, "Invalid response status");
                StatusCode::INTERNAL_SERVER_ERROR
            });
            self.response.out.write_header(status);
        }
        self.response.out.close();
    }

    /// The HTTP response built from the output.
    pub fn into_response(self) -> axum::response::Response {
        self.response.out.into_http()
    }
}
