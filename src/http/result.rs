//! Deferred response actions.
//!
//! A filter that wants to answer a request sets a result on the envelope
//! instead of writing the response itself. The dispatcher applies it once,
//! after the whole chain has returned.

use std::io::Write;

use axum::http::{header, HeaderValue, StatusCode};
use serde_json::Value;

use crate::http::request::Request;
use crate::http::response::Response;

/// A response action applied once the filter chain unwinds.
pub trait ActionResult: Send {
    /// Write this result into `resp`.
    fn apply(&self, req: &Request, resp: &mut Response);
}

/// Plain text body.
#[derive(Debug, Clone)]
pub struct PlainText {
    pub status: StatusCode,
    pub body: String,
}

impl PlainText {
    pub fn new(body: impl Into<String>) -> Self {
        Self {
            status: StatusCode::OK,
            body: body.into(),
        }
    }

    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }
}

impl ActionResult for PlainText {
    fn apply(&self, _req: &Request, resp: &mut Response) {
        resp.content_type = "text/plain; charset=utf-8".to_string();
        resp.write_header(self.status);
        write_body(resp, self.body.as_bytes());
    }
}

/// JSON body.
#[derive(Debug, Clone)]
pub struct JsonResult {
    pub status: StatusCode,
    pub value: Value,
}

impl JsonResult {
    pub fn new(value: Value) -> Self {
        Self {
            status: StatusCode::OK,
            value,
        }
    }
}

impl ActionResult for JsonResult {
    fn apply(&self, _req: &Request, resp: &mut Response) {
        match serde_json::to_vec(&self.value) {
            Ok(bytes) => {
                resp.content_type = "application/json".to_string();
                resp.write_header(self.status);
                write_body(resp, &bytes);
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize JSON result");
                resp.write_header(StatusCode::INTERNAL_SERVER_ERROR);
            }
        }
    }
}

/// `302 Found` to another location.
#[derive(Debug, Clone)]
pub struct Redirect {
    pub location: String,
}

impl Redirect {
    pub fn to(location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
        }
    }
}

impl ActionResult for Redirect {
    fn apply(&self, _req: &Request, resp: &mut Response) {
        match HeaderValue::from_str(&self.location) {
            Ok(value) => {
                resp.out.headers_mut().insert(header::LOCATION, value);
                resp.write_header(StatusCode::FOUND);
            }
            Err(_) => {
                tracing::error!(location = %self.location, "Invalid redirect location");
                resp.write_header(StatusCode::INTERNAL_SERVER_ERROR);
            }
        }
    }
}

/// An error page. Rendered as JSON when the client accepts it, plain text otherwise.
#[derive(Debug, Clone)]
pub struct ErrorResult {
    pub status: StatusCode,
    pub description: String,
}

impl ErrorResult {
    pub fn new(status: StatusCode, description: impl Into<String>) -> Self {
        Self {
            status,
            description: description.into(),
        }
    }

    pub fn internal(description: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, description)
    }
}

impl ActionResult for ErrorResult {
    fn apply(&self, req: &Request, resp: &mut Response) {
        let wants_json = req
            .headers
            .get(header::ACCEPT)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|accept| accept.contains("application/json"));

        if wants_json {
            let body = serde_json::json!({
                "status": self.status.as_u16(),
                "error": self.description,
            });
            JsonResult {
                status: self.status,
                value: body,
            }
            .apply(req, resp);
        } else {
            PlainText {
                status: self.status,
                body: format!("{}: {}", self.status, self.description),
            }
            .apply(req, resp);
        }
    }
}

fn write_body(resp: &mut Response, bytes: &[u8]) {
    if let Err(e) = resp.out.write_all(bytes) {
        tracing::warn!(error = %e, "Failed to write response body");
    }
}
