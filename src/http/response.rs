//! Response state and the buffered outbound writer.
//!
//! # Responsibilities
//! - Hold the raw status slot filters may set instead of a result
//! - Buffer status, headers and body written by filters and results
//! - Track whether the response has started so headers are never written twice
//! - Convert the finished output into an HTTP response

use std::io;

use axum::body::Body;
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};

/// The response half of an [`Envelope`](crate::http::Envelope).
#[derive(Debug, Default)]
pub struct Response {
    /// Raw status to write when no result is set. 0 means unset.
    pub status: u16,
    /// Content type results should use. Empty means unset.
    pub content_type: String,
    /// The outbound writer.
    pub out: Output,
}

impl Response {
    pub fn new() -> Self {
        Self::default()
    }

    /// Commit the status line and the `Content-Type` header, if set.
    ///
    /// Uses `status` from the argument; does nothing once the output has started.
    pub fn write_header(&mut self, status: StatusCode) {
        if !self.content_type.is_empty() && !self.out.is_started() {
            if let Ok(value) = HeaderValue::from_str(&self.content_type) {
                self.out.headers_mut().insert(header::CONTENT_TYPE, value);
            }
        }
        self.out.write_header(status);
    }
}

/// Buffered outbound writer.
///
/// The first call to [`write_header`](Output::write_header) or
/// [`write`](io::Write::write) starts the response; later header writes are
/// ignored. Writes fail once the output is closed.
#[derive(Debug, Default)]
pub struct Output {
    status: Option<StatusCode>,
    headers: HeaderMap,
    body: Vec<u8>,
    closed: bool,
}

impl Output {
    pub fn new() -> Self {
        Self::default()
    }

    /// Headers still to be sent. Changes after the response started are dropped.
    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Commit the status line.
    pub fn write_header(&mut self, status: StatusCode) {
        if let Some(current) = self.status {
            tracing::warn!(
                current = %current,
                ignored = %status,
                "superfluous write_header, response already started"
            );
            return;
        }
        self.status = Some(status);
    }

    /// Whether the status line has been committed.
    pub fn is_started(&self) -> bool {
        self.status.is_some()
    }

    /// Committed status, if any.
    pub fn status(&self) -> Option<StatusCode> {
        self.status
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Finish the response. Idempotent.
    pub fn close(&mut self) {
        self.closed = true;
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Convert into an HTTP response. An output nothing wrote to becomes `200` with no body.
    pub fn into_http(self) -> axum::response::Response {
        let mut response = axum::response::Response::new(Body::from(self.body));
        *response.status_mut() = self.status.unwrap_or(StatusCode::OK);
        *response.headers_mut() = self.headers;
        response
    }
}

impl io::Write for Output {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.closed {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "output closed"));
        }
        if self.status.is_none() {
            self.status = Some(StatusCode::OK);
        }
        self.body.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
