//! Inbound request metadata as seen by filters.

use axum::body::Body;
use axum::extract::ws::WebSocket;
use axum::http::{request::Parts, HeaderMap, Method, Uri, Version};

use crate::net::connection::PeerAddr;

/// Method assigned to requests that arrive over an upgraded WebSocket.
pub const WS_METHOD: &str = "WS";

/// Header carrying the per-request id set by the request-id layer.
pub const X_REQUEST_ID: &str = "x-request-id";

/// The request half of an [`Envelope`](crate::http::Envelope).
pub struct Request {
    pub method: Method,
    pub uri: Uri,
    pub version: Version,
    pub headers: HeaderMap,
    /// Remote peer, when the connection layer recorded one.
    pub remote_addr: Option<PeerAddr>,
    /// Unread request body. Empty for upgraded requests.
    pub body: Body,
    /// Upgraded bidirectional channel, present only for WebSocket requests.
    pub websocket: Option<WebSocket>,
}

impl Request {
    /// Build from the parts of an incoming HTTP request.
    pub fn from_parts(parts: Parts, body: Body) -> Self {
        let remote_addr = parts.extensions.get::<PeerAddr>().cloned();
        Self {
            method: parts.method,
            uri: parts.uri,
            version: parts.version,
            headers: parts.headers,
            remote_addr,
            body,
            websocket: None,
        }
    }

    /// Build for a connection that completed the WebSocket handshake.
    pub fn upgraded(parts: Parts, socket: WebSocket) -> Self {
        let mut request = Self::from_parts(parts, Body::empty());
        request.method = ws_method();
        request.websocket = Some(socket);
        request
    }

    /// Request path.
    pub fn path(&self) -> &str {
        self.uri.path()
    }

    /// Value of the `x-request-id` header, if any.
    pub fn request_id(&self) -> Option<&str> {
        self.headers.get(X_REQUEST_ID).and_then(|v| v.to_str().ok())
    }

    /// Whether this request arrived over an upgraded WebSocket.
    pub fn is_websocket(&self) -> bool {
        self.websocket.is_some()
    }

    /// Take the WebSocket out of the request so a filter can own it.
    pub fn take_websocket(&mut self) -> Option<WebSocket> {
        self.websocket.take()
    }
}

impl std::fmt::Debug for Request {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Request")
            .field("method", &self.method)
            .field("uri", &self.uri)
            .field("version", &self.version)
            .field("remote_addr", &self.remote_addr)
            .field("websocket", &self.websocket.is_some())
            .finish_non_exhaustive()
    }
}

/// The `WS` extension method.
pub fn ws_method() -> Method {
    Method::from_bytes(WS_METHOD.as_bytes()).expect("WS is a valid method token")
}
