//! WebSocket upgrade detection.
//!
//! # Data Flow
//! ```text
//! Upgrade: websocket  → handshake (101) → chain runs on the upgraded socket, method WS
//! anything else       → chain runs on the plain request
//! ```
//!
//! # Design Decisions
//! - Only the two literal spellings `websocket` and `Websocket` select the upgrade path
//! - The chain runs after the handshake, inside the upgraded connection task

use axum::http::{header, HeaderMap};

/// Whether the request asks to be upgraded to a WebSocket.
pub fn is_websocket_upgrade(headers: &HeaderMap) -> bool {
    matches!(
        headers.get(header::UPGRADE).map(|v| v.as_bytes()),
        Some(b"websocket") | Some(b"Websocket")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(upgrade: Option<&'static str>) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Some(value) = upgrade {
            headers.insert(header::UPGRADE, HeaderValue::from_static(value));
        }
        headers
    }

    #[test]
    fn accepts_both_spellings() {
        assert!(is_websocket_upgrade(&headers(Some("websocket"))));
        assert!(is_websocket_upgrade(&headers(Some("Websocket"))));
    }

    #[test]
    fn rejects_other_values() {
        assert!(!is_websocket_upgrade(&headers(None)));
        assert!(!is_websocket_upgrade(&headers(Some("WEBSOCKET"))));
        assert!(!is_websocket_upgrade(&headers(Some("h2c"))));
    }
}
