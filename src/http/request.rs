//! Inbound request handling.
//!
//! # Responsibilities
//! - Generate a UUID request ID for every inbound request
//! - Build the header set sent to the upstream origin
//!
//! # Design Decisions
//! - Only allow-listed client headers travel upstream
//! - The proxy identity goes out as both User-Agent and Via; Via is what
//!   the loop check looks for on the way back in

use std::net::IpAddr;

use axum::http::header::{CONNECTION, USER_AGENT, VIA};
use axum::http::{HeaderMap, HeaderValue, Request};
use tower_http::request_id::{MakeRequestId, RequestId};
use uuid::Uuid;

use crate::security::headers::{copy_filtered, forwarded_for, REQUEST_HEADERS, X_FORWARDED_FOR};

pub const X_REQUEST_ID: &str = "x-request-id";

/// Request ID generator for `SetRequestIdLayer`.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidRequestId;

impl MakeRequestId for UuidRequestId {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        HeaderValue::from_str(&Uuid::new_v4().to_string())
            .ok()
            .map(RequestId::new)
    }
}

/// The request ID assigned by the request-id layer, or `"unknown"`.
pub fn request_id(headers: &HeaderMap) -> &str {
    headers
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
}

/// Headers for the outbound fetch.
pub fn upstream_headers(inbound: &HeaderMap, peer: IpAddr, identity: &HeaderValue) -> HeaderMap {
    let mut headers = HeaderMap::new();
    copy_filtered(&mut headers, inbound, &REQUEST_HEADERS);

    headers.insert(CONNECTION, HeaderValue::from_static("close"));
    headers.insert(USER_AGENT, identity.clone());
    headers.insert(VIA, identity.clone());

    if let Some(value) = forwarded_for(inbound, peer) {
        headers.insert(X_FORWARDED_FOR, value);
    }

    headers
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header;

    fn identity() -> HeaderValue {
        HeaderValue::from_static("camo-test")
    }

    #[test]
    fn test_injected_headers() {
        let mut inbound = HeaderMap::new();
        inbound.insert(header::ACCEPT, HeaderValue::from_static("image/webp"));
        inbound.insert(header::COOKIE, HeaderValue::from_static("session=1"));
        inbound.insert(header::USER_AGENT, HeaderValue::from_static("Mozilla/5.0"));

        let out = upstream_headers(&inbound, "203.0.113.9".parse().unwrap(), &identity());

        assert_eq!(out.get(header::ACCEPT).unwrap(), "image/webp");
        assert_eq!(out.get(header::CONNECTION).unwrap(), "close");
        assert_eq!(out.get(header::USER_AGENT).unwrap(), "camo-test");
        assert_eq!(out.get(header::VIA).unwrap(), "camo-test");
        assert!(out.get(header::COOKIE).is_none());
    }

    #[test]
    fn test_forwarded_for_public_peer() {
        let out = upstream_headers(&HeaderMap::new(), "8.8.8.8".parse().unwrap(), &identity());
        assert_eq!(out.get(X_FORWARDED_FOR).unwrap(), "8.8.8.8");
    }

    #[test]
    fn test_forwarded_for_skipped() {
        let private = upstream_headers(&HeaderMap::new(), "10.0.0.7".parse().unwrap(), &identity());
        assert!(private.get(X_FORWARDED_FOR).is_none());

        let mut inbound = HeaderMap::new();
        inbound.insert(X_FORWARDED_FOR, HeaderValue::from_static("1.2.3.4"));
        let already = upstream_headers(&inbound, "8.8.8.8".parse().unwrap(), &identity());
        assert!(already.get(X_FORWARDED_FOR).is_none());
    }

    #[test]
    fn test_request_ids_unique() {
        let request = Request::new(());
        let mut make = UuidRequestId;
        let a = make.make_request_id(&request).unwrap();
        let b = make.make_request_id(&request).unwrap();
        assert_ne!(a.header_value(), b.header_value());
        assert_eq!(a.header_value().len(), 36);
    }

    #[test]
    fn test_request_id_lookup() {
        let mut headers = HeaderMap::new();
        assert_eq!(request_id(&headers), "unknown");
        headers.insert(X_REQUEST_ID, HeaderValue::from_static("abc"));
        assert_eq!(request_id(&headers), "abc");
    }
}
