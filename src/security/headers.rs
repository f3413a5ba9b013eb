//! Header policy tables and filtered copying.
//!
//! # Responsibilities
//! - Decide which client headers reach the origin
//! - Decide which origin headers reach the client
//! - Add X-Forwarded-For for public peers
//!
//! # Design Decisions
//! - A non-empty table forwards only names mapped to `true`
//! - An empty table forwards everything
//! - Multi-value headers are appended, never overwritten

use std::net::IpAddr;

use axum::http::{HeaderMap, HeaderName, HeaderValue};

use crate::security::network::is_restricted_ip;

pub const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// A fixed header-name → forward flag mapping.
#[derive(Debug, Clone, Copy)]
pub struct HeaderPolicy {
    entries: &'static [(&'static str, bool)],
}

/// Client headers passed on to the origin.
pub const REQUEST_HEADERS: HeaderPolicy = HeaderPolicy::new(&[
    ("Accept", true),
    ("Accept-Charset", true),
    ("Accept-Encoding", true),
    ("Accept-Language", true),
    ("Cache-Control", true),
    ("If-None-Match", true),
    ("If-Modified-Since", true),
]);

/// Origin headers passed back to the client.
pub const RESPONSE_HEADERS: HeaderPolicy = HeaderPolicy::new(&[
    // range requests are never offered
    ("Accept-Ranges", false),
    ("Cache-Control", true),
    ("Content-Encoding", true),
    ("Content-Type", true),
    ("Transfer-Encoding", true),
    ("Expires", true),
    ("Last-Modified", true),
    // replaced by our own identity
    ("Server", false),
]);

impl HeaderPolicy {
    pub const fn new(entries: &'static [(&'static str, bool)]) -> Self {
        Self { entries }
    }

    pub fn forwards(&self, name: &HeaderName) -> bool {
        self.entries
            .iter()
            .find(|(entry, _)| name.as_str().eq_ignore_ascii_case(entry))
            .map(|(_, forward)| *forward)
            .unwrap_or(false)
    }
}

/// Append every value of every header in `src` that `policy` forwards.
pub fn copy_filtered(dst: &mut HeaderMap, src: &HeaderMap, policy: &HeaderPolicy) {
    for (name, value) in src.iter() {
        if policy.forwards(name) {
            dst.append(name.clone(), value.clone());
        }
    }
}

/// X-Forwarded-For value to add, if the client did not send one and the
/// peer is a public address.
pub fn forwarded_for(inbound: &HeaderMap, peer: IpAddr) -> Option<HeaderValue> {
    if inbound.contains_key(X_FORWARDED_FOR) || is_restricted_ip(peer) {
        return None;
    }
    HeaderValue::from_str(&peer.to_string()).ok()
}
