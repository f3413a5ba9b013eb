//! Upstream response policy.
//!
//! # Responsibilities
//! - Decide, from status and headers alone, whether a body is relayed
//! - Build the client response from the filtered upstream headers
//!
//! # Design Decisions
//! - The size check runs before the status dispatch, for every status
//! - Redirects that reach this point are terminal and never leak `Location`

use axum::body::Body;
use axum::http::header::{CONTENT_LENGTH, CONTENT_TYPE};
use axum::http::{HeaderMap, StatusCode};
use axum::response::Response;

use crate::http::error::ProxyError;
use crate::security::headers::{copy_filtered, RESPONSE_HEADERS};

/// What to send back for an acceptable upstream response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// 200 with the body streamed through.
    Stream,
    /// 304 with no body.
    NotModified,
}

/// Length declared by the upstream `Content-Length` header, if any.
pub fn declared_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}

pub fn evaluate(
    status: StatusCode,
    headers: &HeaderMap,
    max_size: u64,
) -> Result<Disposition, ProxyError> {
    if let Some(length) = declared_length(headers) {
        if length > max_size {
            return Err(ProxyError::ContentTooLarge {
                length,
                limit: max_size,
            });
        }
    }

    match status.as_u16() {
        200 => {
            let content_type = headers
                .get(CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("");
            if content_type.to_ascii_lowercase().starts_with("image/") {
                Ok(Disposition::Stream)
            } else {
                Err(ProxyError::NonImageContentType(content_type.to_owned()))
            }
        }
        300 => Err(ProxyError::MultipleChoices),
        code @ (301 | 302 | 303 | 307) => Err(ProxyError::Redirect(code)),
        304 => Ok(Disposition::NotModified),
        404 => Err(ProxyError::UpstreamNotFound),
        code @ (500 | 502 | 503 | 504) => Err(ProxyError::UpstreamUnavailable(code)),
        code => Err(ProxyError::UpstreamStatus(code)),
    }
}

/// Client response carrying the allow-listed upstream headers.
pub fn relay(status: StatusCode, upstream: &HeaderMap, body: Body) -> Response {
    let mut response = Response::new(body);
    *response.status_mut() = status;
    copy_filtered(response.headers_mut(), upstream, &RESPONSE_HEADERS);
    response
}
