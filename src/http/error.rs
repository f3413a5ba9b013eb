//! Per-request failure outcomes and their client-visible status.
//!
//! # Design Decisions
//! - The body is only the canonical reason phrase; the variant detail is for
//!   logs and never reaches the client
//! - Every security-filter denial surfaces as a plain 404

use axum::http::header::InvalidHeaderValue;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::codec::CodecError;
use crate::security::Denial;

#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("signature verification failed: {0}")]
    BadSignature(#[from] CodecError),

    #[error("invalid target url: {0}")]
    BadUrl(String),

    #[error("target denied: {0}")]
    Denied(#[from] Denial),

    #[error("declared length {length} exceeds limit {limit}")]
    ContentTooLarge { length: u64, limit: u64 },

    #[error("non-image content type {0:?}")]
    NonImageContentType(String),

    #[error("upstream answered 300 multiple choices")]
    MultipleChoices,

    #[error("upstream redirect {0} not followed")]
    Redirect(u16),

    #[error("upstream answered 404")]
    UpstreamNotFound,

    #[error("upstream unavailable ({0})")]
    UpstreamUnavailable(u16),

    #[error("unsupported upstream status {0}")]
    UpstreamStatus(u16),

    #[error("upstream timed out")]
    UpstreamTimeout,

    #[error("upstream request failed: {0}")]
    Upstream(String),
}

impl ProxyError {
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::BadSignature(_) => StatusCode::FORBIDDEN,
            ProxyError::BadUrl(_) | ProxyError::NonImageContentType(_) => StatusCode::BAD_REQUEST,
            ProxyError::UpstreamUnavailable(_) | ProxyError::UpstreamTimeout => {
                StatusCode::BAD_GATEWAY
            }
            ProxyError::Denied(_)
            | ProxyError::ContentTooLarge { .. }
            | ProxyError::MultipleChoices
            | ProxyError::Redirect(_)
            | ProxyError::UpstreamNotFound
            | ProxyError::UpstreamStatus(_)
            | ProxyError::Upstream(_) => StatusCode::NOT_FOUND,
        }
    }

    /// Classify a transport failure from the upstream client.
    pub fn from_transport(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            ProxyError::UpstreamTimeout
        } else {
            ProxyError::Upstream(err.to_string())
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = self.status();
        let reason = status.canonical_reason().unwrap_or("Error");
        (status, reason).into_response()
    }
}

/// Failure to assemble the server from a validated configuration.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("invalid filter pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("server name is not a valid header value: {0}")]
    Identity(#[from] InvalidHeaderValue),

    #[error("failed to build upstream client: {0}")]
    Client(#[from] reqwest::Error),
}
