//! Byte-counting wrapper around the upstream body stream.
//!
//! # Responsibilities
//! - Relay upstream chunks without buffering
//! - Cut the stream once an undeclared body passes the size limit
//! - Report the bytes actually relayed when the stream ends or is dropped
//!
//! A dropped stream that never reached its end means the client went away;
//! that is logged at debug and is not treated as a failure.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{ready, Context, Poll};

use axum::body::Bytes;
use futures_util::stream::{BoxStream, Stream};

use crate::observability::metrics;
use crate::observability::ProxyMetrics;

/// Why the relayed body was cut short.
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    #[error("body exceeded {0} bytes")]
    TooLarge(u64),
    #[error("upstream body failed: {0}")]
    Upstream(#[from] reqwest::Error),
}

pub struct MeteredStream {
    inner: BoxStream<'static, Result<Bytes, reqwest::Error>>,
    sent: u64,
    limit: Option<u64>,
    finished: bool,
    request_id: String,
    sink: Option<Arc<dyn ProxyMetrics>>,
}

impl MeteredStream {
    /// `limit` is enforced only when set; pass `None` when the upstream
    /// declared a length that already passed the size check.
    pub fn new(
        inner: BoxStream<'static, Result<Bytes, reqwest::Error>>,
        limit: Option<u64>,
        request_id: String,
        sink: Option<Arc<dyn ProxyMetrics>>,
    ) -> Self {
        Self {
            inner,
            sent: 0,
            limit,
            finished: false,
            request_id,
            sink,
        }
    }
}

impl Stream for MeteredStream {
    type Item = Result<Bytes, StreamError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.finished {
            return Poll::Ready(None);
        }

        match ready!(self.inner.as_mut().poll_next(cx)) {
            Some(Ok(chunk)) => {
                let total = self.sent + chunk.len() as u64;
                if let Some(limit) = self.limit {
                    if total > limit {
                        tracing::warn!(
                            request_id = %self.request_id,
                            limit,
                            "Upstream body exceeded size limit, truncating"
                        );
                        self.finished = true;
                        return Poll::Ready(Some(Err(StreamError::TooLarge(limit))));
                    }
                }
                self.sent = total;
                Poll::Ready(Some(Ok(chunk)))
            }
            Some(Err(e)) => {
                if e.is_timeout() {
                    tracing::warn!(request_id = %self.request_id, "Upstream body timed out");
                } else {
                    tracing::warn!(request_id = %self.request_id, error = %e, "Upstream body failed");
                }
                self.finished = true;
                Poll::Ready(Some(Err(e.into())))
            }
            None => {
                self.finished = true;
                Poll::Ready(None)
            }
        }
    }
}

impl Drop for MeteredStream {
    fn drop(&mut self) {
        if !self.finished {
            tracing::debug!(
                request_id = %self.request_id,
                bytes = self.sent,
                "Client disconnected mid-stream"
            );
        }
        if self.sent > 0 {
            metrics::record_bytes(self.sent);
            if let Some(sink) = &self.sink {
                sink.add_bytes(self.sent);
            }
        }
    }
}
