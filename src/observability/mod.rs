//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Request handlers produce:
//!     → logging.rs (structured log events via tracing)
//!     → metrics.rs (Prometheus counters, optional exporter)
//!     → stats.rs (in-process meters behind the plain-text stats path)
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON or human) for machine parsing
//! - Request ID from the request-id layer is attached to every request log line
//! - Metric updates never block the request path

pub mod logging;
pub mod metrics;
pub mod stats;

pub use stats::{ProxyMetrics, ProxyStats};
