//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → server.rs (Axum router, middleware, proxy handler)
//!     → request.rs (request ID, outbound header set)
//!     → [codec verifies, security filter admits, upstream fetches]
//!     → response.rs (status policy, filtered headers)
//!     → stream.rs (metered body relay)
//!     → Send to client
//! ```

pub mod error;
pub mod request;
pub mod response;
pub mod server;
pub mod stream;

pub use error::{BuildError, ProxyError};
pub use request::{UuidRequestId, X_REQUEST_ID};
pub use server::{AppState, HttpServer};
