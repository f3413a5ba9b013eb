//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Verified target url:
//!     → filter.rs (scheme, host, loop, allow/deny, private literal)
//!     → headers.rs (request-direction header policy, X-Forwarded-For)
//!     → Pass to upstream fetch
//!
//! Upstream response:
//!     → headers.rs (response-direction header policy)
//! ```
//!
//! # Design Decisions
//! - Defense in depth: pattern policy, literal IP ranges, resolver guard
//! - Fail closed: reject on any security check failure
//! - No trust in client input

pub mod filter;
pub mod headers;
pub mod network;

pub use filter::{Denial, SecurityFilter};
