//! Outbound fetch subsystem.
//!
//! # Data Flow
//! ```text
//! admitted target + filtered headers
//!     → client.rs (shared reqwest client, redirect re-checks)
//!     → resolver.rs (DNS answers screened for private ranges)
//!     → upstream origin
//!
//! reaper.rs (background): periodically swaps in a fresh client
//! ```

pub mod client;
pub mod reaper;
pub mod resolver;

pub use client::{TooManyRedirects, UpstreamClient, UpstreamSettings};
pub use reaper::IdleReaper;
pub use resolver::GuardedResolver;
