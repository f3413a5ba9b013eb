//! HMAC-signed image proxy library.
//!
//! Clients request `/{digest}/{url}` (hex) or `/b/{digest}/{url}` (base64url);
//! the proxy verifies the signature, screens the target, fetches it and
//! relays the image with a filtered set of headers.

// Core subsystems
pub mod codec;
pub mod config;
pub mod http;
pub mod upstream;

// Cross-cutting concerns
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod security;

pub use codec::{Encoding, SigningKey};
pub use config::CamoConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
