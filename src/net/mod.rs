//! Network layer subsystem.
//!
//! Plain TCP listeners are bound directly in `main`; this module only holds
//! what the optional HTTPS listener needs.

pub mod tls;

pub use tls::load_tls_config;
