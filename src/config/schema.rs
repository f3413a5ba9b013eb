//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the image proxy.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CamoConfig {
    /// Identity sent upstream as User-Agent/Via and to clients as Server.
    pub server_name: String,

    /// Listener configuration (bind address, TLS).
    pub listener: ListenerConfig,

    /// HMAC signing settings.
    pub signing: SigningConfig,

    /// Host allow/deny patterns.
    pub filters: FilterConfig,

    /// Upstream fetch limits and behavior.
    pub upstream: UpstreamConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl Default for CamoConfig {
    fn default() -> Self {
        Self {
            server_name: format!("camo-proxy/{}", env!("CARGO_PKG_VERSION")),
            listener: ListenerConfig::default(),
            signing: SigningConfig::default(),
            filters: FilterConfig::default(),
            upstream: UpstreamConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Optional TLS configuration.
    pub tls: Option<TlsConfig>,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            tls: None,
        }
    }
}

/// TLS configuration for the listener.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TlsConfig {
    /// Path to certificate file (PEM).
    pub cert_path: String,

    /// Path to private key file (PEM).
    pub key_path: String,
}

/// Signing configuration.
#[derive(Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct SigningConfig {
    /// HMAC key shared with whatever generates signed urls.
    pub hmac_key: String,
}

impl std::fmt::Debug for SigningConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningConfig")
            .field("hmac_key", &"<redacted>")
            .finish()
    }
}

/// Host filtering patterns (regular expressions matched against the target host).
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct FilterConfig {
    /// When non-empty, the host must match at least one pattern.
    pub allow_list: Vec<String>,

    /// A host matching any pattern is refused, even if allow-listed.
    pub deny_list: Vec<String>,
}

/// Upstream fetch configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Maximum response size in bytes.
    pub max_size: u64,

    /// Follow upstream redirects.
    pub follow_redirects: bool,

    /// Redirect hop limit when following.
    pub max_redirects: usize,

    /// Connect and transfer timeout in seconds.
    pub request_timeout_secs: u64,

    /// How often idle pooled connections are dropped, in seconds.
    pub idle_reap_interval_secs: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            max_size: 5 * 1024 * 1024, // 5MB
            follow_redirects: true,
            max_redirects: 10,
            request_timeout_secs: 4,
            idle_reap_interval_secs: 300,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Serve the plain-text stats report.
    pub stats_enabled: bool,

    /// Path of the stats report.
    pub stats_path: String,

    /// Enable Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            stats_enabled: false,
            stats_path: "/status".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
