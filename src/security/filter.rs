//! Target admission checks.
//!
//! # Check Order
//! ```text
//! scheme http/https
//!     → host present
//!     → host not a loopback name or loopback literal
//!     → inbound request did not come from this proxy (Via loop)
//!     → allow list (only when configured)
//!     → deny list (always, wins over allow)
//!     → literal IP not in a private/reserved range
//! ```
//!
//! # Design Decisions
//! - First failing check wins; the reason is for logs only
//! - Patterns are compiled once at construction and never mutated
//! - Checks run on the textual host; resolved addresses are guarded separately
//!   by the upstream resolver
//! - Allow/deny patterns see the authority (`host[:port]`); a scheme's default
//!   port is normalized away, so `:80` on http reads as the bare host

use axum::http::{header::VIA, HeaderMap};
use regex::Regex;
use url::{Host, Url};

use crate::security::network::{is_loopback_name, is_restricted_ip};

/// Why a target was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Denial {
    #[error("unsupported scheme")]
    UnsupportedScheme,
    #[error("empty host")]
    EmptyHost,
    #[error("loopback host")]
    Loopback,
    #[error("request loop")]
    RequestLoop,
    #[error("host not in allow list")]
    NotAllowListed,
    #[error("host in deny list")]
    DenyListed,
    #[error("private or reserved address")]
    RestrictedAddress,
}

impl Denial {
    /// Short stable label for metrics.
    pub fn label(self) -> &'static str {
        match self {
            Denial::UnsupportedScheme => "scheme",
            Denial::EmptyHost => "empty_host",
            Denial::Loopback => "loopback",
            Denial::RequestLoop => "loop",
            Denial::NotAllowListed => "allow_list",
            Denial::DenyListed => "deny_list",
            Denial::RestrictedAddress => "private_address",
        }
    }
}

/// Compiled allow/deny policy plus the proxy identity used for loop detection.
#[derive(Debug)]
pub struct SecurityFilter {
    allow: Vec<Regex>,
    deny: Vec<Regex>,
    identity: String,
}

impl SecurityFilter {
    /// Compile the allow and deny patterns. Any invalid pattern is an error.
    pub fn new(
        allow: &[String],
        deny: &[String],
        identity: impl Into<String>,
    ) -> Result<Self, regex::Error> {
        Ok(Self {
            allow: compile(allow)?,
            deny: compile(deny)?,
            identity: identity.into(),
        })
    }

    /// Full admission check for a freshly verified target.
    pub fn admit(&self, target: &Url, inbound: &HeaderMap) -> Result<(), Denial> {
        let authority = self.check_origin(target)?;
        self.check_loop(inbound)?;
        self.check_lists(&authority)?;
        check_address(target)
    }

    /// Admission check for a redirect hop, which has no inbound request of its own.
    pub fn admit_redirect(&self, target: &Url) -> Result<(), Denial> {
        let authority = self.check_origin(target)?;
        self.check_lists(&authority)?;
        check_address(target)
    }

    /// Returns the lowercased authority the lists are matched against.
    fn check_origin(&self, target: &Url) -> Result<String, Denial> {
        if !matches!(target.scheme(), "http" | "https") {
            return Err(Denial::UnsupportedScheme);
        }

        let host = match target.host_str() {
            Some(h) if !h.is_empty() => h.to_ascii_lowercase(),
            _ => return Err(Denial::EmptyHost),
        };

        let loopback = match target.host() {
            Some(Host::Domain(name)) => is_loopback_name(name),
            Some(Host::Ipv4(ip)) => ip.is_loopback(),
            Some(Host::Ipv6(ip)) => ip.is_loopback(),
            None => false,
        };
        if loopback {
            return Err(Denial::Loopback);
        }

        Ok(match target.port() {
            Some(port) => format!("{host}:{port}"),
            None => host,
        })
    }

    fn check_loop(&self, inbound: &HeaderMap) -> Result<(), Denial> {
        let looped = inbound
            .get_all(VIA)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .any(|v| v.contains(self.identity.as_str()));

        if looped {
            Err(Denial::RequestLoop)
        } else {
            Ok(())
        }
    }

    fn check_lists(&self, authority: &str) -> Result<(), Denial> {
        if !self.allow.is_empty() && !self.allow.iter().any(|rgx| rgx.is_match(authority)) {
            return Err(Denial::NotAllowListed);
        }
        if self.deny.iter().any(|rgx| rgx.is_match(authority)) {
            return Err(Denial::DenyListed);
        }
        Ok(())
    }
}

fn check_address(target: &Url) -> Result<(), Denial> {
    let restricted = match target.host() {
        Some(Host::Ipv4(ip)) => is_restricted_ip(ip.into()),
        Some(Host::Ipv6(ip)) => is_restricted_ip(ip.into()),
        _ => false,
    };

    if restricted {
        Err(Denial::RestrictedAddress)
    } else {
        Ok(())
    }
}

fn compile(patterns: &[String]) -> Result<Vec<Regex>, regex::Error> {
    patterns.iter().map(|p| Regex::new(p)).collect()
}
