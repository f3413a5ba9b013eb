//! DNS resolution that refuses private and reserved addresses.
//!
//! The security filter only sees the textual host. A public name can still
//! resolve to an internal address, so every lookup made by the upstream client
//! goes through [`GuardedResolver`] and the connection is made only to the
//! addresses that survive the same range check.

use std::error::Error;
use std::net::SocketAddr;

use reqwest::dns::{Addrs, Name, Resolve, Resolving};

use crate::security::network::is_restricted_ip;

/// Every address a name resolved to was restricted.
#[derive(Debug, thiserror::Error)]
#[error("{host} resolves only to private or reserved addresses")]
pub struct RestrictedResolution {
    pub host: String,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct GuardedResolver;

impl Resolve for GuardedResolver {
    fn resolve(&self, name: Name) -> Resolving {
        Box::pin(lookup(name.as_str().to_owned()))
    }
}

async fn lookup(host: String) -> Result<Addrs, Box<dyn Error + Send + Sync>> {
    let resolved = tokio::net::lookup_host((host.as_str(), 0)).await?;
    let admitted = admit_addrs(resolved);
    if admitted.is_empty() {
        tracing::debug!(host = %host, "Resolution refused, no public addresses");
        return Err(Box::new(RestrictedResolution { host }));
    }
    Ok(Box::new(admitted.into_iter()))
}

/// Keep only addresses that are safe to connect to.
pub fn admit_addrs(addrs: impl IntoIterator<Item = SocketAddr>) -> Vec<SocketAddr> {
    addrs
        .into_iter()
        .filter(|addr| !is_restricted_ip(addr.ip()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admit_addrs_drops_restricted() {
        let addrs: Vec<SocketAddr> = vec![
            "127.0.0.1:0".parse().unwrap(),
            "10.1.2.3:0".parse().unwrap(),
            "93.184.216.34:0".parse().unwrap(),
            "[::1]:0".parse().unwrap(),
            "[2606:2800:220:1::1]:0".parse().unwrap(),
        ];
        let admitted = admit_addrs(addrs);
        assert_eq!(
            admitted,
            vec![
                "93.184.216.34:0".parse::<SocketAddr>().unwrap(),
                "[2606:2800:220:1::1]:0".parse().unwrap(),
            ]
        );
    }

    #[tokio::test]
    async fn test_localhost_resolution_refused() {
        let err = lookup("localhost".to_string()).await.err().unwrap();
        // either every address was dropped or the name did not resolve at all
        if let Some(restricted) = err.downcast_ref::<RestrictedResolution>() {
            assert_eq!(restricted.host, "localhost");
        }
    }
}
