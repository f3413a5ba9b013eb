//! Shared outbound HTTP client.
//!
//! # Responsibilities
//! - Build the one `reqwest::Client` every request fetches through
//! - Bound connect and total transfer time by the configured timeout
//! - Re-run the security filter on every redirect hop
//! - Swap in a fresh client on demand so idle pooled connections are released
//!
//! # Design Decisions
//! - Client is held in an `ArcSwap`; in-flight requests keep the old client
//!   alive until they finish, new requests see the fresh one
//! - Environment proxies are ignored; the proxy must connect directly
//! - Hostnames resolve through `GuardedResolver`

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use axum::http::HeaderMap;
use reqwest::redirect::Policy;
use url::Url;

use crate::config::UpstreamConfig;
use crate::security::SecurityFilter;
use crate::upstream::resolver::GuardedResolver;

/// Redirect chain exceeded the configured hop budget.
#[derive(Debug, thiserror::Error)]
#[error("stopped after {0} redirects")]
pub struct TooManyRedirects(pub usize);

/// Settings the client is rebuilt from.
#[derive(Debug, Clone)]
pub struct UpstreamSettings {
    pub timeout: Duration,
    pub follow_redirects: bool,
    pub max_redirects: usize,
    /// Hostnames forced to a fixed address, bypassing DNS.
    pub pinned_hosts: Vec<(String, SocketAddr)>,
}

impl UpstreamSettings {
    pub fn from_config(config: &UpstreamConfig) -> Self {
        Self {
            timeout: Duration::from_secs(config.request_timeout_secs),
            follow_redirects: config.follow_redirects,
            max_redirects: config.max_redirects,
            pinned_hosts: Vec::new(),
        }
    }
}

pub struct UpstreamClient {
    settings: UpstreamSettings,
    filter: Arc<SecurityFilter>,
    client: ArcSwap<reqwest::Client>,
}

impl UpstreamClient {
    pub fn new(
        settings: UpstreamSettings,
        filter: Arc<SecurityFilter>,
    ) -> Result<Self, reqwest::Error> {
        let client = build_client(&settings, &filter)?;
        Ok(Self {
            settings,
            filter,
            client: ArcSwap::from_pointee(client),
        })
    }

    /// Replace the shared client with a freshly built one.
    pub fn refresh(&self) -> Result<(), reqwest::Error> {
        let fresh = build_client(&self.settings, &self.filter)?;
        self.client.store(Arc::new(fresh));
        Ok(())
    }

    /// The client new requests will use.
    pub fn current(&self) -> Arc<reqwest::Client> {
        self.client.load_full()
    }

    /// Issue a GET for `target` with exactly `headers`.
    pub async fn fetch(
        &self,
        target: Url,
        headers: HeaderMap,
    ) -> Result<reqwest::Response, reqwest::Error> {
        self.current().get(target).headers(headers).send().await
    }
}

fn build_client(
    settings: &UpstreamSettings,
    filter: &Arc<SecurityFilter>,
) -> Result<reqwest::Client, reqwest::Error> {
    let mut builder = reqwest::Client::builder()
        .connect_timeout(settings.timeout)
        .timeout(settings.timeout)
        .no_proxy()
        .redirect(redirect_policy(settings, filter.clone()))
        .dns_resolver(Arc::new(GuardedResolver));

    for (host, addr) in &settings.pinned_hosts {
        builder = builder.resolve(host, *addr);
    }

    builder.build()
}

fn redirect_policy(settings: &UpstreamSettings, filter: Arc<SecurityFilter>) -> Policy {
    if !settings.follow_redirects {
        return Policy::none();
    }

    let max = settings.max_redirects;
    Policy::custom(move |attempt| {
        if attempt.previous().len() > max {
            return attempt.error(TooManyRedirects(max));
        }
        match filter.admit_redirect(attempt.url()) {
            Ok(()) => attempt.follow(),
            Err(denial) => {
                tracing::debug!(url = %attempt.url(), reason = %denial, "Redirect hop denied");
                attempt.stop()
            }
        }
    })
}
