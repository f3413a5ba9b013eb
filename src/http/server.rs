//! HTTP server setup and the proxy handler.
//!
//! # Responsibilities
//! - Create the Axum router with the hex, base64 and optional stats routes
//! - Wire up middleware (request ID, tracing, identity headers, timeout)
//! - Verify signed paths, admit targets, fetch and relay the upstream body
//! - Run the idle reaper alongside the listener until shutdown

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::{ConnectInfo, Path, State},
    http::{header, HeaderMap, HeaderName, HeaderValue, Request, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use axum_server::tls_rustls::RustlsConfig;
use futures_util::StreamExt;
use tokio::net::TcpListener;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    set_header::SetResponseHeaderLayer,
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use url::Url;

use crate::codec::{self, Encoding, SigningKey};
use crate::config::CamoConfig;
use crate::http::error::{BuildError, ProxyError};
use crate::http::request::{request_id, upstream_headers, UuidRequestId, X_REQUEST_ID};
use crate::http::response::{declared_length, evaluate, relay, Disposition};
use crate::http::stream::MeteredStream;
use crate::lifecycle::Shutdown;
use crate::observability::{metrics, ProxyMetrics, ProxyStats};
use crate::security::SecurityFilter;
use crate::upstream::{IdleReaper, UpstreamClient, UpstreamSettings};

const X_CONTENT_TYPE_OPTIONS: HeaderName = HeaderName::from_static("x-content-type-options");

/// Grace period for in-flight TLS connections after shutdown.
const TLS_DRAIN: Duration = Duration::from_secs(10);

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub key: Arc<SigningKey>,
    pub filter: Arc<SecurityFilter>,
    pub upstream: Arc<UpstreamClient>,
    pub identity: HeaderValue,
    pub max_size: u64,
    pub metrics: Option<Arc<dyn ProxyMetrics>>,
}

/// HTTP server for the image proxy.
pub struct HttpServer {
    router: Router,
    config: CamoConfig,
    upstream: Arc<UpstreamClient>,
    stats: Option<Arc<ProxyStats>>,
}

impl HttpServer {
    /// Create a server from a validated configuration.
    pub fn new(config: CamoConfig) -> Result<Self, BuildError> {
        Self::with_pinned_hosts(config, Vec::new())
    }

    /// Like [`HttpServer::new`], with hostnames forced to fixed addresses
    /// instead of being resolved.
    pub fn with_pinned_hosts(
        config: CamoConfig,
        pinned_hosts: Vec<(String, SocketAddr)>,
    ) -> Result<Self, BuildError> {
        let identity = HeaderValue::from_str(&config.server_name)?;
        let filter = Arc::new(SecurityFilter::new(
            &config.filters.allow_list,
            &config.filters.deny_list,
            config.server_name.clone(),
        )?);

        let mut settings = UpstreamSettings::from_config(&config.upstream);
        settings.pinned_hosts = pinned_hosts;
        let upstream = Arc::new(UpstreamClient::new(settings, filter.clone())?);

        let stats = config
            .observability
            .stats_enabled
            .then(|| Arc::new(ProxyStats::new()));

        let state = AppState {
            key: Arc::new(SigningKey::new(config.signing.hmac_key.as_bytes())),
            filter,
            upstream: upstream.clone(),
            identity: identity.clone(),
            max_size: config.upstream.max_size,
            metrics: stats.clone().map(|s| s as Arc<dyn ProxyMetrics>),
        };

        let router = Self::build_router(&config, state, stats.clone(), identity);
        Ok(Self {
            router,
            config,
            upstream,
            stats,
        })
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(
        config: &CamoConfig,
        state: AppState,
        stats: Option<Arc<ProxyStats>>,
        identity: HeaderValue,
    ) -> Router {
        let mut router = Router::new()
            .route("/{digest}/{url}", get(proxy_hex))
            .route("/b/{digest}/{url}", get(proxy_base64));

        if let Some(stats) = stats {
            router = router.route(
                &config.observability.stats_path,
                get(move || {
                    let stats = stats.clone();
                    async move { stats.report() }
                }),
            );
        }

        let timeout = Duration::from_secs(config.upstream.request_timeout_secs * 2);

        router
            .with_state(state)
            .layer(TimeoutLayer::new(timeout))
            .layer(SetResponseHeaderLayer::overriding(header::SERVER, identity))
            .layer(SetResponseHeaderLayer::overriding(
                X_CONTENT_TYPE_OPTIONS,
                HeaderValue::from_static("nosniff"),
            ))
            .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                tracing::debug_span!(
                    "request",
                    method = %request.method(),
                    request_id = %request_id(request.headers()),
                )
            }))
            .layer(PropagateRequestIdLayer::new(HeaderName::from_static(X_REQUEST_ID)))
            .layer(SetRequestIdLayer::new(
                HeaderName::from_static(X_REQUEST_ID),
                UuidRequestId,
            ))
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(self, listener: TcpListener, shutdown: Shutdown) -> io::Result<()> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let mut stop = shutdown.subscribe();
        self.spawn_reaper(&shutdown);

        let app = self
            .router
            .into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = stop.recv().await;
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Run the server over TLS on `addr`.
    pub async fn run_tls(
        self,
        addr: SocketAddr,
        tls: RustlsConfig,
        shutdown: Shutdown,
    ) -> io::Result<()> {
        tracing::info!(address = %addr, "HTTPS server starting");

        let handle = axum_server::Handle::new();
        let mut stop = shutdown.subscribe();
        tokio::spawn({
            let handle = handle.clone();
            async move {
                let _ = stop.recv().await;
                handle.graceful_shutdown(Some(TLS_DRAIN));
            }
        });
        self.spawn_reaper(&shutdown);

        let app = self
            .router
            .into_make_service_with_connect_info::<SocketAddr>();
        axum_server::bind_rustls(addr, tls)
            .handle(handle)
            .serve(app)
            .await?;

        tracing::info!("HTTPS server stopped");
        Ok(())
    }

    fn spawn_reaper(&self, shutdown: &Shutdown) {
        let interval = Duration::from_secs(self.config.upstream.idle_reap_interval_secs);
        let reaper = IdleReaper::new(self.upstream.clone(), interval);
        tokio::spawn(reaper.run(shutdown.subscribe()));
    }

    /// The stats meters, when enabled.
    pub fn stats(&self) -> Option<Arc<ProxyStats>> {
        self.stats.clone()
    }
}

async fn proxy_hex(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    Path((digest, url)): Path<(String, String)>,
    headers: HeaderMap,
) -> Response {
    serve_signed(state, Encoding::Hex, &digest, &url, peer, headers).await
}

async fn proxy_base64(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    Path((digest, url)): Path<(String, String)>,
    headers: HeaderMap,
) -> Response {
    serve_signed(state, Encoding::Base64, &digest, &url, peer, headers).await
}

async fn serve_signed(
    state: AppState,
    encoding: Encoding,
    digest: &str,
    encoded_url: &str,
    peer: SocketAddr,
    inbound: HeaderMap,
) -> Response {
    if let Some(sink) = state.metrics.clone() {
        tokio::spawn(async move { sink.add_served() });
    }

    let request_id = request_id(&inbound).to_owned();
    let response = match proxy(&state, encoding, digest, encoded_url, peer, &inbound, &request_id).await {
        Ok(response) => response,
        Err(err) => {
            log_failure(&request_id, &err);
            err.into_response()
        }
    };

    metrics::record_request(response.status().as_u16());
    response
}

async fn proxy(
    state: &AppState,
    encoding: Encoding,
    digest: &str,
    encoded_url: &str,
    peer: SocketAddr,
    inbound: &HeaderMap,
    request_id: &str,
) -> Result<Response, ProxyError> {
    let raw = codec::verify(&state.key, encoding, digest, encoded_url)?;
    let text = String::from_utf8(raw).map_err(|e| ProxyError::BadUrl(e.to_string()))?;
    let target = Url::parse(&text).map_err(|e| ProxyError::BadUrl(e.to_string()))?;

    state.filter.admit(&target, inbound)?;

    tracing::debug!(request_id = %request_id, url = %target, "Fetching upstream");

    let headers = upstream_headers(inbound, peer.ip(), &state.identity);
    let upstream = state
        .upstream
        .fetch(target, headers)
        .await
        .map_err(|e| ProxyError::from_transport(&e))?;

    let status = upstream.status();
    match evaluate(status, upstream.headers(), state.max_size)? {
        Disposition::NotModified => Ok(relay(
            StatusCode::NOT_MODIFIED,
            upstream.headers(),
            Body::empty(),
        )),
        Disposition::Stream => {
            let headers = upstream.headers().clone();
            let limit = match declared_length(&headers) {
                Some(_) => None,
                None => Some(state.max_size),
            };
            let body = MeteredStream::new(
                upstream.bytes_stream().boxed(),
                limit,
                request_id.to_owned(),
                state.metrics.clone(),
            );
            Ok(relay(StatusCode::OK, &headers, Body::from_stream(body)))
        }
    }
}

fn log_failure(request_id: &str, err: &ProxyError) {
    match err {
        ProxyError::Denied(denial) => {
            metrics::record_denied(denial.label());
            tracing::debug!(request_id = %request_id, reason = %denial, "Target denied");
        }
        ProxyError::UpstreamTimeout | ProxyError::Upstream(_) | ProxyError::UpstreamUnavailable(_) => {
            tracing::warn!(request_id = %request_id, error = %err, "Upstream fetch failed");
        }
        _ => {
            tracing::debug!(request_id = %request_id, error = %err, "Request rejected");
        }
    }
}
