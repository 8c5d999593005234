//! HTTP server setup.
//!
//! # Responsibilities
//! - Build the axum router for the node's role
//! - Wire up middleware (request id, tracing, timeout, identity, metrics)
//! - Serve plain TCP or TLS until the shutdown broadcast fires

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::extract::MatchedPath;
use axum::http::Request;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, post};
use axum::Router;
use axum_server::tls_rustls::RustlsConfig;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::request_id::{PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::client::HttpConfigClient;
use crate::config::TlsConfig;
use crate::http::handlers;
use crate::http::request::{make_span, request_id_header, MakeRequestUuid};
use crate::observability::metrics;
use crate::replica::RefreshAgent;
use crate::security::{identity_middleware, TokenAuthenticator};
use crate::store::{SlaveRegistry, VersionedStore};

/// What this node serves from.
#[derive(Clone)]
pub enum NodeHandle {
    Master(Arc<VersionedStore>),
    Replica(Arc<RefreshAgent<HttpConfigClient>>),
}

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub node: NodeHandle,
    pub slaves: Arc<SlaveRegistry>,
    pub name: String,
}

/// HTTP server of one configuration node.
pub struct NodeServer {
    router: Router,
}

impl NodeServer {
    pub fn new(state: AppState, auth: Arc<TokenAuthenticator>, request_timeout: Duration) -> Self {
        let router = Self::build_router(state, auth, request_timeout);
        Self { router }
    }

    /// The fully layered router, for embedding or in-process tests.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    #[allow(deprecated)]
    fn build_router(state: AppState, auth: Arc<TokenAuthenticator>, request_timeout: Duration) -> Router {
        Router::new()
            .route("/health", get(handlers::health))
            .route("/status", get(handlers::status))
            .route("/config/version", get(handlers::get_version))
            .route("/config/snapshot", get(handlers::get_snapshot))
            .route(
                "/config/slaves",
                get(handlers::list_slaves).post(handlers::publish_slave),
            )
            .route("/config/commit", post(handlers::commit))
            .route("/config/history", get(handlers::commit_history))
            .route("/config/history/snapshot", get(handlers::historical_snapshot))
            .route("/config/history/diff", get(handlers::diff_versions))
            .route("/config/rollback", post(handlers::rollback))
            .route("/config/refresh", post(handlers::force_refresh))
            .route_layer(middleware::from_fn(record_rpc))
            .with_state(state)
            .layer(middleware::from_fn_with_state(auth, identity_middleware))
            .layer(TimeoutLayer::new(request_timeout))
            .layer(PropagateRequestIdLayer::new(request_id_header()))
            .layer(TraceLayer::new_for_http().make_span_with(make_span))
            .layer(SetRequestIdLayer::new(request_id_header(), MakeRequestUuid))
    }

    /// Serve on `listener` until `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Serve TLS on `addr` until `shutdown` fires.
    pub async fn run_tls(
        self,
        addr: SocketAddr,
        tls: &TlsConfig,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let rustls = load_tls_config(tls).await?;
        let handle = axum_server::Handle::new();

        let drain = handle.clone();
        tokio::spawn(async move {
            let _ = shutdown.recv().await;
            drain.graceful_shutdown(Some(Duration::from_secs(10)));
        });

        tracing::info!(address = %addr, "HTTPS server starting");
        axum_server::bind_rustls(addr, rustls)
            .handle(handle)
            .serve(self.router.into_make_service())
            .await?;

        tracing::info!("HTTPS server stopped");
        Ok(())
    }
}

async fn load_tls_config(tls: &TlsConfig) -> Result<RustlsConfig, std::io::Error> {
    for path in [&tls.cert_path, &tls.key_path] {
        if !std::path::Path::new(path).exists() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("TLS file not found: {}", path),
            ));
        }
    }
    RustlsConfig::from_pem_file(&tls.cert_path, &tls.key_path).await
}

async fn record_rpc(request: Request<Body>, next: Next) -> Response {
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());
    let response = next.run(request).await;
    metrics::record_rpc(&route, response.status().as_u16());
    response
}
