//! HTTP server setup and the thin proxy handlers.
//!
//! # Responsibilities
//! - Create the Axum router: push/delete routes, status, index
//! - Wire up middleware (tracing, timeout, request ID)
//! - Ask the pool manager for the backend, then forward the request
//!   verbatim and relay the backend's status
//!
//! Routing errors map to client responses here: empty pool → 503, unknown
//! job on delete → 200 (a delete for nothing is a no-op), dead backend →
//! 502. The pool lock is released before any forwarding happens.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{header, Request, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, put},
    Json, Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::GatewayConfig;
use crate::error::GatewayError;
use crate::http::request::request_id_layers;
use crate::observability::metrics;
use crate::pool::{PoolManager, Target};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub pool: Arc<PoolManager>,
}

/// HTTP server for the gateway.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    /// Create a new HTTP server over the given pool.
    pub fn new(config: &GatewayConfig, pool: Arc<PoolManager>) -> Self {
        let state = AppState { pool };
        let prefix = config.gateway.normalized_route_prefix();

        let push_routes = put(push_handler).post(push_handler).delete(delete_handler);
        let (set_request_id, propagate_request_id) = request_id_layers();

        let router = Router::new()
            .route("/", get(index_handler))
            .route(&format!("{prefix}/status"), get(status_handler))
            .route(&format!("{prefix}/metrics/job/{{job}}"), push_routes.clone())
            .route(
                &format!("{prefix}/metrics/job/{{job}}/{{*labels}}"),
                push_routes,
            )
            .with_state(state)
            .layer(TimeoutLayer::new(Duration::from_secs(
                config.listener.request_timeout_secs,
            )))
            .layer(propagate_request_id)
            .layer(set_request_id)
            .layer(TraceLayer::new_for_http());

        Self { router }
    }

    /// Run the server until the shutdown signal fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let app = self
            .router
            .into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

async fn index_handler() -> &'static str {
    concat!("pushmux ", env!("CARGO_PKG_VERSION"), "\n")
}

async fn status_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "strategy": state.pool.strategy_name(),
        "resources": state.pool.snapshot(),
    }))
}

/// PUT/POST of a push path: route by affinity, forward, relay status.
async fn push_handler(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request<Body>,
) -> Response {
    let path = request.uri().path().to_string();
    let target = match state.pool.find_or_assign(&addr.to_string(), &path) {
        Ok(target) => target,
        Err(GatewayError::PoolEmpty) => {
            tracing::warn!(path = %path, "push with no backend resources available");
            return (StatusCode::SERVICE_UNAVAILABLE, "no backend resources available")
                .into_response();
        }
        Err(e) => {
            tracing::error!(path = %path, error = %e, "routing failed");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };
    forward(target, request).await
}

/// DELETE of a push path: drop the affinity entry and forward the delete.
async fn delete_handler(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request<Body>,
) -> Response {
    let path = request.uri().path().to_string();
    let target = match state.pool.delete_job(&addr.to_string(), &path) {
        Ok(target) => target,
        Err(GatewayError::JobNotFound { host, path }) => {
            // deleting a job we never routed is a no-op, not a failure
            tracing::debug!(host = %host, path = %path, "delete for unknown job");
            return StatusCode::OK.into_response();
        }
        Err(e) => {
            tracing::error!(path = %path, error = %e, "delete routing failed");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };
    forward(target, request).await
}

/// Copy the request through to the chosen backend and relay its response.
/// Method and body are forwarded verbatim; the backend sees
/// `base_url + original path`.
async fn forward(target: Target, request: Request<Body>) -> Response {
    let start = Instant::now();
    let (parts, body) = request.into_parts();
    let method = parts.method.clone();

    let uri = format!(
        "{}{}",
        target.base_url.as_str().trim_end_matches('/'),
        parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or_else(|| parts.uri.path())
    );

    let mut builder = Request::builder().method(method.clone()).uri(uri.as_str());
    if let Some(headers) = builder.headers_mut() {
        for (name, value) in parts.headers.iter() {
            if name != header::HOST {
                headers.insert(name.clone(), value.clone());
            }
        }
    }
    let outbound = match builder.body(body) {
        Ok(outbound) => outbound,
        Err(e) => {
            tracing::error!(uri = %uri, error = %e, "failed to build outbound request");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    match target.client.request(outbound).await {
        Ok(response) => {
            let status = response.status();
            if !status.is_success() {
                tracing::warn!(
                    backend = %target.id,
                    status = %status,
                    "backend returned non-success status"
                );
            }
            metrics::record_request(method.as_str(), status.as_u16(), &target.id, start);
            let (parts, body) = response.into_parts();
            Response::from_parts(parts, Body::new(body)).into_response()
        }
        Err(e) => {
            tracing::error!(backend = %target.id, uri = %uri, error = %e, "backend request failed");
            metrics::record_request(
                method.as_str(),
                StatusCode::BAD_GATEWAY.as_u16(),
                &target.id,
                start,
            );
            (StatusCode::BAD_GATEWAY, "backend request failed").into_response()
        }
    }
}
