//! HTTP server setup.
//!
//! # Responsibilities
//! - Build the Axum router and its middleware stack
//! - Gate `/api/*` with the tenant rate limiter
//! - Forward gated requests upstream through the retry executor
//! - Cancel in-flight retries on shutdown or when the request deadline passes
//! - Translate failures into diagnostic responses

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Path, State},
    http::{HeaderName, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;
use tokio::net::TcpListener;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::admin::setup_admin_router;
use crate::config::{AdminConfig, GovernanceConfig};
use crate::http::request::{UuidRequestId, X_REQUEST_ID};
use crate::lifecycle::Shutdown;
use crate::rate_limit::{rate_limit_middleware, TenantRateLimiter};
use crate::resilience::{RetryError, RetryExecutor, RetryPolicy};
use crate::upstream::{UpstreamClient, UpstreamError};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub limiter: Arc<TenantRateLimiter>,
    pub executor: RetryExecutor,
    pub upstream: UpstreamClient,
    pub shutdown: Shutdown,
    pub admin: AdminConfig,
    pub request_timeout: Duration,
}

/// HTTP gateway in front of the upstream API.
pub struct GatewayServer {
    router: Router,
    shutdown: Shutdown,
}

impl GatewayServer {
    pub fn new(
        config: &GovernanceConfig,
        limiter: Arc<TenantRateLimiter>,
        shutdown: Shutdown,
    ) -> Result<Self, UpstreamError> {
        let state = AppState {
            limiter,
            executor: RetryExecutor::new(RetryPolicy::from(&config.retries)),
            upstream: UpstreamClient::new(&config.upstream)?,
            shutdown: shutdown.clone(),
            admin: config.admin.clone(),
            request_timeout: Duration::from_secs(config.listener.request_timeout_secs),
        };

        Ok(Self {
            router: Self::build_router(state),
            shutdown,
        })
    }

    fn build_router(state: AppState) -> Router {
        let api = Router::new()
            .route("/api/{*path}", get(forward_handler))
            .layer(middleware::from_fn_with_state(
                state.limiter.clone(),
                rate_limit_middleware,
            ))
            .with_state(state.clone());

        let mut router = Router::new().merge(api);
        if state.admin.enabled {
            router = router.merge(setup_admin_router(state));
        }

        router
            .layer(PropagateRequestIdLayer::new(HeaderName::from_static(X_REQUEST_ID)))
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::new(HeaderName::from_static(X_REQUEST_ID), UuidRequestId))
    }

    /// The assembled router, for in-process use and tests.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve until the shutdown signal fires.
    pub async fn run(self, listener: TcpListener) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP gateway starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(self.shutdown.signalled())
            .await?;

        tracing::info!("HTTP gateway stopped");
        Ok(())
    }
}

/// Forward `GET /api/{path}` to the upstream.
async fn forward_handler(State(state): State<AppState>, Path(path): Path<String>) -> Response {
    let deadline = state.request_timeout;
    let shutdown = state.shutdown.signalled();
    let cancelled = async move {
        tokio::select! {
            _ = shutdown => {}
            _ = tokio::time::sleep(deadline) => {}
        }
    };

    match state
        .upstream
        .get_json_with_retry_until(&state.executor, &path, cancelled)
        .await
    {
        Ok(body) => Json(body).into_response(),
        Err(RetryError::Failed(e)) => upstream_failure_response(&e),
        Err(RetryError::Cancelled { attempts, .. }) => (
            StatusCode::GATEWAY_TIMEOUT,
            Json(json!({
                "error": "upstream_cancelled",
                "attempts": attempts,
            })),
        )
            .into_response(),
    }
}

/// Diagnostic `502` for a permanent or exhausted upstream failure.
pub fn upstream_failure_response(error: &UpstreamError) -> Response {
    tracing::warn!(error = %error, "Upstream call failed");
    (
        StatusCode::BAD_GATEWAY,
        Json(json!({
            "error": "upstream_failed",
            "upstream_status": error.status(),
            "upstream_code": error.code(),
            "message": error.to_string(),
        })),
    )
        .into_response()
}
