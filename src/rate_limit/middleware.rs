//! Inbound rate-limit middleware.
//!
//! Resolves the tenant key (authenticated [`TenantId`] extension first, then
//! the configured header), runs the admission check and either forwards the
//! request or answers `429 Too Many Requests`. Both paths carry the quota
//! headers.
//!
//! The header key is client-controlled, so every distinct value opens its own
//! window in the counter store. Entries only leave when the sweeper evicts
//! them after their window closes; deployments exposed to untrusted clients
//! should put an authentication layer in front that sets [`TenantId`], or use
//! a short `sweep_interval_secs`.

use std::sync::Arc;
use std::time::SystemTime;

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, HeaderValue, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::rate_limit::{RateLimitDecision, TenantRateLimiter};

pub const X_RATELIMIT_LIMIT: &str = "x-ratelimit-limit";
pub const X_RATELIMIT_REMAINING: &str = "x-ratelimit-remaining";
pub const X_RATELIMIT_RESET: &str = "x-ratelimit-reset";

/// Tenant identity placed in request extensions by an authentication layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantId(pub String);

/// Middleware function for per-tenant rate limiting.
pub async fn rate_limit_middleware(
    State(limiter): State<Arc<TenantRateLimiter>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let config = limiter.config();
    if !config.enabled {
        return next.run(request).await;
    }

    let tenant = request
        .extensions()
        .get::<TenantId>()
        .map(|id| id.0.clone())
        .or_else(|| {
            request
                .headers()
                .get(config.tenant_header.as_str())
                .and_then(|v| v.to_str().ok())
                .map(str::to_owned)
        });

    let decision = limiter.check_tenant(tenant.as_deref());

    if decision.is_allowed {
        let mut response = next.run(request).await;
        apply_quota_headers(response.headers_mut(), &decision);
        response
    } else {
        tracing::warn!(
            tenant = tenant.as_deref().unwrap_or("-"),
            limit = decision.limit,
            "Rate limit exceeded"
        );
        rejection_response(&decision, limiter.now())
    }
}

/// Attach `x-ratelimit-*` headers describing `decision`.
pub fn apply_quota_headers(headers: &mut HeaderMap, decision: &RateLimitDecision) {
    headers.insert(X_RATELIMIT_LIMIT, HeaderValue::from(decision.limit));
    headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(decision.remaining));
    headers.insert(X_RATELIMIT_RESET, HeaderValue::from(decision.reset_unix_secs()));
}

/// `429` response advising the client when to come back.
pub fn rejection_response(decision: &RateLimitDecision, now: SystemTime) -> Response {
    let wait = decision.retry_after(now);
    let retry_after_secs = (wait.as_secs() + u64::from(wait.subsec_nanos() > 0)).max(1);

    let body = json!({
        "error": "rate_limited",
        "limit": decision.limit,
        "remaining": 0,
        "reset_at": decision.reset_unix_secs(),
        "retry_after_secs": retry_after_secs,
    });

    let mut response = (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
    let headers = response.headers_mut();
    apply_quota_headers(headers, decision);
    headers.insert(header::RETRY_AFTER, HeaderValue::from(retry_after_secs));
    response
}
