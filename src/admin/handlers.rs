use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;

use crate::http::server::AppState;

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub tracked_tenants: usize,
}

#[derive(Serialize)]
pub struct TenantQuotaView {
    pub tenant: String,
    pub request_count: u64,
    pub limit: u64,
    pub remaining: u64,
    pub window_secs: u64,
}

pub async fn get_status(State(state): State<AppState>) -> Json<SystemStatus> {
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        tracked_tenants: state.limiter.tracked_tenants(),
    })
}

/// Current usage for one tenant. Does not count as a request.
pub async fn get_tenant_quota(
    State(state): State<AppState>,
    Path(tenant): Path<String>,
) -> Json<TenantQuotaView> {
    let limit = state.limiter.limit_for(Some(&tenant));
    let status = state.limiter.get_status(Some(&tenant), limit);

    Json(TenantQuotaView {
        remaining: status.limit.saturating_sub(status.request_count),
        request_count: status.request_count,
        limit: status.limit,
        window_secs: state.limiter.config().window_secs,
        tenant,
    })
}
