//! Configuration validation.
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GovernanceConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use axum::http::HeaderName;
use thiserror::Error;
use url::Url;

use crate::config::schema::{GovernanceConfig, MAX_WINDOW_SECS};

/// Upper bound on configured retries.
pub const MAX_RETRIES_LIMIT: u32 = 10;

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("rate_limit.window_secs must be greater than zero")]
    ZeroWindow,

    #[error("rate_limit.window_secs {0} exceeds the maximum of {max}", max = MAX_WINDOW_SECS)]
    WindowTooLong(u64),

    #[error("rate_limit.tenant_header `{0}` is not a valid header name")]
    InvalidTenantHeader(String),

    #[error("tenant `{tenant}` references unknown plan `{plan}`")]
    UnknownPlan { tenant: String, plan: String },

    #[error("retries.max_retries {0} exceeds the maximum of {max}", max = MAX_RETRIES_LIMIT)]
    TooManyRetries(u32),

    #[error("retries.base_delay_ms ({base_ms}) exceeds retries.max_delay_ms ({max_ms})")]
    BackoffBounds { base_ms: u64, max_ms: u64 },

    #[error("upstream.base_url `{url}` is invalid: {reason}")]
    InvalidUpstreamUrl { url: String, reason: String },

    #[error("upstream.timeout_secs must be greater than zero")]
    ZeroUpstreamTimeout,

    #[error("listener.request_timeout_secs must be greater than zero")]
    ZeroRequestTimeout,

    #[error("invalid address `{0}`")]
    InvalidAddress(String),
}

/// Check every semantic constraint and collect all violations.
pub fn validate_config(config: &GovernanceConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let rate_limit = &config.rate_limit;
    if rate_limit.window_secs == 0 {
        errors.push(ValidationError::ZeroWindow);
    } else if rate_limit.window_secs > MAX_WINDOW_SECS {
        errors.push(ValidationError::WindowTooLong(rate_limit.window_secs));
    }
    if HeaderName::from_bytes(rate_limit.tenant_header.as_bytes()).is_err() {
        errors.push(ValidationError::InvalidTenantHeader(rate_limit.tenant_header.clone()));
    }
    for (tenant, quota) in &rate_limit.tenants {
        if let Some(plan) = &quota.plan {
            if !rate_limit.plans.contains_key(plan) {
                errors.push(ValidationError::UnknownPlan {
                    tenant: tenant.clone(),
                    plan: plan.clone(),
                });
            }
        }
    }

    let retries = &config.retries;
    if retries.max_retries > MAX_RETRIES_LIMIT {
        errors.push(ValidationError::TooManyRetries(retries.max_retries));
    }
    if retries.base_delay_ms > retries.max_delay_ms {
        errors.push(ValidationError::BackoffBounds {
            base_ms: retries.base_delay_ms,
            max_ms: retries.max_delay_ms,
        });
    }

    match Url::parse(&config.upstream.base_url) {
        Ok(url) if url.cannot_be_a_base() => errors.push(ValidationError::InvalidUpstreamUrl {
            url: config.upstream.base_url.clone(),
            reason: "cannot be used as a base URL".to_string(),
        }),
        Ok(_) => {}
        Err(e) => errors.push(ValidationError::InvalidUpstreamUrl {
            url: config.upstream.base_url.clone(),
            reason: e.to_string(),
        }),
    }
    if config.upstream.timeout_secs == 0 {
        errors.push(ValidationError::ZeroUpstreamTimeout);
    }
    if config.listener.request_timeout_secs == 0 {
        errors.push(ValidationError::ZeroRequestTimeout);
    }

    for addr in [&config.listener.bind_address, &config.observability.metrics_address] {
        if addr.parse::<std::net::SocketAddr>().is_err() {
            errors.push(ValidationError::InvalidAddress(addr.clone()));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
