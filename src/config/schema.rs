//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the
//! governance gateway. All types derive Serde traits for deserialization
//! from config files.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct GovernanceConfig {
    /// Listener configuration (bind address, request deadline).
    pub listener: ListenerConfig,

    /// Upstream collaboration API.
    pub upstream: UpstreamConfig,

    /// Retry configuration for upstream calls.
    pub retries: RetryConfig,

    /// Per-tenant rate limiting.
    pub rate_limit: RateLimitConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Admin API settings.
    pub admin: AdminConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Total time allowed for one inbound request, upstream retries included.
    pub request_timeout_secs: u64,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            request_timeout_secs: 30,
        }
    }
}

/// Upstream collaboration API configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Base URL that request paths are joined onto.
    pub base_url: String,

    /// Per-attempt timeout in seconds.
    pub timeout_secs: u64,

    /// Optional bearer token sent with every call.
    pub bearer_token: Option<String>,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:9000".to_string(),
            timeout_secs: 10,
            bearer_token: None,
        }
    }
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct RetryConfig {
    /// Retries after the initial attempt.
    pub max_retries: u32,

    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,

    /// Maximum delay for exponential backoff in milliseconds.
    pub max_delay_ms: u64,

    /// Add up to 10% random jitter to each delay.
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 100,
            max_delay_ms: 2000,
            jitter: true,
        }
    }
}

/// What to do with requests that carry no tenant key.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum AbsentTenantPolicy {
    /// Admit without counting.
    #[default]
    Allow,
    /// Reject as if the quota were exhausted.
    Reject,
    /// Count all unidentified traffic against one shared bucket.
    Shared,
}

/// Quota assignment for one tenant.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Default)]
#[serde(default)]
pub struct TenantQuota {
    /// Plan name, looked up in [`RateLimitConfig::plans`].
    pub plan: Option<String>,

    /// Explicit limit; wins over the plan.
    pub limit: Option<u64>,
}

/// Longest accepted rate-limit window (one year).
pub const MAX_WINDOW_SECS: u64 = 365 * 24 * 60 * 60;

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable the inbound rate-limit middleware.
    pub enabled: bool,

    /// Fixed window length in seconds.
    pub window_secs: u64,

    /// Limit for tenants with no plan or override.
    pub default_limit: u64,

    /// Request header carrying the tenant key.
    pub tenant_header: String,

    /// Handling of requests without a tenant key.
    pub absent_tenant: AbsentTenantPolicy,

    /// Interval between sweeps of expired windows, in seconds.
    pub sweep_interval_secs: u64,

    /// Plan name → requests per window.
    pub plans: BTreeMap<String, u64>,

    /// Tenant key → quota assignment.
    pub tenants: BTreeMap<String, TenantQuota>,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            window_secs: 60,
            default_limit: 60,
            tenant_header: "x-tenant-id".to_string(),
            absent_tenant: AbsentTenantPolicy::Allow,
            sweep_interval_secs: 30,
            plans: BTreeMap::from([
                ("free".to_string(), 60),
                ("team".to_string(), 600),
                ("enterprise".to_string(), 6000),
            ]),
            tenants: BTreeMap::new(),
        }
    }
}

impl RateLimitConfig {
    /// Window length, clamped to `1..=MAX_WINDOW_SECS` seconds.
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs.clamp(1, MAX_WINDOW_SECS))
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }

    /// Resolve the limit for a tenant: explicit override, then plan, then default.
    pub fn limit_for(&self, tenant: &str) -> u64 {
        let Some(quota) = self.tenants.get(tenant) else {
            return self.default_limit;
        };

        quota
            .limit
            .or_else(|| quota.plan.as_ref().and_then(|plan| self.plans.get(plan).copied()))
            .unwrap_or(self.default_limit)
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct AdminConfig {
    /// Expose the admin routes.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            // WARNING: This is a placeholder! Change this in production.
            api_key: "CHANGE_ME_IN_PRODUCTION".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = GovernanceConfig::default();
        assert_eq!(config.retries.max_retries, 3);
        assert_eq!(config.rate_limit.window(), Duration::from_secs(60));
        assert_eq!(config.rate_limit.absent_tenant, AbsentTenantPolicy::Allow);
        assert!(!config.admin.enabled);
    }

    #[test]
    fn test_limit_resolution() {
        let mut config = RateLimitConfig::default();
        config.tenants.insert(
            "acme".into(),
            TenantQuota { plan: Some("team".into()), limit: None },
        );
        config.tenants.insert(
            "globex".into(),
            TenantQuota { plan: Some("team".into()), limit: Some(5) },
        );
        config.tenants.insert(
            "initech".into(),
            TenantQuota { plan: Some("platinum".into()), limit: None },
        );

        assert_eq!(config.limit_for("acme"), 600);
        assert_eq!(config.limit_for("globex"), 5);
        assert_eq!(config.limit_for("initech"), config.default_limit);
        assert_eq!(config.limit_for("unknown"), config.default_limit);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: GovernanceConfig = toml::from_str(
            r#"
            [rate_limit]
            window_secs = 10
            absent_tenant = "shared"

            [rate_limit.tenants.acme]
            limit = 3
            "#,
        )
        .unwrap();

        assert_eq!(config.rate_limit.window_secs, 10);
        assert_eq!(config.rate_limit.default_limit, 60);
        assert_eq!(config.rate_limit.absent_tenant, AbsentTenantPolicy::Shared);
        assert_eq!(config.rate_limit.limit_for("acme"), 3);
        assert_eq!(config.retries, RetryConfig::default());
    }

    #[test]
    fn test_zero_window_is_clamped() {
        let config = RateLimitConfig { window_secs: 0, ..Default::default() };
        assert_eq!(config.window(), Duration::from_secs(1));
    }

    #[test]
    fn test_huge_window_is_clamped() {
        let config = RateLimitConfig { window_secs: u64::MAX, ..Default::default() };
        assert_eq!(config.window(), Duration::from_secs(MAX_WINDOW_SECS));
    }
}
