//! Fixed-window tenant rate limiter.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use arc_swap::ArcSwap;
use serde::Serialize;

use crate::config::{AbsentTenantPolicy, RateLimitConfig};
use crate::observability::metrics;
use crate::rate_limit::clock::{Clock, SystemClock};
use crate::rate_limit::store::{CounterStore, InMemoryCounterStore};

/// Bucket key for unidentified traffic under [`AbsentTenantPolicy::Shared`].
pub const ANONYMOUS_TENANT_KEY: &str = "__anonymous__";

/// Outcome of one admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub is_allowed: bool,
    /// Requests still admissible in the current window.
    pub remaining: u64,
    pub limit: u64,
    /// When the current window closes.
    pub reset_time: SystemTime,
}

impl RateLimitDecision {
    /// Advisory wait before the quota resets.
    pub fn retry_after(&self, now: SystemTime) -> Duration {
        self.reset_time.duration_since(now).unwrap_or_default()
    }

    /// `reset_time` as Unix seconds, rounded up.
    pub fn reset_unix_secs(&self) -> u64 {
        let since_epoch = self.reset_time.duration_since(UNIX_EPOCH).unwrap_or_default();
        since_epoch.as_secs() + u64::from(since_epoch.subsec_nanos() > 0)
    }
}

/// Read-only view of a tenant's usage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RateLimitStatus {
    pub request_count: u64,
    pub limit: u64,
}

/// Per-tenant fixed-window admission control.
///
/// Counting and the admission decision are a single atomic store operation
/// per tenant key, so concurrent checks on one tenant never admit more than
/// the limit and different tenants never contend on the same lock.
pub struct TenantRateLimiter {
    store: Arc<dyn CounterStore>,
    clock: Arc<dyn Clock>,
    config: ArcSwap<RateLimitConfig>,
}

impl TenantRateLimiter {
    /// In-memory limiter on the system clock.
    pub fn new(config: RateLimitConfig) -> Self {
        Self::with_store(config, Arc::new(InMemoryCounterStore::new()), Arc::new(SystemClock))
    }

    pub fn with_store(
        config: RateLimitConfig,
        store: Arc<dyn CounterStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            clock,
            config: ArcSwap::from_pointee(config),
        }
    }

    /// Count one request for `tenant` and decide whether it may proceed.
    ///
    /// Admitted iff the count before this request is below `limit`. Rejected
    /// requests are still counted.
    pub fn check_rate_limit(&self, tenant: Option<&str>, limit: u64) -> RateLimitDecision {
        let config = self.config.load();
        let window = config.window();
        let now = self.clock.now();

        let key = match identified(tenant) {
            Some(key) => key,
            None => match config.absent_tenant {
                AbsentTenantPolicy::Allow => {
                    tracing::debug!(limit, "Request without tenant key admitted uncounted");
                    metrics::record_rate_limit_decision("unidentified");
                    return RateLimitDecision {
                        is_allowed: true,
                        remaining: limit,
                        limit,
                        reset_time: now + window,
                    };
                }
                AbsentTenantPolicy::Reject => {
                    tracing::debug!(limit, "Request without tenant key rejected");
                    metrics::record_rate_limit_decision("rejected");
                    return RateLimitDecision {
                        is_allowed: false,
                        remaining: 0,
                        limit,
                        reset_time: now + window,
                    };
                }
                AbsentTenantPolicy::Shared => ANONYMOUS_TENANT_KEY,
            },
        };

        let snapshot = self.store.increment(key, now, window);
        let is_allowed = snapshot.count < limit;
        let remaining = if is_allowed { limit - snapshot.count - 1 } else { 0 };

        metrics::record_rate_limit_decision(if is_allowed { "allowed" } else { "rejected" });
        tracing::trace!(
            tenant = key,
            count = snapshot.count + 1,
            limit,
            allowed = is_allowed,
            "Rate limit check"
        );

        RateLimitDecision {
            is_allowed,
            remaining,
            limit,
            reset_time: snapshot.window_start + window,
        }
    }

    /// Check `tenant` against its configured limit.
    pub fn check_tenant(&self, tenant: Option<&str>) -> RateLimitDecision {
        self.check_rate_limit(tenant, self.limit_for(tenant))
    }

    /// Current usage for `tenant`. Never counts a request.
    pub fn get_status(&self, tenant: Option<&str>, limit: u64) -> RateLimitStatus {
        let config = self.config.load();
        let key = match identified(tenant) {
            Some(key) => Some(key),
            None if config.absent_tenant == AbsentTenantPolicy::Shared => Some(ANONYMOUS_TENANT_KEY),
            None => None,
        };

        let request_count = key
            .and_then(|key| self.store.peek(key, self.clock.now(), config.window()))
            .map_or(0, |snapshot| snapshot.count);

        RateLimitStatus { request_count, limit }
    }

    /// Configured limit for `tenant`.
    pub fn limit_for(&self, tenant: Option<&str>) -> u64 {
        let config = self.config.load();
        match identified(tenant) {
            Some(tenant) => config.limit_for(tenant),
            None => config.default_limit,
        }
    }

    /// Replace the live configuration. Counters are kept.
    pub fn apply_config(&self, config: RateLimitConfig) {
        tracing::info!(
            window_secs = config.window_secs,
            default_limit = config.default_limit,
            tenants = config.tenants.len(),
            "Applying rate limit configuration"
        );
        self.config.store(Arc::new(config));
    }

    /// Current time as seen by this limiter's clock.
    pub fn now(&self) -> SystemTime {
        self.clock.now()
    }

    pub fn config(&self) -> Arc<RateLimitConfig> {
        self.config.load_full()
    }

    /// Drop expired windows. Returns how many were removed.
    pub fn evict_expired(&self) -> usize {
        let window = self.config.load().window();
        self.store.evict_expired(self.clock.now(), window)
    }

    pub fn tracked_tenants(&self) -> usize {
        self.store.len()
    }
}

fn identified(tenant: Option<&str>) -> Option<&str> {
    tenant.filter(|key| !key.trim().is_empty())
}
