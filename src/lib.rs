//! Request governance core.
//!
//! Two independent components sit on every path between tenant traffic and
//! the upstream collaboration API:
//!
//! - [`resilience::RetryExecutor`] wraps outbound upstream calls, classifies
//!   their failures and retries the transient ones with bounded backoff.
//! - [`rate_limit::TenantRateLimiter`] gates inbound requests with an
//!   independent fixed-window quota per tenant.
//!
//! They share no state and compose only through call order in the request
//! pipeline (gate first, then retry around upstream calls).

pub mod admin;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod rate_limit;
pub mod resilience;
pub mod upstream;

pub use config::schema::GovernanceConfig;
pub use lifecycle::Shutdown;
pub use rate_limit::{RateLimitDecision, RateLimitStatus, TenantRateLimiter};
pub use resilience::{Classification, Classify, RetryExecutor, RetryPolicy};
