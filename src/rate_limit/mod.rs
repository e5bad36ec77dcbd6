//! Tenant rate limiting subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → middleware.rs (resolve tenant key, translate decision to 429)
//!     → limiter.rs (resolve limit, admission rule, absent-tenant policy)
//!     → store.rs (atomic per-key count in the current fixed window)
//!
//! Background:
//!     sweeper.rs evicts expired windows on an interval
//! ```
//!
//! # Design Decisions
//! - Fixed window per tenant, opened by that tenant's first request
//! - Count-and-decide is one atomic operation per key (shard lock, not global)
//! - Storage sits behind `CounterStore` so the admission rule does not
//!   depend on where counters live
//! - Decisions are values, never errors

pub mod clock;
pub mod limiter;
pub mod middleware;
pub mod store;
pub mod sweeper;

pub use clock::{Clock, ManualClock, SystemClock};
pub use limiter::{RateLimitDecision, RateLimitStatus, TenantRateLimiter, ANONYMOUS_TENANT_KEY};
pub use middleware::{rate_limit_middleware, TenantId};
pub use store::{CounterStore, InMemoryCounterStore, RateLimitWindow, WindowSnapshot};
pub use sweeper::spawn_sweeper;
