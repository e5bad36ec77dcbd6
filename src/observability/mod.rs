//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! resilience + rate_limit produce:
//!     → logging.rs (structured log events via `tracing`)
//!     → metrics.rs (counters and gauges via the `metrics` facade)
//!
//! Consumers:
//!     → stdout log aggregation
//!     → Prometheus scrape endpoint (optional)
//! ```
//!
//! # Design Decisions
//! - Reporting only; nothing here influences a retry or admission decision
//! - Metric helpers are no-ops until a recorder is installed

pub mod logging;
pub mod metrics;
