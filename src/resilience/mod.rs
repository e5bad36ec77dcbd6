//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Call to upstream:
//!     → retries.rs (run attempt, race against cancellation)
//!     → On failure: classify.rs (transient or permanent?)
//!     → backoff.rs (delay before the next attempt)
//! ```
//!
//! # Design Decisions
//! - Classification is one pure function, not conditionals in the loop
//! - Permanent failures surface on the first attempt
//! - Exhausted retries surface the original failure, never a wrapper
//! - Backoff is an async sleep, never a thread sleep

pub mod backoff;
pub mod classify;
pub mod retries;

pub use classify::{classify_status, Classification, Classify};
pub use retries::{RetryAttempt, RetryError, RetryExecutor, RetryPolicy};
