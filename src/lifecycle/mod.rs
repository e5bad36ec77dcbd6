//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Shutdown (shutdown.rs):
//!     Signal received → broadcast → sweeper, config reload loop,
//!     in-flight upstream retries and the HTTP server all stop
//!
//! Signals (signals.rs):
//!     SIGINT/SIGTERM → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - One broadcast channel; every long-running task subscribes
//! - In-flight retry loops observe shutdown as cancellation

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
