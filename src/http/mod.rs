//! HTTP gateway subsystem.
//!
//! # Data Flow
//! ```text
//! Inbound request
//!     → request.rs (assign / propagate x-request-id)
//!     → rate_limit middleware (tenant gate, 429 on rejection)
//!     → server.rs forward handler
//!     → upstream client wrapped in the retry executor
//!     → JSON response, or 502/504 with a diagnostic body
//! ```

pub mod request;
pub mod server;

pub use request::{UuidRequestId, X_REQUEST_ID};
pub use server::{AppState, GatewayServer};
