//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → GovernanceConfig (validated, immutable)
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → sent to the binary, which swaps the rate-limit section into the
//!       live limiter
//! ```
//!
//! # Design Decisions
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - A rejected reload keeps the current configuration

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, ConfigError};
pub use schema::{
    AbsentTenantPolicy, AdminConfig, GovernanceConfig, ListenerConfig, ObservabilityConfig,
    RateLimitConfig, RetryConfig, TenantQuota, UpstreamConfig, MAX_WINDOW_SECS,
};
pub use validation::{validate_config, ValidationError};
