//! Failure classification.
//!
//! Every failure observed by the retry loop goes through exactly one pure
//! decision: retry it, or surface it.
//!
//! # Rules
//! ```text
//! 429, 500, 502, 503, 504          → Retryable
//! 401 + refreshable token code     → Retryable
//! 401 (any other code / no code)   → Permanent
//! 400, 403, 404, everything else   → Permanent
//! timeout / connect (no status)    → Retryable (decided by the error type)
//! ```

use std::fmt;
use std::time::Duration;

/// Upstream error codes on a 401 that mean "refresh and try again" rather
/// than "these credentials are rejected".
pub const REFRESHABLE_AUTH_CODES: &[&str] = &[
    "expired_token",
    "token_expired",
    "invalid_token",
    "InvalidAuthenticationToken",
    "ExpiredAuthenticationToken",
];

/// Outcome of classifying a single failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// Expected to succeed if retried. `delay_hint` carries an upstream
    /// advisory wait (e.g. `Retry-After`) when one was supplied.
    Retryable { delay_hint: Option<Duration> },
    /// Will not succeed without changing the request.
    Permanent,
}

impl Classification {
    /// Retryable with no upstream hint.
    pub const fn retryable() -> Self {
        Classification::Retryable { delay_hint: None }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Classification::Retryable { .. })
    }

    pub fn delay_hint(&self) -> Option<Duration> {
        match self {
            Classification::Retryable { delay_hint } => *delay_hint,
            Classification::Permanent => None,
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Classification::Retryable { .. } => f.write_str("retryable"),
            Classification::Permanent => f.write_str("permanent"),
        }
    }
}

/// A failure type the retry executor knows how to classify.
///
/// Implementations must be pure: the same failure always yields the same
/// classification.
pub trait Classify {
    fn classify(&self) -> Classification;
}

/// Classify an upstream HTTP-style status plus optional upstream error code.
pub fn classify_status(status: u16, code: Option<&str>) -> Classification {
    match status {
        429 | 500 | 502 | 503 | 504 => Classification::retryable(),
        401 if code.is_some_and(is_refreshable_auth_code) => Classification::retryable(),
        _ => Classification::Permanent,
    }
}

/// Whether a 401 error code signals an expired or refreshable token.
pub fn is_refreshable_auth_code(code: &str) -> bool {
    REFRESHABLE_AUTH_CODES
        .iter()
        .any(|known| known.eq_ignore_ascii_case(code.trim()))
}
