//! Upstream failure type.

use std::time::Duration;

use serde_json::Value;
use thiserror::Error;

use crate::resilience::{classify_status, Classification, Classify};

/// Longest body excerpt kept as a failure message.
const MAX_MESSAGE_CHARS: usize = 200;

/// A failed call to the upstream collaboration API.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UpstreamError {
    /// The upstream answered with a non-success status.
    #[error("upstream returned status {status}{}: {message}", fmt_code(.code))]
    Status {
        status: u16,
        /// Upstream error code, when the body carried one.
        code: Option<String>,
        message: String,
        /// `Retry-After` advice, when present.
        retry_after: Option<Duration>,
    },

    /// The call did not complete in time.
    #[error("upstream request timed out")]
    Timeout,

    /// The connection could not be established or was lost.
    #[error("upstream connection failed: {0}")]
    Connect(String),

    /// A success response whose body could not be decoded.
    #[error("upstream response could not be decoded: {0}")]
    Decode(String),

    /// Anything else.
    #[error("upstream call failed: {0}")]
    Application(String),
}

fn fmt_code(code: &Option<String>) -> String {
    code.as_deref().map(|c| format!(" ({c})")).unwrap_or_default()
}

impl UpstreamError {
    /// Build a status failure from an upstream response.
    ///
    /// The error code is taken leniently from a JSON body: `error.code`, then
    /// `code`, then `error` when it is a plain string.
    pub fn from_response(status: u16, retry_after: Option<Duration>, body: &str) -> Self {
        let parsed = serde_json::from_str::<Value>(body).ok();
        let code = parsed.as_ref().and_then(extract_code);
        let message = parsed
            .as_ref()
            .and_then(extract_message)
            .unwrap_or_else(|| body.trim().chars().take(MAX_MESSAGE_CHARS).collect());

        UpstreamError::Status {
            status,
            code,
            message,
            retry_after,
        }
    }

    /// HTTP status, when the upstream answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            UpstreamError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn code(&self) -> Option<&str> {
        match self {
            UpstreamError::Status { code, .. } => code.as_deref(),
            _ => None,
        }
    }
}

impl Classify for UpstreamError {
    fn classify(&self) -> Classification {
        match self {
            UpstreamError::Status { status, code, retry_after, .. } => {
                match classify_status(*status, code.as_deref()) {
                    Classification::Retryable { .. } => Classification::Retryable {
                        delay_hint: *retry_after,
                    },
                    Classification::Permanent => Classification::Permanent,
                }
            }
            UpstreamError::Timeout | UpstreamError::Connect(_) => Classification::retryable(),
            UpstreamError::Decode(_) | UpstreamError::Application(_) => Classification::Permanent,
        }
    }
}

impl From<reqwest::Error> for UpstreamError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            UpstreamError::Timeout
        } else if e.is_connect() || e.is_request() {
            UpstreamError::Connect(e.to_string())
        } else if e.is_decode() {
            UpstreamError::Decode(e.to_string())
        } else {
            UpstreamError::Application(e.to_string())
        }
    }
}

/// Parse a `Retry-After` value given in delta-seconds.
///
/// HTTP-date values are ignored; the executor's own backoff applies instead.
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}

fn extract_code(body: &Value) -> Option<String> {
    body.pointer("/error/code")
        .and_then(Value::as_str)
        .or_else(|| body.get("code").and_then(Value::as_str))
        .or_else(|| body.get("error").and_then(Value::as_str))
        .map(str::to_owned)
}

fn extract_message(body: &Value) -> Option<String> {
    body.pointer("/error/message")
        .and_then(Value::as_str)
        .or_else(|| body.get("message").and_then(Value::as_str))
        .or_else(|| body.get("error_description").and_then(Value::as_str))
        .map(str::to_owned)
}
