//! Upstream collaboration API.
//!
//! Only the failure model matters here: how an upstream answer or transport
//! failure becomes an [`UpstreamError`], and how that error classifies.

pub mod client;
pub mod error;

pub use client::UpstreamClient;
pub use error::{parse_retry_after, UpstreamError};
