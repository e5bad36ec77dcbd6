//! HTTP client for the upstream collaboration API.

use std::future::Future;
use std::time::Duration;

use reqwest::header::RETRY_AFTER;
use serde_json::Value;
use url::Url;

use crate::config::UpstreamConfig;
use crate::resilience::{RetryError, RetryExecutor};
use crate::upstream::error::{parse_retry_after, UpstreamError};

/// Thin upstream client. One call is one attempt; retries belong to
/// [`RetryExecutor`].
#[derive(Debug, Clone)]
pub struct UpstreamClient {
    http: reqwest::Client,
    base_url: Url,
    bearer_token: Option<String>,
}

impl UpstreamClient {
    pub fn new(config: &UpstreamConfig) -> Result<Self, UpstreamError> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| UpstreamError::Application(format!("invalid base URL: {e}")))?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            base_url,
            bearer_token: config.bearer_token.clone(),
        })
    }

    /// Resolve `path` against the base URL.
    ///
    /// The result must stay on the base URL's origin and under its directory;
    /// absolute URLs and `..` escapes are refused so the bearer token is only
    /// ever sent to the configured upstream.
    pub fn url(&self, path: &str) -> Result<Url, UpstreamError> {
        let url = self
            .base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| UpstreamError::Application(format!("invalid path `{path}`: {e}")))?;

        let base = &self.base_url;
        let base_dir = &base.path()[..base.path().rfind('/').map_or(0, |i| i + 1)];
        let same_origin = url.scheme() == base.scheme()
            && url.host_str() == base.host_str()
            && url.port_or_known_default() == base.port_or_known_default();
        if !same_origin || !url.path().starts_with(base_dir) {
            return Err(UpstreamError::Application(format!(
                "path `{path}` resolves outside the upstream base URL"
            )));
        }
        Ok(url)
    }

    /// Single GET attempt returning the decoded JSON body.
    pub async fn get_json(&self, path: &str) -> Result<Value, UpstreamError> {
        let mut request = self.http.get(self.url(path)?);
        if let Some(token) = &self.bearer_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response.json::<Value>().await?);
        }

        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_retry_after);
        let body = response.text().await.unwrap_or_default();

        tracing::debug!(path, status = status.as_u16(), "Upstream returned failure status");
        Err(UpstreamError::from_response(status.as_u16(), retry_after, &body))
    }

    /// GET with retries. The final failure is the upstream's own.
    pub async fn get_json_with_retry(
        &self,
        executor: &RetryExecutor,
        path: &str,
    ) -> Result<Value, UpstreamError> {
        executor
            .execute_with_retry(move || self.get_json(path), &format!("GET {path}"))
            .await
    }

    /// GET with retries, abandoned as soon as `cancelled` resolves.
    pub async fn get_json_with_retry_until<C>(
        &self,
        executor: &RetryExecutor,
        path: &str,
        cancelled: C,
    ) -> Result<Value, RetryError<UpstreamError>>
    where
        C: Future<Output = ()>,
    {
        executor
            .execute_with_retry_until(move || self.get_json(path), &format!("GET {path}"), cancelled)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base_url: &str) -> UpstreamClient {
        UpstreamClient::new(&UpstreamConfig {
            base_url: base_url.to_string(),
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_url_join() {
        let client = client("https://collab.example.com/v1/");
        assert_eq!(
            client.url("/drives/42/shares").unwrap().as_str(),
            "https://collab.example.com/v1/drives/42/shares"
        );
        assert_eq!(
            client.url("me").unwrap().as_str(),
            "https://collab.example.com/v1/me"
        );
    }

    #[test]
    fn test_url_stays_under_base() {
        let client = client("https://collab.example.com/v1/");
        for path in [
            "http://evil.example.com/steal",
            "https://collab.example.com:8443/v1/me",
            "../admin",
            "drives/../../admin",
            "%2e%2e/admin",
        ] {
            let err = client.url(path).unwrap_err();
            assert!(matches!(err, UpstreamError::Application(_)), "{path}: {err:?}");
        }
        assert_eq!(
            client.url("drives/../me").unwrap().as_str(),
            "https://collab.example.com/v1/me"
        );
        // Leading slashes are stripped, so this stays a relative path.
        assert_eq!(
            client.url("//evil.example.com/x").unwrap().as_str(),
            "https://collab.example.com/v1/evil.example.com/x"
        );
    }

    #[tokio::test]
    async fn test_foreign_host_is_never_contacted() {
        let client = client("http://127.0.0.1:1/");
        let err = client.get_json("http://127.0.0.1:2/x").await.unwrap_err();
        assert!(matches!(err, UpstreamError::Application(_)));
    }

    #[test]
    fn test_invalid_base_url() {
        let err = UpstreamClient::new(&UpstreamConfig {
            base_url: "::nope::".into(),
            ..Default::default()
        })
        .unwrap_err();
        assert!(matches!(err, UpstreamError::Application(_)));
    }

    #[tokio::test]
    async fn test_connection_refused_is_retryable_connect_error() {
        use crate::resilience::Classify;

        // Grab a free port, then release it so nothing is listening there.
        let addr = std::net::TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap();
        let client = client(&format!("http://{addr}/"));
        let err = client.get_json("ping").await.unwrap_err();
        assert!(err.classify().is_retryable(), "unexpected {err:?}");
    }
}
