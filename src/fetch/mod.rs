//! Fetching remote subscription feeds
//!
//! [`SourceFetcher`] is the network seam: the pipeline, the bridge's provider
//! expansion and the CLI all go through it, so tests swap in an in-memory
//! implementation. [`Orchestrator`] turns a set of sources into per-source
//! link lists.

pub mod http;
mod orchestrator;
mod traffic;

pub use http::{HttpConfig, HttpFetcher};
pub use orchestrator::Orchestrator;
pub use traffic::{parse_userinfo, probe_all};

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request timed out")]
    Timeout,

    #[error("upstream returned HTTP {0}")]
    Status(u16),

    #[error("HTTP request failed: {0}")]
    Request(String),

    #[error("body exceeds {0} bytes")]
    BodyTooLarge(u64),
}

pub type Result<T> = std::result::Result<T, FetchError>;

/// Remote feed access.
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    /// GET `url` and return the body as text.
    async fn fetch(&self, url: &str, user_agent: &str) -> Result<String>;

    /// GET `url` and return the raw `subscription-userinfo` header, if any.
    async fn probe(&self, url: &str, user_agent: &str) -> Result<Option<String>>;
}

/// [`SourceFetcher::fetch`] bounded by `timeout`. The in-flight request is
/// dropped once the deadline passes.
pub async fn fetch_with_timeout(
    fetcher: &dyn SourceFetcher,
    url: &str,
    user_agent: &str,
    timeout: Duration,
) -> Result<String> {
    tokio::time::timeout(timeout, fetcher.fetch(url, user_agent))
        .await
        .unwrap_or(Err(FetchError::Timeout))
}

/// [`SourceFetcher::probe`] bounded by `timeout`.
pub async fn probe_with_timeout(
    fetcher: &dyn SourceFetcher,
    url: &str,
    user_agent: &str,
    timeout: Duration,
) -> Result<Option<String>> {
    tokio::time::timeout(timeout, fetcher.probe(url, user_agent))
        .await
        .unwrap_or(Err(FetchError::Timeout))
}


#[cfg(test)]
mod tests {
    use super::mock::MockFetcher;
    use super::*;

    #[tokio::test]
    async fn test_fetch_with_timeout_expires() {
        let fetcher = MockFetcher::new().with_delayed_body(
            "https://slow.example.com",
            "ss://a@b:1",
            Duration::from_millis(500),
        );
        let result = fetch_with_timeout(
            &fetcher,
            "https://slow.example.com",
            "ua",
            Duration::from_millis(20),
        )
        .await;
        assert!(matches!(result, Err(FetchError::Timeout)));
    }

    #[tokio::test]
    async fn test_fetch_with_timeout_passes_errors_through() {
        let fetcher = MockFetcher::new().with_status("https://down.example.com", 503);
        let result =
            fetch_with_timeout(&fetcher, "https://down.example.com", "ua", Duration::from_secs(1))
                .await;
        assert!(matches!(result, Err(FetchError::Status(503))));
    }

    #[tokio::test]
    async fn test_probe_with_timeout() {
        let fetcher = MockFetcher::new()
            .with_delayed_body("https://slow.example.com", "", Duration::from_millis(500))
            .with_userinfo("https://fast.example.com", "total=10");

        let slow = probe_with_timeout(
            &fetcher,
            "https://slow.example.com",
            "ua",
            Duration::from_millis(20),
        )
        .await;
        assert!(matches!(slow, Err(FetchError::Timeout)));

        let fast =
            probe_with_timeout(&fetcher, "https://fast.example.com", "ua", Duration::from_secs(1))
                .await;
        assert_eq!(fast.unwrap().as_deref(), Some("total=10"));
    }
}
