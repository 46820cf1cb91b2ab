//! reqwest-backed [`SourceFetcher`]

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::{HeaderMap, USER_AGENT};
use std::time::Duration;
use tracing::debug;

use super::{FetchError, Result, SourceFetcher};
use crate::config::FetchConfig;

pub const USERINFO_HEADER: &str = "subscription-userinfo";

/// HTTP client configuration
#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub connect_timeout: Duration,
    pub max_redirects: usize,
    pub max_body_bytes: u64,
    /// Feeds are frequently served with self-signed certificates.
    pub accept_invalid_certs: bool,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            max_redirects: 10,
            max_body_bytes: 10 * 1024 * 1024,
            accept_invalid_certs: true,
        }
    }
}

impl From<&FetchConfig> for HttpConfig {
    fn from(config: &FetchConfig) -> Self {
        Self {
            connect_timeout: config.body_timeout(),
            max_redirects: config.max_redirects,
            max_body_bytes: config.max_body_bytes.as_u64(),
            accept_invalid_certs: config.accept_invalid_certs,
        }
    }
}

pub struct HttpFetcher {
    client: Client,
    config: HttpConfig,
}

impl HttpFetcher {
    pub fn new(config: HttpConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .build()
            .map_err(|e| FetchError::Request(e.to_string()))?;

        Ok(Self { client, config })
    }

    /// Single attempt; the caller owns the deadline.
    async fn get(&self, url: &str, user_agent: &str) -> Result<reqwest::Response> {
        debug!(url, user_agent, "GET");

        let response = self
            .client
            .get(url)
            .header(USER_AGENT, user_agent)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    FetchError::Timeout
                } else {
                    FetchError::Request(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        Ok(response)
    }
}

#[async_trait]
impl SourceFetcher for HttpFetcher {
    async fn fetch(&self, url: &str, user_agent: &str) -> Result<String> {
        let response = self.get(url, user_agent).await?;

        let limit = self.config.max_body_bytes;
        if response.content_length().is_some_and(|len| len > limit) {
            return Err(FetchError::BodyTooLarge(limit));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| FetchError::Request(format!("Failed to read body: {}", e)))?;
        if bytes.len() as u64 > limit {
            return Err(FetchError::BodyTooLarge(limit));
        }

        debug!(url, size = bytes.len(), "Fetch completed");
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    async fn probe(&self, url: &str, user_agent: &str) -> Result<Option<String>> {
        let response = self.get(url, user_agent).await?;
        Ok(userinfo_header(response.headers()))
    }
}

fn userinfo_header(headers: &HeaderMap) -> Option<String> {
    headers
        .get(USERINFO_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}
