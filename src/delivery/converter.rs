//! External subscription converter client

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::USER_AGENT;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;
use url::Url;

#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("converter returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("converter request failed: {0}")]
    Request(String),

    #[error("invalid converter URL: {0}")]
    InvalidUrl(String),
}

/// One call to the converter's `/sub` endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionRequest {
    /// Bare host (`api.example.com`) or full base URL.
    pub host: String,
    pub target: String,
    /// Where the converter fetches the raw node list.
    pub source_url: String,
    pub config: Option<String>,
}

impl ConversionRequest {
    pub fn url(&self) -> Result<Url, ConvertError> {
        let host = self.host.trim().trim_end_matches('/');
        let base = if host.starts_with("http://") || host.starts_with("https://") {
            format!("{}/sub", host)
        } else {
            format!("https://{}/sub", host)
        };
        let mut url = Url::parse(&base)
            .map_err(|e| ConvertError::InvalidUrl(format!("{}: {}", base, e)))?;

        {
            let mut query = url.query_pairs_mut();
            query.append_pair("target", &self.target);
            query.append_pair("url", &self.source_url);
            if let Some(config) = self.config.as_deref().filter(|c| !c.trim().is_empty()) {
                query.append_pair("config", config);
            }
            query.append_pair("new_name", "true");
        }

        Ok(url)
    }
}

#[async_trait]
pub trait Converter: Send + Sync {
    /// Body of the converted subscription.
    async fn convert(&self, request: &ConversionRequest) -> Result<String, ConvertError>;
}

pub struct HttpConverter {
    client: Client,
    user_agent: String,
}

impl HttpConverter {
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self, ConvertError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ConvertError::Request(e.to_string()))?;
        Ok(Self { client, user_agent: user_agent.to_string() })
    }
}

#[async_trait]
impl Converter for HttpConverter {
    async fn convert(&self, request: &ConversionRequest) -> Result<String, ConvertError> {
        let url = request.url()?;
        debug!(%url, "Delegating conversion");

        let response = self
            .client
            .get(url)
            .header(USER_AGENT, &self.user_agent)
            .send()
            .await
            .map_err(|e| ConvertError::Request(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ConvertError::Request(format!("Failed to read body: {}", e)))?;

        if !status.is_success() {
            return Err(ConvertError::Status { status: status.as_u16(), body });
        }
        Ok(body)
    }
}
