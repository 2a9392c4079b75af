//! Plain HTTP fetching.
//!
//! Issues a single GET with a browser user agent and a hard timeout. The body
//! is decoded as UTF-8 regardless of what the server claims, since the
//! target sites serve UTF-8 but do not always label it. There are no retries.

use super::{FetchError, FetchRequest, FetchStrategy, Fetcher, RawDocument};
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

pub struct StaticFetcher {
    client: reqwest::Client,
    timeout: Duration,
}

impl StaticFetcher {
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()
            .map_err(|e| FetchError::Network {
                status: None,
                message: e.to_string(),
            })?;
        Ok(Self { client, timeout })
    }

    fn classify(&self, e: reqwest::Error) -> FetchError {
        if e.is_timeout() {
            FetchError::Timeout(self.timeout)
        } else {
            FetchError::Network {
                status: e.status().map(|s| s.as_u16()),
                message: e.to_string(),
            }
        }
    }
}

#[async_trait]
impl Fetcher for StaticFetcher {
    fn strategy(&self) -> FetchStrategy {
        FetchStrategy::Static
    }

    #[instrument(level = "info", skip_all, fields(url = %request.url))]
    async fn fetch(&self, request: &FetchRequest<'_>) -> Result<RawDocument, FetchError> {
        let url = request.static_url();
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        if !status.is_success() {
            warn!(%url, status = status.as_u16(), "Non-success status");
            return Err(FetchError::Network {
                status: Some(status.as_u16()),
                message: status
                    .canonical_reason()
                    .unwrap_or("unexpected status")
                    .to_string(),
            });
        }

        let bytes = response.bytes().await.map_err(|e| self.classify(e))?;
        let html = String::from_utf8_lossy(&bytes).into_owned();
        info!(bytes = html.len(), "Fetched page");
        debug!(%url, "Static fetch complete");

        Ok(RawDocument {
            url,
            html,
            strategy: FetchStrategy::Static,
        })
    }
}
