//! Shared HTTP plumbing for catalog adapters
//!
//! One [`HttpClient`] per source: a reqwest client with the configured user
//! agent and timeout, plus a governor rate limiter so a burst of queries
//! never exceeds what the catalog tolerates.

use super::SourceError;
use governor::{Quota, RateLimiter};
use mediadex_common::config::SourcesConfig;
use mediadex_common::Source;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::num::NonZeroU32;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct HttpSettings {
    pub user_agent: String,
    pub timeout: Duration,
    pub requests_per_second: u32,
}

impl HttpSettings {
    pub fn from_config(config: &SourcesConfig) -> Self {
        Self {
            user_agent: config.user_agent.clone(),
            timeout: config.request_timeout(),
            requests_per_second: 1,
        }
    }

    pub fn with_rate(mut self, requests_per_second: u32) -> Self {
        self.requests_per_second = requests_per_second;
        self
    }
}

/// A fetched HTML page
#[derive(Debug, Clone)]
pub struct Page {
    /// URL after redirects
    pub final_url: String,
    pub body: String,
}

pub struct HttpClient {
    source: Source,
    client: reqwest::Client,
    rate_limiter: RateLimiter<
        governor::state::NotKeyed,
        governor::state::InMemoryState,
        governor::clock::DefaultClock,
    >,
}

impl HttpClient {
    pub fn new(source: Source, settings: &HttpSettings) -> Result<Self, SourceError> {
        let client = reqwest::Client::builder()
            .user_agent(settings.user_agent.as_str())
            .timeout(settings.timeout)
            .build()
            .map_err(|e| SourceError::Network(e.to_string()))?;

        let per_second = NonZeroU32::new(settings.requests_per_second).unwrap_or(NonZeroU32::MIN);

        Ok(Self {
            source,
            client,
            rate_limiter: RateLimiter::direct(Quota::per_second(per_second)),
        })
    }

    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
        headers: &[(&'static str, String)],
    ) -> Result<T, SourceError> {
        let mut request = self.client.get(url).query(query);
        for (name, value) in headers {
            request = request.header(*name, value.as_str());
        }
        let response = self.send(request).await?;
        decode(response).await
    }

    pub async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        url: &str,
        body: &B,
        headers: &[(&'static str, String)],
    ) -> Result<T, SourceError> {
        let mut request = self.client.post(url).json(body);
        for (name, value) in headers {
            request = request.header(*name, value.as_str());
        }
        let response = self.send(request).await?;
        decode(response).await
    }

    pub async fn get_page(&self, url: &str, query: &[(&str, String)]) -> Result<Page, SourceError> {
        let response = self.send(self.client.get(url).query(query)).await?;
        let final_url = response.url().to_string();
        let body = response.text().await.map_err(transport_error)?;
        Ok(Page { final_url, body })
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response, SourceError> {
        self.rate_limiter.until_ready().await;

        let response = request.send().await.map_err(transport_error)?;
        let status = response.status();

        tracing::debug!(
            source = %self.source,
            url = %response.url(),
            status = status.as_u16(),
            "Catalog request completed"
        );

        if !status.is_success() {
            return Err(SourceError::Status(status.as_u16()));
        }
        Ok(response)
    }
}

async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, SourceError> {
    let body = response.text().await.map_err(transport_error)?;
    serde_json::from_str(&body).map_err(|e| SourceError::Parse(e.to_string()))
}

fn transport_error(e: reqwest::Error) -> SourceError {
    if e.is_timeout() {
        SourceError::Timeout
    } else {
        SourceError::Network(e.to_string())
    }
}
