//! You.com web client.
//!
//! `GET /search` returns ranked hits with AI snippets; `GET /rag` returns a
//! generated answer grounded in web results. Both authenticate with
//! `X-API-Key`.

use async_trait::async_trait;
use concierge_config::AppConfig;
use concierge_core::error::ProviderError;
use concierge_core::{RetryPolicy, WebSearch};
use std::time::Duration;
use tracing::debug;

use crate::http;

pub struct YouComClient {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
    retry: RetryPolicy,
}

impl std::fmt::Debug for YouComClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("YouComClient")
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

impl YouComClient {
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client: http::build_client(timeout)?,
            retry: RetryPolicy::default(),
        })
    }

    /// Build from the app config. Fails when no key is configured.
    ///
    /// Requests are bounded by [`AppConfig::search_request_timeout`] so the
    /// configured retries fit inside one tool call.
    pub fn from_config(config: &AppConfig) -> Result<Self, ProviderError> {
        let key = config.search.youcom_api_key.clone().ok_or_else(|| {
            ProviderError::NotConfigured("YOUCOM_API_KEY is not set".into())
        })?;
        Ok(Self::new(key, &config.search.youcom_url, config.search_request_timeout())?
            .with_retry_policy(config.retry.to_policy()))
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    async fn fetch(&self, endpoint: &str, query: &str) -> Result<serde_json::Value, ProviderError> {
        let response = self
            .client
            .get(format!("{}/{endpoint}", self.base_url))
            .header("X-API-Key", &self.api_key)
            .query(&[("query", query)])
            .send()
            .await
            .map_err(http::map_send_error)?;
        let response = http::check_status("youcom", response).await?;
        http::read_json("youcom", response).await
    }
}

#[async_trait]
impl WebSearch for YouComClient {
    fn name(&self) -> &str {
        "youcom"
    }

    async fn search(&self, query: &str) -> Result<serde_json::Value, ProviderError> {
        debug!(query, "You.com web search");
        self.retry.execute(|| self.fetch("search", query)).await
    }

    async fn query_web_llm(&self, query: &str) -> Result<serde_json::Value, ProviderError> {
        debug!(query, "You.com RAG query");
        self.retry.execute(|| self.fetch("rag", query)).await
    }
}
