//! ValueSerp place search client.
//!
//! Both lookups hit the same `/search` endpoint and differ by `search_type`:
//! `places` returns `places_results`, `place_details` returns `place_details`.

use async_trait::async_trait;
use concierge_config::AppConfig;
use concierge_core::error::ProviderError;
use concierge_core::{PlaceSearch, RetryPolicy};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use crate::http;

pub struct ValueSerpClient {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
    retry: RetryPolicy,
}

impl std::fmt::Debug for ValueSerpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValueSerpClient")
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .field("retry", &self.retry)
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct PlacesResponse {
    #[serde(default)]
    places_results: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct DetailsResponse {
    #[serde(default)]
    place_details: Option<serde_json::Value>,
}

impl ValueSerpClient {
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
        let key = config.search.valueserp_api_key.clone().ok_or_else(|| {
            ProviderError::NotConfigured("VALUESERP_API_KEY is not set".into())
        })?;
        Ok(Self::new(key, &config.search.valueserp_url, config.search_request_timeout())?
            .with_retry_policy(config.retry.to_policy()))
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    async fn get<T: serde::de::DeserializeOwned>(
        &self,
        params: &[(&str, &str)],
    ) -> Result<T, ProviderError> {
        let url = format!("{}/search", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[
                ("api_key", self.api_key.as_str()),
                ("google_domain", "google.com"),
                ("gl", "us"),
                ("hl", "en"),
            ])
            .query(params)
            .send()
            .await
            .map_err(http::map_send_error)?;
        let response = http::check_status("valueserp", response).await?;
        http::read_json("valueserp", response).await
    }
}

#[async_trait]
impl PlaceSearch for ValueSerpClient {
    fn name(&self) -> &str {
        "valueserp"
    }

    async fn search_places(
        &self,
        query: &str,
        location: Option<&str>,
    ) -> Result<Vec<serde_json::Value>, ProviderError> {
        let mut params = vec![("search_type", "places"), ("q", query)];
        if let Some(location) = location {
            params.push(("location", location));
        }
        debug!(query, location, "ValueSerp places search");

        let resp: PlacesResponse = self.retry.execute(|| self.get(&params)).await?;
        Ok(resp.places_results)
    }

    /// `Null` when the provider has no details for the id.
    async fn place_details(&self, id: &str) -> Result<serde_json::Value, ProviderError> {
        let params = [("search_type", "place_details"), ("data_cid", id)];
        debug!(data_cid = id, "ValueSerp place details");

        let resp: DetailsResponse = self.retry.execute(|| self.get(&params)).await?;
        Ok(resp.place_details.unwrap_or(serde_json::Value::Null))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param, query_param_is_missing};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> ValueSerpClient {
        ValueSerpClient::new("vs-key", server.uri(), Duration::from_secs(5))
            .unwrap()
            .with_retry_policy(
                RetryPolicy::default()
                    .with_backoff(Duration::from_millis(1), Duration::from_millis(1))
                    .without_jitter(),
            )
    }

    #[tokio::test]
    async fn places_search_sends_expected_params() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .and(query_param("api_key", "vs-key"))
            .and(query_param("search_type", "places"))
            .and(query_param("q", "Italian restaurants"))
            .and(query_param("location", "Austin"))
            .and(query_param("gl", "us"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "places_results": [
                    {"title": "Juliet Italian Kitchen", "data_cid": "1"},
                    {"title": "Red Ash", "data_cid": "2"}
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let results = client(&server)
            .search_places("Italian restaurants", Some("Austin"))
            .await
            .unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0]["title"], "Juliet Italian Kitchen");
    }

    #[tokio::test]
    async fn location_omitted_when_absent_and_missing_results_is_empty() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param_is_missing("location"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .mount(&server)
            .await;

        let results = client(&server).search_places("tacos", None).await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn details_retry_on_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(query_param("search_type", "place_details"))
            .and(query_param("data_cid", "42"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "place_details": {"title": "Uchi", "phone": "+1 512-916-4808"}
            })))
            .mount(&server)
            .await;

        let details = client(&server).place_details("42").await.unwrap();
        assert_eq!(details["title"], "Uchi");
    }

    #[tokio::test]
    async fn bad_key_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;

        let err = client(&server).place_details("42").await.unwrap_err();
        assert!(matches!(err, ProviderError::AuthenticationFailed(_)));
    }
}
