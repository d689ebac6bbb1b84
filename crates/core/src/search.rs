//! Search collaborator contracts.
//!
//! Results are passed through to the model as JSON, so the traits deal in
//! `serde_json::Value` rather than provider-specific structs.

use async_trait::async_trait;

use crate::error::ProviderError;

/// Place search (restaurants, venues).
#[async_trait]
pub trait PlaceSearch: Send + Sync {
    fn name(&self) -> &str;

    /// Places matching `query`, optionally near `location`.
    async fn search_places(
        &self,
        query: &str,
        location: Option<&str>,
    ) -> Result<Vec<serde_json::Value>, ProviderError>;

    /// Full details for one place by its provider id.
    async fn place_details(&self, id: &str) -> Result<serde_json::Value, ProviderError>;
}

/// General web search.
#[async_trait]
pub trait WebSearch: Send + Sync {
    fn name(&self) -> &str;

    async fn search(&self, query: &str) -> Result<serde_json::Value, ProviderError>;

    /// A web-grounded generated answer with its sources.
    ///
    /// Backends without such an endpoint report `NotConfigured`.
    async fn query_web_llm(&self, query: &str) -> Result<serde_json::Value, ProviderError> {
        let _ = query;
        Err(ProviderError::NotConfigured(format!(
            "{} has no web-grounded answer endpoint",
            self.name()
        )))
    }
}
