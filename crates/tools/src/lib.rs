//! Concierge tool implementations.
//!
//! Each tool is an explicit struct holding the collaborator handles it needs.
//! [`concierge_registry`] assembles all five once at startup.

pub mod lookup_restaurants;
pub mod restaurant_details;
pub mod save_restaurant;
pub mod search_restaurants;
pub mod web_search;

use concierge_core::error::{ProviderError, ToolError};
use concierge_core::records::RestaurantStore;
use concierge_core::search::{PlaceSearch, WebSearch};
use concierge_core::tool::ToolRegistry;
use serde::de::DeserializeOwned;
use std::sync::Arc;

pub use lookup_restaurants::LookupRestaurantsTool;
pub use restaurant_details::RestaurantDetailsTool;
pub use save_restaurant::SaveRestaurantTool;
pub use search_restaurants::SearchRestaurantsTool;
pub use web_search::WebSearchTool;

/// Collaborators the concierge tools are bound to.
#[derive(Clone)]
pub struct ToolDeps {
    pub places: Arc<dyn PlaceSearch>,
    pub web: Arc<dyn WebSearch>,
    pub records: Arc<dyn RestaurantStore>,
}

/// Build the registry with every concierge tool.
pub fn concierge_registry(deps: ToolDeps) -> ToolRegistry {
    ToolRegistry::new()
        .with_tool(Arc::new(SearchRestaurantsTool::new(deps.places.clone())))
        .with_tool(Arc::new(RestaurantDetailsTool::new(deps.places)))
        .with_tool(Arc::new(WebSearchTool::new(deps.web)))
        .with_tool(Arc::new(LookupRestaurantsTool::new(deps.records.clone())))
        .with_tool(Arc::new(SaveRestaurantTool::new(deps.records)))
}

/// Decode already-validated arguments into the tool's typed form.
pub(crate) fn parse_args<T: DeserializeOwned>(arguments: serde_json::Value) -> Result<T, ToolError> {
    serde_json::from_value(arguments).map_err(|e| ToolError::InvalidArguments(e.to_string()))
}

pub(crate) fn upstream_failure(tool_name: &str, error: ProviderError) -> ToolError {
    ToolError::ExecutionFailed {
        tool_name: tool_name.to_string(),
        reason: error.to_string(),
    }
}
