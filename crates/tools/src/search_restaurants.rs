//! Restaurant search by query and location.

use async_trait::async_trait;
use concierge_core::error::ToolError;
use concierge_core::search::PlaceSearch;
use concierge_core::tool::{SideEffect, Tool};
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;

use crate::{parse_args, upstream_failure};

pub struct SearchRestaurantsTool {
    places: Arc<dyn PlaceSearch>,
}

impl SearchRestaurantsTool {
    pub fn new(places: Arc<dyn PlaceSearch>) -> Self {
        Self { places }
    }
}

#[derive(Deserialize)]
struct Args {
    query: String,
    location: String,
}

#[async_trait]
impl Tool for SearchRestaurantsTool {
    fn name(&self) -> &str {
        "search_restaurants"
    }

    fn description(&self) -> &str {
        "Search for restaurants based on a given query and location. Returns a list of places \
         with their title, address, rating, reviews and data_cid (use data_cid with \
         get_restaurant_details)."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The search query for restaurants, e.g. 'Italian restaurants'"
                },
                "location": {
                    "type": "string",
                    "description": "The location or area to search in, e.g. 'Austin, TX'"
                }
            },
            "required": ["query", "location"],
            "additionalProperties": false
        })
    }

    fn side_effect(&self) -> SideEffect {
        SideEffect::NetworkSearch
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<serde_json::Value, ToolError> {
        let args: Args = parse_args(arguments)?;
        if args.location.trim().is_empty() {
            return Err(ToolError::InvalidArguments(
                "location must not be empty; ask the user where to search".into(),
            ));
        }

        let results = self
            .places
            .search_places(&args.query, Some(&args.location))
            .await
            .map_err(|e| upstream_failure(self.name(), e))?;

        debug!(query = %args.query, location = %args.location, count = results.len(), "Restaurant search");
        Ok(serde_json::Value::Array(results))
    }
}
