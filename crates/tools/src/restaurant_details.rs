//! Place details lookup by `data_cid`.

use async_trait::async_trait;
use concierge_core::error::ToolError;
use concierge_core::search::PlaceSearch;
use concierge_core::tool::{SideEffect, Tool};
use serde::Deserialize;
use std::sync::Arc;

use crate::{parse_args, upstream_failure};

pub struct RestaurantDetailsTool {
    places: Arc<dyn PlaceSearch>,
}

impl RestaurantDetailsTool {
    pub fn new(places: Arc<dyn PlaceSearch>) -> Self {
        Self { places }
    }
}

#[derive(Deserialize)]
struct Args {
    data_cid: String,
}

#[async_trait]
impl Tool for RestaurantDetailsTool {
    fn name(&self) -> &str {
        "get_restaurant_details"
    }

    fn description(&self) -> &str {
        "Get the details of a restaurant (hours, phone, website, menu, reservations) based on \
         the data_cid returned by search_restaurants."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "data_cid": {
                    "type": "string",
                    "description": "The data CID of the restaurant"
                }
            },
            "required": ["data_cid"],
            "additionalProperties": false
        })
    }

    fn side_effect(&self) -> SideEffect {
        SideEffect::NetworkSearch
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<serde_json::Value, ToolError> {
        let args: Args = parse_args(arguments)?;
        let details = self
            .places
            .place_details(&args.data_cid)
            .await
            .map_err(|e| upstream_failure(self.name(), e))?;

        if details.is_null() {
            return Err(ToolError::ExecutionFailed {
                tool_name: self.name().to_string(),
                reason: format!("no details found for data_cid {}", args.data_cid),
            });
        }
        Ok(details)
    }
}
