//! Query saved restaurants.

use async_trait::async_trait;
use concierge_core::error::ToolError;
use concierge_core::records::{RestaurantFilter, RestaurantStore};
use concierge_core::tool::{SideEffect, Tool};
use std::sync::Arc;

use crate::parse_args;

pub struct LookupRestaurantsTool {
    records: Arc<dyn RestaurantStore>,
}

impl LookupRestaurantsTool {
    pub fn new(records: Arc<dyn RestaurantStore>) -> Self {
        Self { records }
    }
}

#[async_trait]
impl Tool for LookupRestaurantsTool {
    fn name(&self) -> &str {
        "lookup_restaurants"
    }

    fn description(&self) -> &str {
        "Look up restaurants previously saved to the database. All filters are optional: \
         title/type/category match exactly, address matches any part of the address, \
         min_rating and max_reviews are bounds."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "title": { "type": "string", "description": "Exact restaurant name" },
                "type": { "type": "string", "description": "Exact type, e.g. 'restaurant'" },
                "category": { "type": "string", "description": "Exact category, e.g. 'Italian'" },
                "address": { "type": "string", "description": "Part of the address, case-insensitive" },
                "min_rating": { "type": "number", "description": "Minimum rating" },
                "max_reviews": { "type": "integer", "description": "Maximum number of reviews" },
                "unclaimed": { "type": "boolean", "description": "Whether the listing is unclaimed" }
            },
            "additionalProperties": false
        })
    }

    fn side_effect(&self) -> SideEffect {
        SideEffect::IdempotentRead
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<serde_json::Value, ToolError> {
        let filter: RestaurantFilter = if arguments.is_null() {
            RestaurantFilter::default()
        } else {
            parse_args(arguments)?
        };

        let rows = self
            .records
            .filter(&filter)
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: self.name().to_string(),
                reason: e.to_string(),
            })?;

        serde_json::to_value(rows).map_err(|e| ToolError::ExecutionFailed {
            tool_name: self.name().to_string(),
            reason: e.to_string(),
        })
    }
}
