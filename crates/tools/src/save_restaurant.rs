//! Persist a restaurant record. The only tool with a lasting side effect.

use async_trait::async_trait;
use concierge_core::error::ToolError;
use concierge_core::records::{Restaurant, RestaurantStore};
use concierge_core::tool::{SideEffect, Tool};
use std::sync::Arc;
use tracing::info;

use crate::parse_args;

pub struct SaveRestaurantTool {
    records: Arc<dyn RestaurantStore>,
}

impl SaveRestaurantTool {
    pub fn new(records: Arc<dyn RestaurantStore>) -> Self {
        Self { records }
    }
}

const OPTIONAL_TEXT_FIELDS: &[(&str, &str)] = &[
    ("website", "The website of the restaurant"),
    ("description", "A short description"),
    ("address", "The street address"),
    ("phone", "The phone number"),
    ("hours", "Hours as text"),
    ("opening_hours", "Opening hours as text"),
    ("people_also_search_for", "Related searches"),
    ("menu", "Menu link or text"),
    ("reservations", "Reservation information"),
    ("order", "Ordering information"),
    ("order_food", "Food ordering links"),
];

#[async_trait]
impl Tool for SaveRestaurantTool {
    fn name(&self) -> &str {
        "save_restaurant"
    }

    fn description(&self) -> &str {
        "Save a restaurant to the database. title, type and category are required; \
         copy any other known fields from search or details results."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        let mut properties = serde_json::json!({
            "title": { "type": "string", "description": "The name of the restaurant" },
            "type": { "type": "string", "description": "The type, e.g. 'restaurant'" },
            "category": { "type": "string", "description": "The cuisine or category" },
            "rating": { "type": "number", "description": "Average rating" },
            "reviews": { "type": "integer", "description": "Number of reviews" },
            "unclaimed": { "type": "boolean", "description": "Whether the listing is unclaimed" }
        });
        for (name, description) in OPTIONAL_TEXT_FIELDS {
            properties[*name] = serde_json::json!({ "type": "string", "description": description });
        }
        serde_json::json!({
            "type": "object",
            "properties": properties,
            "required": ["title", "type", "category"],
            "additionalProperties": false
        })
    }

    fn side_effect(&self) -> SideEffect {
        SideEffect::PersistentWrite
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<serde_json::Value, ToolError> {
        let restaurant: Restaurant = parse_args(arguments)?;
        let saved = self
            .records
            .create(restaurant)
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: self.name().to_string(),
                reason: e.to_string(),
            })?;

        info!(id = ?saved.id, title = %saved.title, "Restaurant saved");
        Ok(serde_json::json!({
            "saved": true,
            "id": saved.id,
            "title": saved.title,
        }))
    }
}
