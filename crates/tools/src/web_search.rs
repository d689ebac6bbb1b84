//! General web search, for questions place search can't answer
//! (reviews, news, "is it dog friendly").

use async_trait::async_trait;
use concierge_core::error::ToolError;
use concierge_core::search::WebSearch;
use concierge_core::tool::{SideEffect, Tool};
use serde::Deserialize;
use std::sync::Arc;

use crate::{parse_args, upstream_failure};

pub struct WebSearchTool {
    web: Arc<dyn WebSearch>,
}

impl WebSearchTool {
    pub fn new(web: Arc<dyn WebSearch>) -> Self {
        Self { web }
    }
}

#[derive(Deserialize)]
struct Args {
    query: String,
}

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &str {
        "web_search"
    }

    fn description(&self) -> &str {
        "Search the web for information based on a given query. Returns result titles, URLs and snippets."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The search query"
                }
            },
            "required": ["query"],
            "additionalProperties": false
        })
    }

    fn side_effect(&self) -> SideEffect {
        SideEffect::NetworkSearch
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<serde_json::Value, ToolError> {
        let args: Args = parse_args(arguments)?;
        self.web
            .search(&args.query)
            .await
            .map_err(|e| upstream_failure(self.name(), e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockWeb;

    #[tokio::test]
    async fn forwards_query() {
        let tool = WebSearchTool::new(Arc::new(MockWeb));
        let out = tool
            .execute(serde_json::json!({"query": "Franklin Barbecue wait time"}))
            .await
            .unwrap();
        assert_eq!(out["hits"][0]["title"], "About Franklin Barbecue wait time");
    }
}
