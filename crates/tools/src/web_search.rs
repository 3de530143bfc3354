//! Web search tool — query the DuckDuckGo instant-answer API.
//!
//! Keyless endpoint, JSON responses. Network failures become error-status
//! results so the model can decide how to proceed.

use async_trait::async_trait;
use irontask_core::error::ToolError;
use irontask_core::tool::{Tool, ToolResult};
use tracing::debug;

const ENDPOINT: &str = "https://api.duckduckgo.com/";

pub struct WebSearchTool {
    client: reqwest::Client,
    max_results: usize,
}

impl WebSearchTool {
    pub fn new(max_results: usize) -> Self {
        Self {
            client: reqwest::Client::new(),
            max_results: max_results.max(1),
        }
    }
}

impl Default for WebSearchTool {
    fn default() -> Self {
        Self::new(5)
    }
}

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &str {
        "web_search"
    }

    fn description(&self) -> &str {
        "Search the web for a query. Returns a short answer and related results."
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
            "required": ["query"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let query = arguments["query"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'query' argument".into()))?;

        debug!(query = %query, "Web search");

        let response = match self
            .client
            .get(ENDPOINT)
            .query(&[("q", query), ("format", "json"), ("no_html", "1")])
            .timeout(std::time::Duration::from_secs(10))
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => return Ok(ToolResult::error(format!("Search request failed: {e}"))),
        };

        if !response.status().is_success() {
            return Ok(ToolResult::error(format!(
                "Search API returned status {}",
                response.status()
            )));
        }

        let data: serde_json::Value = match response.json().await {
            Ok(d) => d,
            Err(e) => return Ok(ToolResult::error(format!("Invalid search response: {e}"))),
        };

        Ok(ToolResult::ok(format_results(query, &data, self.max_results)))
    }
}

fn format_results(query: &str, data: &serde_json::Value, max_results: usize) -> String {
    let mut lines = Vec::new();

    if let Some(abstract_text) = data["AbstractText"].as_str() {
        if !abstract_text.is_empty() {
            lines.push(abstract_text.to_string());
        }
    }

    if let Some(topics) = data["RelatedTopics"].as_array() {
        for topic in topics.iter().take(max_results) {
            let text = topic["Text"].as_str().unwrap_or("");
            let url = topic["FirstURL"].as_str().unwrap_or("");
            if !text.is_empty() {
                lines.push(format!("- {text} ({url})"));
            }
        }
    }

    if lines.is_empty() {
        format!("No results for: {query}")
    } else {
        lines.join("\n")
    }
}
