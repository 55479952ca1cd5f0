// Copyright 2025 Sushanth (https://github.com/sushanthpy)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Tool provider seam.
//!
//! Tool semantics live upstream. The gateway advertises configured tool
//! definitions and forwards invocations to the provider endpoint.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};

use super::handler::HandlerError;
use super::protocol::{CallToolResult, Tool};
use crate::config::ProviderConfig;

/// Tool definition as written in the `[[provider.tools]]` config tables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_input_schema")]
    pub input_schema: Value,
}

fn default_input_schema() -> Value {
    json!({ "type": "object", "properties": {} })
}

impl ToolDefinition {
    pub fn to_tool(&self) -> Tool {
        Tool {
            name: self.name.clone(),
            description: self.description.clone(),
            input_schema: self.input_schema.clone(),
        }
    }
}

/// Executes tool calls on behalf of a session.
#[async_trait]
pub trait ToolProvider: Send + Sync {
    /// Tools advertised through `tools/list`.
    fn tools(&self) -> Vec<Tool>;

    /// Run `name`. Tool-level failures come back as a result with
    /// `isError: true`; `Err` is reserved for failures of the provider itself.
    async fn call(
        &self,
        name: &str,
        arguments: HashMap<String, Value>,
        api_key: Option<&str>,
    ) -> Result<CallToolResult, HandlerError>;
}

/// Forwards tool calls as `POST {endpoint}` with `{"tool", "arguments"}`.
pub struct HttpToolProvider {
    tools: Vec<ToolDefinition>,
    endpoint: Option<String>,
    client: reqwest::Client,
}

impl HttpToolProvider {
    pub fn new(config: &ProviderConfig) -> Result<Self, HandlerError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()
            .map_err(|e| HandlerError::Provider(e.to_string()))?;

        Ok(Self {
            tools: config.tools.clone(),
            endpoint: config.endpoint.clone(),
            client,
        })
    }

    fn knows(&self, name: &str) -> bool {
        self.tools.iter().any(|t| t.name == name)
    }
}

#[async_trait]
impl ToolProvider for HttpToolProvider {
    fn tools(&self) -> Vec<Tool> {
        self.tools.iter().map(ToolDefinition::to_tool).collect()
    }

    async fn call(
        &self,
        name: &str,
        arguments: HashMap<String, Value>,
        api_key: Option<&str>,
    ) -> Result<CallToolResult, HandlerError> {
        if !self.knows(name) {
            return Ok(CallToolResult::error(format!("Unknown tool: {}", name)));
        }

        let Some(endpoint) = self.endpoint.as_deref() else {
            return Ok(CallToolResult::error(
                "Tool provider not configured: set provider.endpoint",
            ));
        };

        let mut request = self
            .client
            .post(endpoint)
            .json(&json!({ "tool": name, "arguments": arguments }));
        if let Some(key) = api_key {
            request = request.bearer_auth(key);
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                warn!(tool = %name, error = %e, "Tool provider request failed");
                return Ok(CallToolResult::error(format!("Provider request failed: {}", e)));
            }
        };

        let status = response.status();
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                return Ok(CallToolResult::error(format!(
                    "Failed to read provider response: {}",
                    e
                )))
            }
        };

        if !status.is_success() {
            warn!(tool = %name, status = %status, "Tool provider returned an error");
            return Ok(CallToolResult::error(format!(
                "Provider returned {}: {}",
                status, body
            )));
        }

        debug!(tool = %name, bytes = body.len(), "Tool provider call completed");
        Ok(serde_json::from_str::<CallToolResult>(&body)
            .unwrap_or_else(|_| CallToolResult::text(body)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider(endpoint: Option<&str>) -> HttpToolProvider {
        let config = ProviderConfig {
            endpoint: endpoint.map(str::to_string),
            tools: vec![ToolDefinition {
                name: "web_search".to_string(),
                description: Some("Search the web".to_string()),
                input_schema: default_input_schema(),
            }],
            ..Default::default()
        };
        HttpToolProvider::new(&config).unwrap()
    }

    #[test]
    fn test_tools_are_advertised() {
        let tools = provider(None).tools();
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].name, "web_search");
        assert_eq!(tools[0].input_schema["type"], "object");
    }

    #[tokio::test]
    async fn test_unknown_tool_is_a_tool_error() {
        let result = provider(None)
            .call("nope", HashMap::new(), None)
            .await
            .unwrap();
        assert_eq!(result.is_error, Some(true));
    }

    #[tokio::test]
    async fn test_missing_endpoint_is_a_tool_error() {
        let result = provider(None)
            .call("web_search", HashMap::new(), Some("key"))
            .await
            .unwrap();
        assert_eq!(result.is_error, Some(true));
    }
}
