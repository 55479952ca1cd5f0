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

//! MCP Request Handlers
//!
//! The built-in [`SessionHandler`]: answers the handshake and tool discovery
//! itself and delegates tool invocations to a [`ToolProvider`].

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::handler::{HandlerContext, HandlerError, HandlerFactory, HandlerReply, SessionHandler};
use super::protocol::*;
use super::request::{METHOD_CALL_TOOL, METHOD_INITIALIZE, METHOD_LIST_TOOLS};
use super::tools::ToolProvider;

const SERVER_NAME: &str = "searchgate";

/// MCP request handler bound to one session (or one discovery request).
pub struct McpSessionHandler {
    provider: Arc<dyn ToolProvider>,
    context: HandlerContext,
    session_id: Mutex<Option<String>>,
}

impl McpSessionHandler {
    pub fn new(provider: Arc<dyn ToolProvider>, context: HandlerContext) -> Self {
        Self {
            provider,
            context,
            session_id: Mutex::new(None),
        }
    }

    pub fn session_id(&self) -> Option<String> {
        self.session_id.lock().clone()
    }

    fn handle_ping(&self, id: JsonRpcId) -> JsonRpcResponse {
        JsonRpcResponse::success(id, json!({}))
    }

    fn handle_initialize(
        &self,
        id: JsonRpcId,
        params: Option<serde_json::Value>,
    ) -> Result<JsonRpcResponse, HandlerError> {
        let init_params: InitializeParams = match params {
            Some(p) => match serde_json::from_value(p) {
                Ok(params) => params,
                Err(e) => {
                    return Ok(JsonRpcResponse::error(
                        id,
                        JsonRpcError::invalid_params(format!("Invalid initialize params: {}", e)),
                    ))
                }
            },
            None => {
                return Ok(JsonRpcResponse::error(
                    id,
                    JsonRpcError::invalid_params("Missing initialize params"),
                ))
            }
        };

        info!(
            client = %init_params.client_info.name,
            client_version = %init_params.client_info.version,
            protocol = %init_params.protocol_version,
            session = ?self.session_id(),
            "MCP client initializing"
        );

        let result = InitializeResult {
            protocol_version: MCP_PROTOCOL_VERSION.to_string(),
            capabilities: ServerCapabilities {
                tools: Some(ToolsCapability {
                    list_changed: false,
                }),
                logging: Some(LoggingCapability {}),
            },
            server_info: ServerInfo {
                name: SERVER_NAME.to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
        };

        Ok(JsonRpcResponse::success(id, serde_json::to_value(result)?))
    }

    fn handle_tools_list(&self, id: JsonRpcId) -> Result<JsonRpcResponse, HandlerError> {
        let result = ListToolsResult {
            tools: self.provider.tools(),
            next_cursor: None,
        };
        Ok(JsonRpcResponse::success(id, serde_json::to_value(result)?))
    }

    async fn handle_tools_call(
        &self,
        id: JsonRpcId,
        params: Option<serde_json::Value>,
    ) -> Result<JsonRpcResponse, HandlerError> {
        let call_params: CallToolParams = match params {
            Some(p) => match serde_json::from_value(p) {
                Ok(params) => params,
                Err(e) => {
                    return Ok(JsonRpcResponse::error(
                        id,
                        JsonRpcError::invalid_params(format!("Invalid tool call params: {}", e)),
                    ))
                }
            },
            None => {
                return Ok(JsonRpcResponse::error(
                    id,
                    JsonRpcError::invalid_params("Missing tool call params"),
                ))
            }
        };

        info!(tool = %call_params.name, "Executing MCP tool");

        let result = self
            .provider
            .call(
                &call_params.name,
                call_params.arguments,
                self.context.api_key.as_deref(),
            )
            .await?;

        Ok(JsonRpcResponse::success(id, serde_json::to_value(result)?))
    }
}

#[async_trait]
impl SessionHandler for McpSessionHandler {
    async fn connect(&self, session_id: Option<&str>) -> Result<(), HandlerError> {
        *self.session_id.lock() = session_id.map(str::to_string);
        debug!(session = ?session_id, "MCP handler connected");
        Ok(())
    }

    async fn handle(&self, request: JsonRpcRequest) -> Result<HandlerReply, HandlerError> {
        if request.is_notification() {
            match request.method.as_str() {
                "notifications/initialized" | "initialized" => {
                    info!(session = ?self.session_id(), "MCP client initialized")
                }
                other => debug!(method = %other, "MCP notification ignored"),
            }
            return Ok(HandlerReply::Accepted);
        }

        debug!(method = %request.method, "MCP request received");
        let id = request.response_id();

        let response = match request.method.as_str() {
            "ping" => self.handle_ping(id),
            METHOD_INITIALIZE => self.handle_initialize(id, request.params)?,
            METHOD_LIST_TOOLS => self.handle_tools_list(id)?,
            METHOD_CALL_TOOL => self.handle_tools_call(id, request.params).await?,
            _ => {
                warn!(method = %request.method, "Unknown MCP method");
                JsonRpcResponse::error(id, JsonRpcError::method_not_found(&request.method))
            }
        };

        Ok(HandlerReply::Response(response))
    }
}

/// Creates one [`McpSessionHandler`] per session over a shared provider.
pub struct McpHandlerFactory {
    provider: Arc<dyn ToolProvider>,
}

impl McpHandlerFactory {
    pub fn new(provider: Arc<dyn ToolProvider>) -> Self {
        Self { provider }
    }
}

impl HandlerFactory for McpHandlerFactory {
    fn create(&self, context: HandlerContext) -> Arc<dyn SessionHandler> {
        Arc::new(McpSessionHandler::new(self.provider.clone(), context))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    /// Echoes the tool name and the key it was called with.
    struct EchoProvider;

    #[async_trait]
    impl ToolProvider for EchoProvider {
        fn tools(&self) -> Vec<Tool> {
            vec![Tool {
                name: "web_search".to_string(),
                description: None,
                input_schema: json!({"type": "object"}),
            }]
        }

        async fn call(
            &self,
            name: &str,
            _arguments: HashMap<String, serde_json::Value>,
            api_key: Option<&str>,
        ) -> Result<CallToolResult, HandlerError> {
            match name {
                "broken" => Err(HandlerError::Provider("upstream down".to_string())),
                _ => Ok(CallToolResult::text(format!(
                    "{}:{}",
                    name,
                    api_key.unwrap_or("-")
                ))),
            }
        }
    }

    fn handler(api_key: Option<&str>) -> McpSessionHandler {
        McpSessionHandler::new(
            Arc::new(EchoProvider),
            HandlerContext {
                api_key: api_key.map(str::to_string),
            },
        )
    }

    fn request(method: &str, id: Option<i64>, params: Option<serde_json::Value>) -> JsonRpcRequest {
        JsonRpcRequest {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: method.to_string(),
            params,
            id: id.map(JsonRpcId::Number),
        }
    }

    fn response(reply: HandlerReply) -> JsonRpcResponse {
        match reply {
            HandlerReply::Response(response) => response,
            HandlerReply::Accepted => panic!("expected a response"),
        }
    }

    #[tokio::test]
    async fn test_initialize_reports_tools_capability() {
        let h = handler(None);
        h.connect(Some("abc")).await.unwrap();
        assert_eq!(h.session_id().as_deref(), Some("abc"));

        let params = json!({
            "protocolVersion": "2025-03-26",
            "capabilities": {},
            "clientInfo": {"name": "test", "version": "1.0"}
        });
        let resp = response(h.handle(request("initialize", Some(1), Some(params))).await.unwrap());
        let result = resp.result.unwrap();
        assert_eq!(result["protocolVersion"], MCP_PROTOCOL_VERSION);
        assert_eq!(result["serverInfo"]["name"], "searchgate");
        assert!(result["capabilities"]["tools"].is_object());
    }

    #[tokio::test]
    async fn test_initialize_without_params_is_invalid() {
        let reply = handler(None)
            .handle(request("initialize", Some(1), None))
            .await
            .unwrap();
        let resp = response(reply);
        assert_eq!(resp.error.unwrap().code, JsonRpcError::INVALID_PARAMS);
    }

    #[tokio::test]
    async fn test_notifications_are_accepted() {
        let reply = handler(None)
            .handle(request("notifications/initialized", None, None))
            .await
            .unwrap();
        assert!(matches!(reply, HandlerReply::Accepted));
    }

    #[tokio::test]
    async fn test_tools_list_and_call() {
        let h = handler(Some("k1"));

        let list = response(h.handle(request("tools/list", Some(2), None)).await.unwrap());
        assert_eq!(list.result.unwrap()["tools"][0]["name"], "web_search");

        let call = response(
            h.handle(request("tools/call", Some(3), Some(json!({"name": "web_search"}))))
                .await
                .unwrap(),
        );
        assert_eq!(call.id, JsonRpcId::Number(3));
        assert_eq!(call.result.unwrap()["content"][0]["text"], "web_search:k1");
    }

    #[tokio::test]
    async fn test_provider_failure_propagates() {
        let err = handler(None)
            .handle(request("tools/call", Some(4), Some(json!({"name": "broken"}))))
            .await
            .unwrap_err();
        assert!(matches!(err, HandlerError::Provider(_)));
    }

    #[tokio::test]
    async fn test_unknown_method() {
        let reply = handler(None)
            .handle(request("resources/list", Some(5), None))
            .await
            .unwrap();
        let resp = response(reply);
        assert_eq!(resp.error.unwrap().code, JsonRpcError::METHOD_NOT_FOUND);
    }

    #[test]
    fn test_factory_creates_distinct_handlers() {
        let factory = McpHandlerFactory::new(Arc::new(EchoProvider));
        let a = factory.create(HandlerContext::default());
        let b = factory.create(HandlerContext::default());
        assert!(!Arc::ptr_eq(&a, &b));
    }
}
