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

//! Up-front classification of inbound protocol messages.
//!
//! The dispatcher and the session registry branch on [`RequestKind`] instead
//! of poking at raw JSON fields.

use serde_json::Value;

use super::protocol::{JsonRpcError, JsonRpcRequest};

pub const METHOD_INITIALIZE: &str = "initialize";
pub const METHOD_LIST_TOOLS: &str = "tools/list";
pub const METHOD_CALL_TOOL: &str = "tools/call";

/// Closed set of request shapes the gateway cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestKind {
    /// Session handshake
    Initialize,
    /// Capability discovery; allowed without a session
    ListTools,
    /// Tool invocation with the tool name from `params.name`
    CallTool { tool: String },
    /// Message without an id
    Notification { method: String },
    /// Any other request
    Other { method: String },
}

impl RequestKind {
    fn of(request: &JsonRpcRequest) -> Self {
        if request.is_notification() {
            return Self::Notification {
                method: request.method.clone(),
            };
        }

        match request.method.as_str() {
            METHOD_INITIALIZE => Self::Initialize,
            METHOD_LIST_TOOLS => Self::ListTools,
            METHOD_CALL_TOOL => match tool_name(request.params.as_ref()) {
                Some(tool) => Self::CallTool { tool },
                None => Self::Other {
                    method: request.method.clone(),
                },
            },
            other => Self::Other {
                method: other.to_string(),
            },
        }
    }

    /// True for the one shape that may bypass session establishment.
    pub fn is_discovery(&self) -> bool {
        matches!(self, Self::ListTools)
    }

    pub fn tool(&self) -> Option<&str> {
        match self {
            Self::CallTool { tool } => Some(tool),
            _ => None,
        }
    }
}

fn tool_name(params: Option<&Value>) -> Option<String> {
    params?
        .get("name")?
        .as_str()
        .filter(|name| !name.is_empty())
        .map(str::to_string)
}

/// A parsed inbound message together with its classification.
#[derive(Debug, Clone)]
pub struct ProtocolRequest {
    pub message: JsonRpcRequest,
    pub kind: RequestKind,
}

impl ProtocolRequest {
    /// Parse and classify a raw request body.
    pub fn parse(body: &[u8]) -> Result<Self, JsonRpcError> {
        let value: Value = serde_json::from_slice(body)
            .map_err(|e| JsonRpcError::parse_error(format!("Invalid JSON: {}", e)))?;

        if value.is_array() {
            return Err(JsonRpcError::invalid_request(
                "Batch requests are not supported",
            ));
        }

        let message: JsonRpcRequest = serde_json::from_value(value).map_err(|e| {
            JsonRpcError::invalid_request(format!("Invalid JSON-RPC request: {}", e))
        })?;

        let kind = RequestKind::of(&message);
        Ok(Self { message, kind })
    }

    pub fn method(&self) -> &str {
        &self.message.method
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify(body: &str) -> RequestKind {
        ProtocolRequest::parse(body.as_bytes()).unwrap().kind
    }

    #[test]
    fn test_classify_known_shapes() {
        assert_eq!(
            classify(r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{}}"#),
            RequestKind::Initialize
        );
        assert_eq!(
            classify(r#"{"jsonrpc":"2.0","id":"a","method":"tools/list"}"#),
            RequestKind::ListTools
        );
        assert_eq!(
            classify(
                r#"{"jsonrpc":"2.0","id":2,"method":"tools/call","params":{"name":"web_search","arguments":{"query":"rust"}}}"#
            ),
            RequestKind::CallTool {
                tool: "web_search".to_string()
            }
        );
        assert_eq!(
            classify(r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#),
            RequestKind::Notification {
                method: "notifications/initialized".to_string()
            }
        );
    }

    #[test]
    fn test_tools_call_without_name_is_not_a_tool_call() {
        let kind = classify(r#"{"jsonrpc":"2.0","id":3,"method":"tools/call","params":{}}"#);
        assert_eq!(
            kind,
            RequestKind::Other {
                method: "tools/call".to_string()
            }
        );
        assert!(kind.tool().is_none());
    }

    #[test]
    fn test_list_tools_notification_is_not_discovery() {
        let kind = classify(r#"{"jsonrpc":"2.0","method":"tools/list"}"#);
        assert!(!kind.is_discovery());
    }

    #[test]
    fn test_parse_errors() {
        let err = ProtocolRequest::parse(b"{oops").unwrap_err();
        assert_eq!(err.code, JsonRpcError::PARSE_ERROR);

        let err = ProtocolRequest::parse(br#"[{"jsonrpc":"2.0","id":1,"method":"ping"}]"#)
            .unwrap_err();
        assert_eq!(err.code, JsonRpcError::INVALID_REQUEST);

        let err = ProtocolRequest::parse(br#"{"jsonrpc":"2.0","id":1}"#).unwrap_err();
        assert_eq!(err.code, JsonRpcError::INVALID_REQUEST);
    }
}
