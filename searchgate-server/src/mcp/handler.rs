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

//! Protocol handler abstraction.
//!
//! A [`SessionHandler`] is the unit the session registry binds to a session
//! id. The registry and dispatcher only ever see this trait; the built-in MCP
//! implementation lives in [`crate::mcp::handlers`].

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

use super::protocol::{JsonRpcRequest, JsonRpcResponse};

/// Failures raised by a protocol handler or the tool provider behind it.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("Handler rejected connection: {0}")]
    Connect(String),

    #[error("Tool provider error: {0}")]
    Provider(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Handler failure: {0}")]
    Internal(String),
}

/// What a handler produced for one inbound message.
#[derive(Debug, Clone)]
pub enum HandlerReply {
    /// A JSON-RPC response to send back
    Response(JsonRpcResponse),
    /// Notification accepted, nothing to send
    Accepted,
}

/// Per-handler inputs resolved from the HTTP request that created it.
#[derive(Debug, Clone, Default)]
pub struct HandlerContext {
    pub api_key: Option<String>,
}

#[async_trait]
pub trait SessionHandler: Send + Sync {
    /// Accept the transport connection. `session_id` is `None` for one-shot
    /// handlers that are never registered.
    async fn connect(&self, session_id: Option<&str>) -> Result<(), HandlerError>;

    /// Process one inbound message.
    async fn handle(&self, request: JsonRpcRequest) -> Result<HandlerReply, HandlerError>;
}

/// Builds a fresh handler for a new session or a one-shot request.
pub trait HandlerFactory: Send + Sync {
    fn create(&self, context: HandlerContext) -> Arc<dyn SessionHandler>;
}
