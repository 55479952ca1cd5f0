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

//! Model Context Protocol (MCP) gateway
//!
//! Clients speak JSON-RPC 2.0 to a single streamable-HTTP endpoint. Each
//! client session is bound to its own [`SessionHandler`]; the built-in
//! handler answers the handshake and tool discovery and forwards tool calls
//! to the configured [`ToolProvider`].
//!
//! ## Request flow
//!
//! ```text
//! POST /mcp ─▶ api key gate ─▶ record arrival ─▶ classify ─▶ resolve session ─▶ handler
//! ```
//!
//! A `tools/list` request without an `Mcp-Session-Id` header is served by a
//! throwaway handler and never creates a session.

pub mod dispatcher;
pub mod handler;
pub mod handlers;
pub mod protocol;
pub mod request;
pub mod router;
pub mod session;
pub mod tools;

pub use dispatcher::{Admission, Admitted, Dispatched, RequestDispatcher};
pub use handler::{HandlerContext, HandlerError, HandlerFactory, HandlerReply, SessionHandler};
pub use handlers::{McpHandlerFactory, McpSessionHandler};
pub use protocol::{
    JsonRpcError, JsonRpcId, JsonRpcRequest, JsonRpcResponse, MCP_PROTOCOL_VERSION,
    SESSION_ID_HEADER,
};
pub use request::{ProtocolRequest, RequestKind};
pub use router::{mcp_router, paths};
pub use session::{Resolution, SessionBinding, SessionRegistry};
pub use tools::{HttpToolProvider, ToolDefinition, ToolProvider};
