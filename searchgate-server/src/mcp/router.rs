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

//! MCP Router
//!
//! Axum routes for the protocol endpoint.

use axum::{middleware, routing::get, Router};

use super::dispatcher::{handle_mcp_delete, handle_mcp_get, handle_mcp_post};
use crate::api::AppState;
use crate::auth::require_api_key;

/// Protocol endpoint routes, behind the API key gate.
pub fn mcp_router(state: AppState) -> Router<AppState> {
    Router::new()
        .route(
            paths::MCP_HTTP,
            get(handle_mcp_get)
                .post(handle_mcp_post)
                .delete(handle_mcp_delete),
        )
        .route_layer(middleware::from_fn_with_state(state, require_api_key))
}

/// MCP endpoint paths
pub mod paths {
    /// Streamable HTTP endpoint for JSON-RPC messages
    pub const MCP_HTTP: &str = "/mcp";
}
