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

use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::debug;

use crate::api::{AppState, IMPORT_PATH};
use crate::mcp::{paths, MCP_PROTOCOL_VERSION};

pub const SERVER_NAME: &str = "searchgate";

/// Health check response structure
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub transport: &'static str,
    pub timestamp: DateTime<Utc>,
}

/// Server descriptor returned by `GET /`
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerInfoResponse {
    pub name: &'static str,
    pub version: &'static str,
    pub protocol_version: &'static str,
    pub transport: &'static str,
    pub endpoints: BTreeMap<&'static str, &'static str>,
}

/// GET /health - Liveness probe
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    debug!("Health check requested");
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        transport: state.config.server.response_mode.as_str(),
        timestamp: Utc::now(),
    })
}

/// GET / - Server descriptor
pub async fn server_info(State(state): State<AppState>) -> Json<ServerInfoResponse> {
    let endpoints = BTreeMap::from([
        ("health", "/health"),
        ("mcp", paths::MCP_HTTP),
        ("analytics", "/analytics"),
        ("toolAnalytics", "/analytics/tools"),
        ("dashboard", "/analytics/dashboard"),
        ("import", IMPORT_PATH),
        ("ping", "/ping"),
    ]);

    Json(ServerInfoResponse {
        name: SERVER_NAME,
        version: env!("CARGO_PKG_VERSION"),
        protocol_version: MCP_PROTOCOL_VERSION,
        transport: state.config.server.response_mode.as_str(),
        endpoints,
    })
}

/// ANY /ping
pub async fn ping() -> &'static str {
    "pong"
}
