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

//! Analytics read and import endpoints.

use axum::{
    body::Bytes,
    extract::{ConnectInfo, State},
    http::{HeaderMap, Method, Uri},
    Json,
};
use std::net::SocketAddr;
use chrono::Utc;
use searchgate_core::{AnalyticsDelta, AnalyticsSummary, ToolAnalytics};
use serde::Serialize;
use tracing::{error, info, warn};

use crate::api::{record_rest_request, ApiError, AppState};
use crate::auth::{query_param, verify_import_secret, IMPORT_SECRET_QUERY_PARAM};

/// Recent calls returned by `GET /analytics/tools`.
pub const TOOL_ANALYTICS_RECENT_LIMIT: usize = 50;

/// Route of the import endpoint, recorded only after the secret check.
pub const IMPORT_PATH: &str = "/analytics/import";

#[derive(Debug, Serialize)]
pub struct ImportResponse {
    pub success: bool,
    pub merged: Vec<&'static str>,
    pub persisted: bool,
}

/// GET /analytics - Summary view
pub async fn get_analytics(State(state): State<AppState>) -> Json<AnalyticsSummary> {
    Json(state.store.summarize(Utc::now()))
}

/// GET /analytics/tools - Per-tool counts and recent calls
pub async fn get_tool_analytics(State(state): State<AppState>) -> Json<ToolAnalytics> {
    Json(state.store.tool_analytics(TOOL_ANALYTICS_RECENT_LIMIT))
}

/// POST /analytics/import - Merge aggregate counts from a backup
pub async fn import_analytics(
    State(state): State<AppState>,
    connect: Option<ConnectInfo<SocketAddr>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<ImportResponse>, ApiError> {
    let supplied = query_param(&uri, IMPORT_SECRET_QUERY_PARAM);
    if let Err(e) = verify_import_secret(
        state.config.analytics.import_secret.as_deref(),
        supplied.as_deref(),
    ) {
        warn!("Rejected analytics import: {}", e);
        return Err(e);
    }

    let peer = connect.map(|ConnectInfo(addr)| addr);
    record_rest_request(&state.store, &method, IMPORT_PATH, &headers, peer);

    let delta: AnalyticsDelta = serde_json::from_slice(&body)
        .map_err(|e| ApiError::BadRequest(format!("Invalid analytics payload: {}", e)))?;

    let merged = state.store.merge(&delta);
    info!(sections = ?merged, "Merged imported analytics");

    let store = state.store.clone();
    let persisted = match tokio::task::spawn_blocking(move || store.persist()).await {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            warn!(error = %e, "Failed to persist analytics after import");
            false
        }
        Err(e) => {
            error!(error = %e, "Analytics persist task panicked");
            false
        }
    };

    Ok(Json(ImportResponse {
        success: true,
        merged,
        persisted,
    }))
}
