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

//! REST surface: health, server info and analytics.

pub mod analytics;
pub mod dashboard;
pub mod health;

pub use analytics::{get_analytics, get_tool_analytics, import_analytics, IMPORT_PATH};
pub use dashboard::get_dashboard;
pub use health::{health_check, ping, server_info};

use axum::{
    extract::{ConnectInfo, MatchedPath, Request, State},
    http::{HeaderMap, Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use searchgate_core::{AnalyticsStore, ClientInfo};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;

use crate::config::ServerConfig;
use crate::mcp::{HandlerFactory, RequestDispatcher, SessionRegistry};

/// API error type
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
        };

        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub store: Arc<AnalyticsStore>,
    pub dispatcher: Arc<RequestDispatcher>,
}

impl AppState {
    pub fn new(
        config: ServerConfig,
        store: Arc<AnalyticsStore>,
        factory: Arc<dyn HandlerFactory>,
    ) -> Self {
        let registry = Arc::new(SessionRegistry::new(factory, &config.sessions));
        let dispatcher = Arc::new(RequestDispatcher::new(store.clone(), registry));

        Self {
            config: Arc::new(config),
            store,
            dispatcher,
        }
    }

    pub fn sessions(&self) -> &SessionRegistry {
        self.dispatcher.registry()
    }
}

/// First `X-Forwarded-For` hop, if any.
pub fn extract_client_ip(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .map(str::to_string)
}

/// Best-effort client identity for analytics.
pub fn client_info(headers: &HeaderMap, peer: Option<SocketAddr>) -> ClientInfo {
    let ip = extract_client_ip(headers)
        .or_else(|| peer.map(|addr| addr.ip().to_string()))
        .unwrap_or_else(|| ClientInfo::UNKNOWN.to_string());
    let user_agent = headers
        .get(axum::http::header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .filter(|ua| !ua.is_empty())
        .unwrap_or(ClientInfo::UNKNOWN);

    ClientInfo::new(ip, user_agent)
}

/// Record one REST request against `endpoint`.
pub fn record_rest_request(
    store: &AnalyticsStore,
    method: &Method,
    endpoint: &str,
    headers: &HeaderMap,
    peer: Option<SocketAddr>,
) {
    let client = client_info(headers, peer);
    store.record_request(method.as_str(), endpoint, &client, Utc::now());
}

/// Count every request on the REST surface under its route path.
///
/// Routes gated by a secret are not layered with this and record themselves
/// once the secret has been accepted.
pub async fn track_requests(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let endpoint = req
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_string())
        .unwrap_or_else(|| req.uri().path().to_string());
    let peer = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);

    record_rest_request(&state.store, req.method(), &endpoint, req.headers(), peer);

    next.run(req).await
}
