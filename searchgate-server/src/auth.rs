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

//! Credential checks.
//!
//! The protocol endpoint requires an API key, which is forwarded to the tool
//! provider. The analytics import endpoint is guarded by an optional shared
//! secret.

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode, Uri},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use url::form_urlencoded;

use crate::api::{ApiError, AppState};
use crate::mcp::protocol::{JsonRpcError, JsonRpcId, JsonRpcResponse};

/// Query parameter carrying the API key on the protocol endpoint.
pub const API_KEY_QUERY_PARAM: &str = "apiKey";
pub const API_KEY_HEADER: &str = "x-api-key";
/// Query parameter carrying the import secret.
pub const IMPORT_SECRET_QUERY_PARAM: &str = "key";

/// API key resolved for the current request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiKey(pub String);

/// Client-supplied key: `apiKey` query parameter, then `x-api-key`, then
/// `Authorization: Bearer`.
pub fn extract_api_key(uri: &Uri, headers: &HeaderMap) -> Option<String> {
    let present = |key: &String| !key.is_empty();

    query_param(uri, API_KEY_QUERY_PARAM)
        .filter(present)
        .or_else(|| {
            headers
                .get(API_KEY_HEADER)
                .and_then(|h| h.to_str().ok())
                .map(str::to_string)
                .filter(present)
        })
        .or_else(|| {
            headers
                .get(header::AUTHORIZATION)
                .and_then(|h| h.to_str().ok())
                .and_then(|v| v.strip_prefix("Bearer "))
                .map(|token| token.trim().to_string())
                .filter(present)
        })
}

pub(crate) fn query_param(uri: &Uri, name: &str) -> Option<String> {
    let query = uri.query()?;
    form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
}

/// API key gate for the protocol endpoint.
pub async fn require_api_key(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Response {
    let key = extract_api_key(req.uri(), req.headers())
        .or_else(|| state.config.provider.api_key.clone());

    match key {
        Some(key) => {
            req.extensions_mut().insert(ApiKey(key));
            next.run(req).await
        }
        None => {
            tracing::warn!(path = %req.uri().path(), "Rejected protocol request without API key");
            (
                StatusCode::UNAUTHORIZED,
                Json(JsonRpcResponse::error(
                    JsonRpcId::Null,
                    JsonRpcError::api_key_required(),
                )),
            )
                .into_response()
        }
    }
}

/// Check the import secret. Open when no secret is configured.
pub fn verify_import_secret(
    configured: Option<&str>,
    supplied: Option<&str>,
) -> Result<(), ApiError> {
    match (configured, supplied) {
        (None, _) => Ok(()),
        (Some(expected), Some(given)) if expected == given => Ok(()),
        (Some(_), None) => Err(ApiError::Forbidden("Missing import key".to_string())),
        (Some(_), Some(_)) => Err(ApiError::Forbidden("Invalid import key".to_string())),
    }
}
