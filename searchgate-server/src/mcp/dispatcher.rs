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

//! Request dispatcher for the protocol endpoint.
//!
//! Per request: count the arrival, count the tool call (if any), resolve a
//! handler through the [`SessionRegistry`], then invoke it. Failures before a
//! reply exists become the generic `-32603` envelope.

use axum::{
    body::Bytes,
    extract::{ConnectInfo, State},
    http::{header, HeaderMap, HeaderValue, Method, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    Extension, Json,
};
use chrono::Utc;
use futures::{stream, StreamExt};
use searchgate_core::{AnalyticsStore, ClientInfo};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};

use super::handler::{HandlerContext, HandlerError, HandlerReply, SessionHandler};
use super::paths;
use super::protocol::{JsonRpcId, JsonRpcRequest, JsonRpcResponse, SESSION_ID_HEADER};
use super::request::{ProtocolRequest, RequestKind};
use super::session::{Resolution, SessionRegistry};
use crate::api::{client_info, ApiError, AppState};
use crate::auth::ApiKey;
use crate::config::ResponseMode;

/// A parsed request with its handler, ready to invoke.
pub struct Admitted {
    pub request: ProtocolRequest,
    pub resolution: Resolution,
}

impl Admitted {
    pub fn session_id(&self) -> Option<String> {
        self.resolution.binding.session_id().map(str::to_string)
    }
}

pub enum Admission {
    /// The body was not a JSON-RPC request; answer with this error
    Rejected(JsonRpcResponse),
    Admitted(Admitted),
}

/// Outcome of a complete dispatch in JSON mode.
#[derive(Debug)]
pub enum Dispatched {
    Reply {
        response: JsonRpcResponse,
        session: Option<String>,
    },
    Accepted {
        session: Option<String>,
    },
    Rejected(JsonRpcResponse),
    /// Resolution or the handler failed before producing a reply
    Failed,
}

pub struct RequestDispatcher {
    store: Arc<AnalyticsStore>,
    registry: Arc<SessionRegistry>,
}

impl RequestDispatcher {
    pub fn new(store: Arc<AnalyticsStore>, registry: Arc<SessionRegistry>) -> Self {
        Self { store, registry }
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    /// Count a request on the protocol endpoint.
    pub fn record_arrival(&self, method: &str, client: &ClientInfo) {
        self.store
            .record_request(method, paths::MCP_HTTP, client, Utc::now());
    }

    /// Record, classify and resolve one message without invoking it.
    pub async fn admit(
        &self,
        http_method: &str,
        session_header: Option<&str>,
        body: &[u8],
        client: &ClientInfo,
        context: HandlerContext,
    ) -> Result<Admission, HandlerError> {
        let now = Utc::now();
        self.store
            .record_request(http_method, paths::MCP_HTTP, client, now);

        let request = match ProtocolRequest::parse(body) {
            Ok(request) => request,
            Err(error) => {
                warn!(code = error.code, error = %error.message, "Rejected protocol message");
                return Ok(Admission::Rejected(JsonRpcResponse::error(
                    JsonRpcId::Null,
                    error,
                )));
            }
        };

        if let Some(tool) = request.kind.tool() {
            self.store.record_tool_call(tool, client, now);
        }

        let resolution = self
            .registry
            .resolve(session_header, &request.kind, context)
            .await?;

        debug!(
            method = %request.method(),
            binding = ?resolution.binding,
            "Protocol message admitted"
        );

        Ok(Admission::Admitted(Admitted {
            request,
            resolution,
        }))
    }

    /// Admit and invoke, waiting for the handler's reply.
    pub async fn dispatch(
        &self,
        http_method: &str,
        session_header: Option<&str>,
        body: &[u8],
        client: &ClientInfo,
        context: HandlerContext,
    ) -> Dispatched {
        let admitted = match self
            .admit(http_method, session_header, body, client, context)
            .await
        {
            Ok(Admission::Admitted(admitted)) => admitted,
            Ok(Admission::Rejected(response)) => return Dispatched::Rejected(response),
            Err(e) => {
                error!(error = %e, "Failed to resolve session handler");
                return Dispatched::Failed;
            }
        };

        let session = admitted.session_id();
        match admitted
            .resolution
            .handler
            .handle(admitted.request.message)
            .await
        {
            Ok(HandlerReply::Response(response)) => Dispatched::Reply { response, session },
            Ok(HandlerReply::Accepted) => Dispatched::Accepted { session },
            Err(e) => {
                error!(error = %e, session = ?session, "Protocol handler failed");
                Dispatched::Failed
            }
        }
    }
}

impl IntoResponse for Dispatched {
    fn into_response(self) -> Response {
        match self {
            Dispatched::Reply { response, session } => {
                with_session((StatusCode::OK, Json(response)).into_response(), session)
            }
            Dispatched::Accepted { session } => {
                with_session(StatusCode::ACCEPTED.into_response(), session)
            }
            Dispatched::Rejected(response) => {
                (StatusCode::BAD_REQUEST, Json(response)).into_response()
            }
            Dispatched::Failed => internal_error_response(),
        }
    }
}

fn internal_error_response() -> Response {
    (StatusCode::OK, Json(JsonRpcResponse::internal_server_error())).into_response()
}

fn with_session(mut response: Response, session: Option<String>) -> Response {
    if let Some(value) = session.and_then(|id| HeaderValue::from_str(&id).ok()) {
        response.headers_mut().insert(SESSION_ID_HEADER, value);
    }
    response
}

fn session_header(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(SESSION_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Handle a JSON-RPC message (POST /mcp)
pub async fn handle_mcp_post(
    State(state): State<AppState>,
    connect: Option<ConnectInfo<SocketAddr>>,
    api_key: Option<Extension<ApiKey>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let client = client_info(&headers, connect.map(|ConnectInfo(addr)| addr));
    let context = HandlerContext {
        api_key: api_key.map(|Extension(ApiKey(key))| key),
    };
    let session = session_header(&headers);

    match state.config.server.response_mode {
        ResponseMode::Json => state
            .dispatcher
            .dispatch(Method::POST.as_str(), session, &body, &client, context)
            .await
            .into_response(),
        ResponseMode::Sse => {
            let admitted = match state
                .dispatcher
                .admit(Method::POST.as_str(), session, &body, &client, context)
                .await
            {
                Ok(Admission::Admitted(admitted)) => admitted,
                Ok(Admission::Rejected(response)) => {
                    return Dispatched::Rejected(response).into_response()
                }
                Err(e) => {
                    error!(error = %e, "Failed to resolve session handler");
                    return internal_error_response();
                }
            };

            let keep_alive = Duration::from_secs(state.config.server.sse_keep_alive_secs.max(1));
            stream_reply(admitted, keep_alive).await
        }
    }
}

/// Reply over SSE. Notifications still get a bare 202.
async fn stream_reply(admitted: Admitted, keep_alive: Duration) -> Response {
    let session = admitted.session_id();
    let Admitted {
        request,
        resolution,
    } = admitted;

    if matches!(request.kind, RequestKind::Notification { .. }) {
        return match resolution.handler.handle(request.message).await {
            Ok(_) => with_session(StatusCode::ACCEPTED.into_response(), session),
            Err(e) => {
                error!(error = %e, "Protocol handler failed");
                internal_error_response()
            }
        };
    }

    let handler = resolution.handler;
    let events = stream::once(reply_event(handler, request.message))
        .filter_map(|event| futures::future::ready(event.map(Ok::<_, Infallible>)));

    with_session(
        Sse::new(events)
            .keep_alive(KeepAlive::new().interval(keep_alive))
            .into_response(),
        session,
    )
}

/// Produce the single `message` event. The stream is already open here, so
/// a failure can only end it.
async fn reply_event(handler: Arc<dyn SessionHandler>, message: JsonRpcRequest) -> Option<Event> {
    match handler.handle(message).await {
        Ok(HandlerReply::Response(response)) => {
            match Event::default().event("message").json_data(&response) {
                Ok(event) => Some(event),
                Err(e) => {
                    error!(error = %e, "Failed to encode SSE reply");
                    None
                }
            }
        }
        Ok(HandlerReply::Accepted) => None,
        Err(e) => {
            error!(error = %e, "Protocol handler failed mid-stream, closing");
            None
        }
    }
}

/// Terminate a session (DELETE /mcp)
pub async fn handle_mcp_delete(
    State(state): State<AppState>,
    connect: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
) -> Result<StatusCode, ApiError> {
    let client = client_info(&headers, connect.map(|ConnectInfo(addr)| addr));
    state
        .dispatcher
        .record_arrival(Method::DELETE.as_str(), &client);

    let id = session_header(&headers)
        .ok_or_else(|| ApiError::BadRequest("Missing Mcp-Session-Id header".to_string()))?;

    if state.dispatcher.registry().remove(id) {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!("Unknown session: {}", id)))
    }
}

/// Server-initiated streams are not offered (GET /mcp)
pub async fn handle_mcp_get(
    State(state): State<AppState>,
    connect: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
) -> Response {
    let client = client_info(&headers, connect.map(|ConnectInfo(addr)| addr));
    state.dispatcher.record_arrival(Method::GET.as_str(), &client);

    (
        StatusCode::METHOD_NOT_ALLOWED,
        [(header::ALLOW, "POST, DELETE")],
    )
        .into_response()
}
