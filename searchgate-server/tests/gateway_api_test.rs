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

//! End-to-end tests against the assembled router.

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    response::Response,
    Router,
};
use searchgate_core::AnalyticsStore;
use searchgate_server::{
    api::AppState,
    build_router,
    config::{ResponseMode, ServerConfig},
    mcp::{
        protocol::{CallToolResult, Tool},
        HandlerError, McpHandlerFactory, ToolProvider,
    },
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

struct StaticProvider;

#[async_trait]
impl ToolProvider for StaticProvider {
    fn tools(&self) -> Vec<Tool> {
        vec![Tool {
            name: "search".to_string(),
            description: Some("Web search".to_string()),
            input_schema: json!({"type": "object"}),
        }]
    }

    async fn call(
        &self,
        name: &str,
        _arguments: HashMap<String, Value>,
        _api_key: Option<&str>,
    ) -> Result<CallToolResult, HandlerError> {
        Ok(CallToolResult::text(format!("results for {}", name)))
    }
}

struct Gateway {
    _dir: TempDir,
    state: AppState,
    router: Router,
}

impl Gateway {
    fn new(configure: impl FnOnce(&mut ServerConfig)) -> Self {
        let dir = TempDir::new().unwrap();
        let mut config = ServerConfig::default();
        config.analytics.data_dir = dir.path().to_path_buf();
        configure(&mut config);

        let store = Arc::new(AnalyticsStore::open_in_dir(
            &config.analytics.data_dir,
            config.analytics.max_recent_events,
        ));
        let factory = Arc::new(McpHandlerFactory::new(Arc::new(StaticProvider)));
        let state = AppState::new(config, store, factory);
        let router = build_router(state.clone());

        Self {
            _dir: dir,
            state,
            router,
        }
    }

    async fn send(&self, request: Request<Body>) -> Response {
        self.router.clone().oneshot(request).await.unwrap()
    }

    async fn mcp(&self, session: Option<&str>, body: Value) -> Response {
        let mut builder = Request::builder()
            .method("POST")
            .uri("/mcp?apiKey=test-key")
            .header("content-type", "application/json")
            .header("x-forwarded-for", "198.51.100.4")
            .header("user-agent", "it-client/1.0");
        if let Some(id) = session {
            builder = builder.header("mcp-session-id", id);
        }
        self.send(builder.body(Body::from(body.to_string())).unwrap())
            .await
    }

    async fn get_json(&self, uri: &str) -> Value {
        let response = self
            .send(
                Request::builder()
                    .uri(uri)
                    .header("x-forwarded-for", "198.51.100.4")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        body_json(response).await
    }
}

async fn body_json(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_text(response: Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn session_id(response: &Response) -> Option<String> {
    response
        .headers()
        .get("mcp-session-id")
        .map(|v| v.to_str().unwrap().to_string())
}

fn initialize() -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": 1,
        "method": "initialize",
        "params": {
            "protocolVersion": "2025-03-26",
            "capabilities": {},
            "clientInfo": {"name": "it", "version": "1.0"}
        }
    })
}

fn call_search(id: i64) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": "tools/call",
        "params": {"name": "search", "arguments": {"query": "rust"}}
    })
}

#[tokio::test]
async fn first_request_is_counted_in_summary() {
    let gateway = Gateway::new(|_| {});

    let summary = gateway.get_json("/analytics").await;

    assert_eq!(summary["totalRequests"], 1);
    assert_eq!(summary["uniqueClients"], 1);
    assert_eq!(summary["uptime"], "0m");
    assert_eq!(summary["requestsByMethod"]["GET"], 1);
    assert_eq!(summary["requestsByEndpoint"]["/analytics"], 1);
}

#[tokio::test]
async fn health_info_and_ping() {
    let gateway = Gateway::new(|_| {});

    let health = gateway.get_json("/health").await;
    assert_eq!(health["status"], "ok");
    assert_eq!(health["transport"], "streamable-http+json");

    let info = gateway.get_json("/").await;
    assert_eq!(info["name"], "searchgate");
    assert_eq!(info["endpoints"]["mcp"], "/mcp");
    assert_eq!(info["protocolVersion"], "2025-03-26");
    assert!(info.get("protocol_version").is_none());

    let pong = gateway
        .send(
            Request::builder()
                .method("DELETE")
                .uri("/ping")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(pong.status(), StatusCode::OK);
    assert_eq!(body_text(pong).await, "pong");

    assert_eq!(gateway.state.store.snapshot().total_requests, 3);
}

#[tokio::test]
async fn missing_api_key_is_rejected() {
    let gateway = Gateway::new(|_| {});

    let response = gateway
        .send(
            Request::builder()
                .method("POST")
                .uri("/mcp")
                .header("content-type", "application/json")
                .body(Body::from(initialize().to_string()))
                .unwrap(),
        )
        .await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], -32001);
    assert!(body["id"].is_null());
    assert_eq!(gateway.state.sessions().len(), 0);
}

#[tokio::test]
async fn configured_api_key_is_used_as_fallback() {
    let gateway = Gateway::new(|config| config.provider.api_key = Some("env-key".to_string()));

    let response = gateway
        .send(
            Request::builder()
                .method("POST")
                .uri("/mcp")
                .header("content-type", "application/json")
                .body(Body::from(initialize().to_string()))
                .unwrap(),
        )
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(session_id(&response).is_some());
}

#[tokio::test]
async fn discovery_without_session_creates_nothing() {
    let gateway = Gateway::new(|_| {});

    let response = gateway
        .mcp(None, json!({"jsonrpc": "2.0", "id": 7, "method": "tools/list"}))
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(session_id(&response).is_none());
    let body = body_json(response).await;
    assert_eq!(body["id"], 7);
    assert_eq!(body["result"]["tools"][0]["name"], "search");
    assert_eq!(gateway.state.sessions().len(), 0);
}

#[tokio::test]
async fn session_lifecycle() {
    let gateway = Gateway::new(|_| {});

    let response = gateway.mcp(None, initialize()).await;
    assert_eq!(response.status(), StatusCode::OK);
    let session = session_id(&response).expect("session header");
    let body = body_json(response).await;
    assert_eq!(body["result"]["serverInfo"]["name"], "searchgate");
    assert_eq!(gateway.state.sessions().len(), 1);

    let ack = gateway
        .mcp(
            Some(&session),
            json!({"jsonrpc": "2.0", "method": "notifications/initialized"}),
        )
        .await;
    assert_eq!(ack.status(), StatusCode::ACCEPTED);
    assert_eq!(session_id(&ack).as_deref(), Some(session.as_str()));

    let call = gateway.mcp(Some(&session), call_search(2)).await;
    assert_eq!(session_id(&call).as_deref(), Some(session.as_str()));
    let body = body_json(call).await;
    assert_eq!(body["result"]["content"][0]["text"], "results for search");
    assert_eq!(gateway.state.sessions().len(), 1);

    let delete = || {
        Request::builder()
            .method("DELETE")
            .uri("/mcp?apiKey=test-key")
            .header("mcp-session-id", session.as_str())
            .body(Body::empty())
            .unwrap()
    };
    assert_eq!(gateway.send(delete()).await.status(), StatusCode::NO_CONTENT);
    assert_eq!(gateway.send(delete()).await.status(), StatusCode::NOT_FOUND);
    assert_eq!(gateway.state.sessions().len(), 0);
}

#[tokio::test]
async fn unknown_session_header_starts_new_session() {
    let gateway = Gateway::new(|_| {});

    let response = gateway.mcp(Some("does-not-exist"), call_search(3)).await;

    assert_eq!(response.status(), StatusCode::OK);
    let issued = session_id(&response).expect("session header");
    assert_ne!(issued, "does-not-exist");
    assert_eq!(gateway.state.sessions().len(), 1);
}

#[tokio::test]
async fn malformed_message_is_counted_and_rejected() {
    let gateway = Gateway::new(|_| {});

    let response = gateway
        .send(
            Request::builder()
                .method("POST")
                .uri("/mcp?apiKey=test-key")
                .body(Body::from("{oops"))
                .unwrap(),
        )
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], -32700);
    assert!(body["id"].is_null());

    let snapshot = gateway.state.store.snapshot();
    assert_eq!(snapshot.total_requests, 1);
    assert_eq!(snapshot.requests_by_endpoint.get("/mcp"), Some(&1));
}

#[tokio::test]
async fn tool_calls_are_tracked() {
    let gateway = Gateway::new(|_| {});

    for id in 0..3 {
        gateway.mcp(None, call_search(id)).await;
    }

    let tools = gateway.get_json("/analytics/tools").await;
    assert_eq!(tools["totalToolCalls"], 3);
    assert_eq!(tools["tools"][0], json!({"tool": "search", "count": 3}));
    assert_eq!(tools["recentCalls"].as_array().unwrap().len(), 3);
    assert_eq!(tools["recentCalls"][0]["clientIp"], "198.51.100.4");
    assert_eq!(tools["recentCalls"][0]["userAgent"], "it-client/1.0");
}

#[tokio::test]
async fn import_adds_to_existing_counts() {
    let gateway = Gateway::new(|config| {
        config.analytics.import_secret = Some("s3cret".to_string())
    });
    for id in 0..3 {
        gateway.mcp(None, call_search(id)).await;
    }

    let response = gateway
        .send(
            Request::builder()
                .method("POST")
                .uri("/analytics/import?key=s3cret")
                .header("content-type", "application/json")
                .body(Body::from(json!({"byTool": {"search": 5}}).to_string()))
                .unwrap(),
        )
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["merged"], json!(["byTool"]));
    assert_eq!(body["persisted"], true);

    let snapshot = gateway.state.store.snapshot();
    assert_eq!(snapshot.tool_calls.get("search"), Some(&8));
    assert_eq!(snapshot.requests_by_endpoint.get("/analytics/import"), Some(&1));
    assert!(gateway.state.store.storage_path().exists());
}

#[tokio::test]
async fn import_with_wrong_key_changes_nothing() {
    let gateway = Gateway::new(|config| {
        config.analytics.import_secret = Some("s3cret".to_string())
    });
    gateway.mcp(None, call_search(1)).await;
    let before = gateway.state.store.snapshot();

    for uri in ["/analytics/import?key=guess", "/analytics/import"] {
        let response = gateway
            .send(
                Request::builder()
                    .method("POST")
                    .uri(uri)
                    .body(Body::from(json!({"byTool": {"search": 5}}).to_string()))
                    .unwrap(),
            )
            .await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    let after = gateway.state.store.snapshot();
    assert_eq!(after, before);
    assert!(!after.requests_by_endpoint.contains_key("/analytics/import"));
}

#[tokio::test]
async fn import_with_bad_section_is_rejected_whole() {
    let gateway = Gateway::new(|_| {});

    let response = gateway
        .send(
            Request::builder()
                .method("POST")
                .uri("/analytics/import")
                .body(Body::from(
                    json!({"byTool": {"search": 5}, "hourly": "not a map"}).to_string(),
                ))
                .unwrap(),
        )
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body_json(response).await["error"].is_string());
    assert!(gateway.state.store.snapshot().tool_calls.is_empty());
}

#[tokio::test]
async fn sse_mode_streams_single_message() {
    let gateway = Gateway::new(|config| config.server.response_mode = ResponseMode::Sse);

    let response = gateway.mcp(None, initialize()).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(session_id(&response).is_some());
    assert_eq!(
        response.headers().get("content-type").unwrap(),
        "text/event-stream"
    );
    let text = body_text(response).await;
    assert!(text.contains("event: message"));
    assert!(text.contains("\"protocolVersion\":\"2025-03-26\""));
}

#[tokio::test]
async fn dashboard_renders() {
    let gateway = Gateway::new(|_| {});
    gateway.mcp(None, call_search(1)).await;

    let response = gateway
        .send(
            Request::builder()
                .uri("/analytics/dashboard")
                .body(Body::empty())
                .unwrap(),
        )
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let html = body_text(response).await;
    assert!(html.contains("searchgate analytics"));
    assert!(html.contains("search"));
}
