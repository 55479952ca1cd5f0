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

//! searchgate server
//!
//! An MCP gateway: streamable-HTTP sessions in front of an upstream tool
//! provider, with request analytics persisted across restarts.

pub mod api;
pub mod auth;
pub mod config;
pub mod mcp;
pub mod scheduler;

use anyhow::Result;
use axum::{
    http::HeaderName,
    middleware as axum_middleware,
    routing::{any, get, post},
    Router,
};
use searchgate_core::AnalyticsStore;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api::{
    get_analytics, get_dashboard, get_tool_analytics, health_check, import_analytics, ping,
    server_info, track_requests, AppState, IMPORT_PATH,
};
use config::ServerConfig;
use mcp::{mcp_router, HttpToolProvider, McpHandlerFactory, SESSION_ID_HEADER};
use scheduler::AnalyticsScheduler;

/// Assemble the full HTTP application for `state`.
pub fn build_router(state: AppState) -> Router {
    let rest = Router::new()
        .route("/", get(server_info))
        .route("/health", get(health_check))
        .route("/ping", any(ping))
        .route("/analytics", get(get_analytics))
        .route("/analytics/tools", get(get_tool_analytics))
        .route("/analytics/dashboard", get(get_dashboard))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            track_requests,
        ))
        .route(IMPORT_PATH, post(import_analytics));

    let cors = if state.config.server.enable_cors {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
            .expose_headers([HeaderName::from_static(SESSION_ID_HEADER)])
    } else {
        CorsLayer::new()
    };

    Router::new()
        .merge(rest)
        .merge(mcp_router(state.clone()))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

pub async fn run_server(config: ServerConfig) -> Result<()> {
    // Initialize tracing
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "searchgate_server=info,searchgate_core=info,tower_http=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init();

    tracing::info!("Starting searchgate {}", env!("CARGO_PKG_VERSION"));

    // Validate configuration
    config.validate()?;
    let addr = config.socket_addr()?;

    tracing::info!(
        listen_addr = %addr,
        transport = config.server.response_mode.as_str(),
        data_dir = %config.analytics.data_dir.display(),
        flush_interval_secs = config.analytics.flush_interval_secs,
        tools = config.provider.tools.len(),
        provider_configured = config.provider.endpoint.is_some(),
        "Configuration loaded"
    );

    let store = Arc::new(AnalyticsStore::open_in_dir(
        &config.analytics.data_dir,
        config.analytics.max_recent_events,
    ));
    let provider = Arc::new(HttpToolProvider::new(&config.provider)?);
    let factory = Arc::new(McpHandlerFactory::new(provider));

    let scheduler = AnalyticsScheduler::spawn(
        store.clone(),
        Duration::from_secs(config.analytics.flush_interval_secs),
    );

    let app = build_router(AppState::new(config, store, factory));

    let shutdown_token = CancellationToken::new();
    tokio::spawn(cancel_on_signal(shutdown_token.clone()));

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Listening on http://{}", addr);

    let served = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        shutdown_token.cancelled().await;
        tracing::info!("HTTP server received shutdown signal");
    })
    .await;

    if let Err(e) = &served {
        tracing::error!("HTTP server error: {}", e);
    }

    // Persist failures are already logged by the scheduler.
    let _ = scheduler.shutdown().await;
    tracing::info!("Shutdown complete");

    served?;
    Ok(())
}

/// Cancel `token` on SIGINT or SIGTERM.
async fn cancel_on_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received SIGINT"),
        _ = terminate => tracing::info!("Received SIGTERM"),
    }

    token.cancel();
}
