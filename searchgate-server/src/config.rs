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

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use crate::mcp::tools::ToolDefinition;

/// Searchgate Server Configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub server: HttpServerConfig,
    #[serde(default)]
    pub analytics: AnalyticsConfig,
    #[serde(default)]
    pub sessions: SessionConfig,
    #[serde(default)]
    pub provider: ProviderConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HttpServerConfig {
    /// HTTP listen address (e.g., "127.0.0.1:8080")
    #[serde(default = "default_http_addr")]
    pub listen_addr: String,

    /// Enable CORS
    #[serde(default = "default_enable_cors")]
    pub enable_cors: bool,

    /// How protocol responses are delivered
    #[serde(default)]
    pub response_mode: ResponseMode,

    /// SSE keep-alive interval in seconds
    #[serde(default = "default_sse_keep_alive")]
    pub sse_keep_alive_secs: u64,
}

/// Transport mode for replies on the protocol endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseMode {
    /// One `application/json` body per request
    #[default]
    Json,
    /// A `text/event-stream` carrying the reply as a `message` event
    Sse,
}

impl std::str::FromStr for ResponseMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "sse" => Ok(Self::Sse),
            other => anyhow::bail!("Unknown response mode '{}' (expected json or sse)", other),
        }
    }
}

impl ResponseMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Json => "streamable-http+json",
            Self::Sse => "streamable-http+sse",
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AnalyticsConfig {
    /// Directory holding analytics.json
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Seconds between periodic snapshot flushes
    #[serde(default = "default_flush_interval")]
    pub flush_interval_secs: u64,

    /// Bound on the recent tool-call history
    #[serde(default = "default_max_recent_events")]
    pub max_recent_events: usize,

    /// Shared secret required by POST /analytics/import (unset = open)
    #[serde(default)]
    pub import_secret: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SessionConfig {
    /// Evict sessions idle for this many seconds (0 = never)
    #[serde(default = "default_session_idle_timeout")]
    pub idle_timeout_secs: u64,

    /// Maximum live sessions, least recently used evicted first (0 = unbounded)
    #[serde(default = "default_max_sessions")]
    pub max_sessions: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProviderConfig {
    /// Fallback API key when the client supplies none
    #[serde(default)]
    pub api_key: Option<String>,

    /// Upstream URL tool calls are forwarded to
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Upstream request timeout in seconds
    #[serde(default = "default_provider_timeout")]
    pub timeout_secs: u64,

    /// Tools advertised through tools/list
    #[serde(default)]
    pub tools: Vec<ToolDefinition>,
}

// Default values
fn default_http_addr() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_enable_cors() -> bool {
    true
}

fn default_sse_keep_alive() -> u64 {
    15
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./searchgate-data")
}

fn default_flush_interval() -> u64 {
    60
}

fn default_max_recent_events() -> usize {
    searchgate_core::DEFAULT_MAX_RECENT_TOOL_CALLS
}

fn default_session_idle_timeout() -> u64 {
    3600
}

fn default_max_sessions() -> u64 {
    10_000
}

fn default_provider_timeout() -> u64 {
    30
}

impl Default for HttpServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_http_addr(),
            enable_cors: default_enable_cors(),
            response_mode: ResponseMode::default(),
            sse_keep_alive_secs: default_sse_keep_alive(),
        }
    }
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            flush_interval_secs: default_flush_interval(),
            max_recent_events: default_max_recent_events(),
            import_secret: None,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_timeout_secs: default_session_idle_timeout(),
            max_sessions: default_max_sessions(),
        }
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            endpoint: None,
            timeout_secs: default_provider_timeout(),
            tools: Vec::new(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            server: HttpServerConfig::default(),
            analytics: AnalyticsConfig::default(),
            sessions: SessionConfig::default(),
            provider: ProviderConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Apply environment variable overrides onto `self`.
    ///
    /// Supported environment variables:
    /// - SEARCHGATE_HTTP_ADDR: HTTP listen address (default: 127.0.0.1:8080)
    /// - SEARCHGATE_ENABLE_CORS: Enable CORS (default: true)
    /// - SEARCHGATE_RESPONSE_MODE: json | sse (default: json)
    /// - SEARCHGATE_DATA_DIR: Analytics directory (default: ./searchgate-data)
    /// - SEARCHGATE_FLUSH_INTERVAL: Seconds between flushes (default: 60)
    /// - SEARCHGATE_MAX_RECENT_EVENTS: Recent tool-call bound (default: 100)
    /// - SEARCHGATE_IMPORT_SECRET: Shared secret for analytics import
    /// - SEARCHGATE_SESSION_IDLE_TIMEOUT: Session idle eviction in seconds (default: 3600)
    /// - SEARCHGATE_MAX_SESSIONS: Live session bound (default: 10000)
    /// - SEARCHGATE_API_KEY: Fallback provider API key
    /// - SEARCHGATE_PROVIDER_URL: Upstream tool endpoint
    pub fn apply_env(mut self) -> Self {
        self.apply_vars(|name| std::env::var(name).ok());
        self
    }

    fn apply_vars(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(addr) = var("SEARCHGATE_HTTP_ADDR") {
            self.server.listen_addr = addr;
        }
        if let Some(cors) = var("SEARCHGATE_ENABLE_CORS") {
            self.server.enable_cors = cors.parse().unwrap_or(true);
        }
        if let Some(mode) = var("SEARCHGATE_RESPONSE_MODE") {
            match mode.parse() {
                Ok(mode) => self.server.response_mode = mode,
                Err(e) => tracing::warn!("Ignoring SEARCHGATE_RESPONSE_MODE: {}", e),
            }
        }

        if let Some(data_dir) = var("SEARCHGATE_DATA_DIR") {
            self.analytics.data_dir = PathBuf::from(data_dir);
        }
        if let Some(val) = var("SEARCHGATE_FLUSH_INTERVAL").and_then(|v| v.parse().ok()) {
            self.analytics.flush_interval_secs = val;
        }
        if let Some(val) = var("SEARCHGATE_MAX_RECENT_EVENTS").and_then(|v| v.parse().ok()) {
            self.analytics.max_recent_events = val;
        }
        if let Some(secret) = var("SEARCHGATE_IMPORT_SECRET") {
            self.analytics.import_secret = Some(secret).filter(|s| !s.is_empty());
        }

        if let Some(val) = var("SEARCHGATE_SESSION_IDLE_TIMEOUT").and_then(|v| v.parse().ok()) {
            self.sessions.idle_timeout_secs = val;
        }
        if let Some(val) = var("SEARCHGATE_MAX_SESSIONS").and_then(|v| v.parse().ok()) {
            self.sessions.max_sessions = val;
        }

        if let Some(key) = var("SEARCHGATE_API_KEY") {
            self.provider.api_key = Some(key).filter(|s| !s.is_empty());
        }
        if let Some(url) = var("SEARCHGATE_PROVIDER_URL") {
            self.provider.endpoint = Some(url).filter(|s| !s.is_empty());
        }
    }

    /// Load configuration with priority: env > file > defaults
    pub fn load(config_file: Option<PathBuf>) -> Result<Self> {
        let config = if let Some(path) = config_file {
            if path.exists() {
                tracing::info!("Loading configuration from file: {:?}", path);
                Self::from_file(&path)?
            } else {
                tracing::warn!("Config file not found: {:?}, using defaults", path);
                Self::default()
            }
        } else {
            Self::default()
        };

        Ok(config.apply_env())
    }

    /// Parse listen address as SocketAddr
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        Ok(self.server.listen_addr.parse()?)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        self.socket_addr()?;

        if self.analytics.flush_interval_secs == 0 {
            anyhow::bail!("analytics.flush_interval_secs must be greater than zero");
        }
        if self.analytics.max_recent_events == 0 {
            anyhow::bail!("analytics.max_recent_events must be greater than zero");
        }

        if !self.analytics.data_dir.exists() {
            std::fs::create_dir_all(&self.analytics.data_dir)?;
        }

        Ok(())
    }
}
