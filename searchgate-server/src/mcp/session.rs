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

//! Session registry.
//!
//! Maps `Mcp-Session-Id` values to live handlers. Entries are evicted after
//! an idle period or when the registry reaches its capacity bound; either
//! policy can be turned off by setting it to zero.

use moka::notification::RemovalCause;
use moka::policy::EvictionPolicy;
use moka::sync::Cache;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::handler::{HandlerContext, HandlerError, HandlerFactory, SessionHandler};
use super::request::RequestKind;
use crate::config::SessionConfig;

/// How a resolved handler relates to the session map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionBinding {
    /// Existing session looked up by header
    Resumed(String),
    /// New session registered under a fresh id
    Created(String),
    /// One-shot discovery handler, never registered
    Ephemeral,
}

impl SessionBinding {
    pub fn session_id(&self) -> Option<&str> {
        match self {
            Self::Resumed(id) | Self::Created(id) => Some(id),
            Self::Ephemeral => None,
        }
    }
}

pub struct Resolution {
    pub handler: Arc<dyn SessionHandler>,
    pub binding: SessionBinding,
}

pub struct SessionRegistry {
    sessions: Cache<String, Arc<dyn SessionHandler>>,
    factory: Arc<dyn HandlerFactory>,
}

impl SessionRegistry {
    pub fn new(factory: Arc<dyn HandlerFactory>, config: &SessionConfig) -> Self {
        let mut builder = Cache::builder().eviction_listener(
            |id: Arc<String>, _handler: Arc<dyn SessionHandler>, cause: RemovalCause| {
                if cause.was_evicted() {
                    info!(session = %id, ?cause, "Session evicted");
                }
            },
        );
        if config.max_sessions > 0 {
            builder = builder
                .max_capacity(config.max_sessions)
                .eviction_policy(EvictionPolicy::lru());
        }
        if config.idle_timeout_secs > 0 {
            builder = builder.time_to_idle(Duration::from_secs(config.idle_timeout_secs));
        }

        Self {
            sessions: builder.build(),
            factory,
        }
    }

    /// Find or create the handler for one inbound message.
    ///
    /// A known header resumes its session. With no header, discovery gets an
    /// unregistered one-shot handler. Everything else, including an unknown
    /// header, starts a new session.
    pub async fn resolve(
        &self,
        session_header: Option<&str>,
        kind: &RequestKind,
        context: HandlerContext,
    ) -> Result<Resolution, HandlerError> {
        if let Some(id) = session_header {
            if let Some(handler) = self.sessions.get(id) {
                return Ok(Resolution {
                    handler,
                    binding: SessionBinding::Resumed(id.to_string()),
                });
            }
            warn!(session = %id, "Unknown session id, starting a new session");
        } else if kind.is_discovery() {
            let handler = self.factory.create(context);
            handler.connect(None).await?;
            debug!("Serving discovery request without a session");
            return Ok(Resolution {
                handler,
                binding: SessionBinding::Ephemeral,
            });
        }

        let id = Uuid::new_v4().to_string();
        let handler = self.factory.create(context);
        handler.connect(Some(&id)).await?;
        self.sessions.insert(id.clone(), handler.clone());
        info!(session = %id, "Session created");

        Ok(Resolution {
            handler,
            binding: SessionBinding::Created(id),
        })
    }

    /// Drop a session. Returns false if it was not registered.
    pub fn remove(&self, session_id: &str) -> bool {
        let removed = self.sessions.remove(session_id).is_some();
        if removed {
            info!(session = %session_id, "Session closed");
        }
        removed
    }

    pub fn contains(&self, session_id: &str) -> bool {
        self.sessions.contains_key(session_id)
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        self.sessions.run_pending_tasks();
        self.sessions.entry_count() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
