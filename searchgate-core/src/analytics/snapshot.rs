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

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};

/// Default bound on the recent tool-call history.
pub const DEFAULT_MAX_RECENT_TOOL_CALLS: usize = 100;

/// Keyed counter. Keys appear lazily on first occurrence; `BTreeMap` keeps the
/// persisted JSON and the hourly buckets in sorted order.
pub type Counter = BTreeMap<String, u64>;

/// Who sent a request, as far as the gateway can tell.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClientInfo {
    pub ip: String,
    pub user_agent: String,
}

impl ClientInfo {
    pub const UNKNOWN: &'static str = "unknown";

    pub fn new(ip: impl Into<String>, user_agent: impl Into<String>) -> Self {
        Self {
            ip: ip.into(),
            user_agent: user_agent.into(),
        }
    }
}

impl Default for ClientInfo {
    fn default() -> Self {
        Self::new(Self::UNKNOWN, Self::UNKNOWN)
    }
}

/// One entry of the recent tool-call history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallRecord {
    pub tool: String,
    pub timestamp: DateTime<Utc>,
    pub client_ip: String,
    pub user_agent: String,
}

/// Full durable representation of the analytics counters.
///
/// Field names on the wire are exactly the persisted snapshot layout. Every
/// section except `serverStartTime` may be absent in an older file and
/// defaults to empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsSnapshot {
    #[serde(default = "Utc::now")]
    pub server_start_time: DateTime<Utc>,
    #[serde(default)]
    pub total_requests: u64,
    #[serde(default)]
    pub total_tool_calls: u64,
    #[serde(default)]
    pub requests_by_method: Counter,
    #[serde(default)]
    pub requests_by_endpoint: Counter,
    #[serde(default)]
    pub tool_calls: Counter,
    #[serde(default)]
    pub clients_by_ip: Counter,
    #[serde(default)]
    pub clients_by_user_agent: Counter,
    #[serde(default)]
    pub hourly_requests: Counter,
    /// Newest first.
    #[serde(default)]
    pub recent_tool_calls: VecDeque<ToolCallRecord>,
}

impl AnalyticsSnapshot {
    /// Empty snapshot for a process that started at `server_start_time`.
    pub fn new(server_start_time: DateTime<Utc>) -> Self {
        Self {
            server_start_time,
            total_requests: 0,
            total_tool_calls: 0,
            requests_by_method: Counter::new(),
            requests_by_endpoint: Counter::new(),
            tool_calls: Counter::new(),
            clients_by_ip: Counter::new(),
            clients_by_user_agent: Counter::new(),
            hourly_requests: Counter::new(),
            recent_tool_calls: VecDeque::new(),
        }
    }

    pub(crate) fn apply_request(
        &mut self,
        method: &str,
        endpoint: &str,
        client: &ClientInfo,
        now: DateTime<Utc>,
    ) {
        self.total_requests = self.total_requests.saturating_add(1);
        bump(&mut self.requests_by_method, method);
        bump(&mut self.requests_by_endpoint, endpoint);
        bump(&mut self.clients_by_ip, &client.ip);
        bump(&mut self.clients_by_user_agent, &client.user_agent);
        bump(&mut self.hourly_requests, &hour_bucket(now));
    }

    pub(crate) fn apply_tool_call(
        &mut self,
        tool: &str,
        client: &ClientInfo,
        now: DateTime<Utc>,
        max_recent: usize,
    ) {
        self.total_tool_calls = self.total_tool_calls.saturating_add(1);
        bump(&mut self.tool_calls, tool);
        self.recent_tool_calls.push_front(ToolCallRecord {
            tool: tool.to_string(),
            timestamp: now,
            client_ip: client.ip.clone(),
            user_agent: client.user_agent.clone(),
        });
        self.recent_tool_calls.truncate(max_recent);
    }
}

/// Hour bucket key for `ts`: `YYYY-MM-DDTHH` in UTC, sortable lexicographically.
pub fn hour_bucket(ts: DateTime<Utc>) -> String {
    ts.format("%Y-%m-%dT%H").to_string()
}

pub(crate) fn bump(counter: &mut Counter, key: &str) {
    add(counter, key, 1);
}

pub(crate) fn add(counter: &mut Counter, key: &str, amount: u64) {
    let slot = counter.entry(key.to_string()).or_insert(0);
    *slot = slot.saturating_add(amount);
}
