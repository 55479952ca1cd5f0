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

use serde::{Deserialize, Serialize};

use super::snapshot::{add, AnalyticsSnapshot, Counter};

/// Externally supplied aggregate counts, used to restore a backup into a
/// running gateway.
///
/// Every section is optional. Present sections are added key-wise onto the
/// live counters; absent sections are skipped. The recent-call history is
/// never touched by a merge.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsDelta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_requests: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_tool_calls: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub by_method: Option<Counter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub by_endpoint: Option<Counter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub by_tool: Option<Counter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub by_client_ip: Option<Counter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub by_user_agent: Option<Counter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hourly: Option<Counter>,
}

impl AnalyticsDelta {
    pub fn is_empty(&self) -> bool {
        self.sections().is_empty()
    }

    /// Wire names of the sections present in this delta.
    pub fn sections(&self) -> Vec<&'static str> {
        let mut present = Vec::new();
        if self.total_requests.is_some() {
            present.push("totalRequests");
        }
        if self.total_tool_calls.is_some() {
            present.push("totalToolCalls");
        }
        let counters = [
            ("byMethod", &self.by_method),
            ("byEndpoint", &self.by_endpoint),
            ("byTool", &self.by_tool),
            ("byClientIp", &self.by_client_ip),
            ("byUserAgent", &self.by_user_agent),
            ("hourly", &self.hourly),
        ];
        for (name, section) in counters {
            if section.is_some() {
                present.push(name);
            }
        }
        present
    }

    pub(crate) fn apply_to(&self, snapshot: &mut AnalyticsSnapshot) {
        if let Some(n) = self.total_requests {
            snapshot.total_requests = snapshot.total_requests.saturating_add(n);
        }
        if let Some(n) = self.total_tool_calls {
            snapshot.total_tool_calls = snapshot.total_tool_calls.saturating_add(n);
        }
        merge_counter(&mut snapshot.requests_by_method, self.by_method.as_ref());
        merge_counter(&mut snapshot.requests_by_endpoint, self.by_endpoint.as_ref());
        merge_counter(&mut snapshot.tool_calls, self.by_tool.as_ref());
        merge_counter(&mut snapshot.clients_by_ip, self.by_client_ip.as_ref());
        merge_counter(&mut snapshot.clients_by_user_agent, self.by_user_agent.as_ref());
        merge_counter(&mut snapshot.hourly_requests, self.hourly.as_ref());
    }
}

fn merge_counter(target: &mut Counter, source: Option<&Counter>) {
    let Some(source) = source else {
        return;
    };
    for (key, amount) in source {
        add(target, key, *amount);
    }
}
