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
use serde::Serialize;
use std::collections::BTreeMap;

use super::snapshot::{AnalyticsSnapshot, Counter, ToolCallRecord};

/// Number of hourly buckets reported by the summary.
pub const HOURLY_WINDOW: usize = 24;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolCount {
    pub tool: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HourlyCount {
    pub hour: String,
    pub count: u64,
}

/// Read-only view served by `GET /analytics`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsSummary {
    pub server_start_time: DateTime<Utc>,
    pub uptime: String,
    pub total_requests: u64,
    pub total_tool_calls: u64,
    pub unique_clients: usize,
    pub requests_by_method: BTreeMap<String, u64>,
    pub requests_by_endpoint: BTreeMap<String, u64>,
    pub clients_by_user_agent: BTreeMap<String, u64>,
    pub top_tools: Vec<ToolCount>,
    pub hourly_requests: Vec<HourlyCount>,
}

/// Read-only view served by `GET /analytics/tools`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolAnalytics {
    pub total_tool_calls: u64,
    pub tools: Vec<ToolCount>,
    pub recent_calls: Vec<ToolCallRecord>,
}

impl AnalyticsSummary {
    pub(crate) fn from_snapshot(snapshot: &AnalyticsSnapshot, now: DateTime<Utc>) -> Self {
        Self {
            server_start_time: snapshot.server_start_time,
            uptime: format_uptime(snapshot.server_start_time, now),
            total_requests: snapshot.total_requests,
            total_tool_calls: snapshot.total_tool_calls,
            unique_clients: snapshot.clients_by_ip.len(),
            requests_by_method: snapshot.requests_by_method.clone(),
            requests_by_endpoint: snapshot.requests_by_endpoint.clone(),
            clients_by_user_agent: snapshot.clients_by_user_agent.clone(),
            top_tools: ranked_tools(&snapshot.tool_calls),
            hourly_requests: latest_hours(&snapshot.hourly_requests, HOURLY_WINDOW),
        }
    }
}

impl ToolAnalytics {
    pub(crate) fn from_snapshot(snapshot: &AnalyticsSnapshot, recent_limit: usize) -> Self {
        Self {
            total_tool_calls: snapshot.total_tool_calls,
            tools: ranked_tools(&snapshot.tool_calls),
            recent_calls: snapshot
                .recent_tool_calls
                .iter()
                .take(recent_limit)
                .cloned()
                .collect(),
        }
    }
}

/// Human-readable time since `start`: `"2d 3h 4m"`, `"3h 4m"` or `"4m"`.
pub fn format_uptime(start: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let minutes_total = (now - start).num_minutes().max(0);
    let days = minutes_total / (24 * 60);
    let hours = (minutes_total / 60) % 24;
    let minutes = minutes_total % 60;

    if days > 0 {
        format!("{}d {}h {}m", days, hours, minutes)
    } else if hours > 0 {
        format!("{}h {}m", hours, minutes)
    } else {
        format!("{}m", minutes)
    }
}

/// Tools by descending count; equal counts fall back to name order.
fn ranked_tools(counter: &Counter) -> Vec<ToolCount> {
    let mut tools: Vec<ToolCount> = counter
        .iter()
        .map(|(tool, count)| ToolCount {
            tool: tool.clone(),
            count: *count,
        })
        .collect();
    tools.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.tool.cmp(&b.tool)));
    tools
}

/// The most recent `window` buckets, oldest first.
fn latest_hours(counter: &Counter, window: usize) -> Vec<HourlyCount> {
    let skip = counter.len().saturating_sub(window);
    counter
        .iter()
        .skip(skip)
        .map(|(hour, count)| HourlyCount {
            hour: hour.clone(),
            count: *count,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_format_uptime() {
        assert_eq!(format_uptime(start(), start()), "0m");
        assert_eq!(format_uptime(start(), start() + Duration::seconds(59)), "0m");
        assert_eq!(format_uptime(start(), start() + Duration::minutes(61)), "1h 1m");
        assert_eq!(
            format_uptime(start(), start() + Duration::minutes(2 * 1440 + 3 * 60 + 4)),
            "2d 3h 4m"
        );
        // clock skew never produces a negative uptime
        assert_eq!(format_uptime(start(), start() - Duration::hours(1)), "0m");
    }

    #[test]
    fn test_ranked_tools_order() {
        let counter = Counter::from([
            ("b".to_string(), 2),
            ("a".to_string(), 2),
            ("c".to_string(), 9),
        ]);
        let names: Vec<_> = ranked_tools(&counter).into_iter().map(|t| t.tool).collect();
        assert_eq!(names, vec!["c", "a", "b"]);
    }

    #[test]
    fn test_latest_hours_keeps_last_window_ascending() {
        let counter: Counter = (0..30)
            .map(|h| (format!("2025-01-{:02}T00", h + 1), h as u64))
            .collect();

        let hours = latest_hours(&counter, HOURLY_WINDOW);
        assert_eq!(hours.len(), HOURLY_WINDOW);
        assert_eq!(hours.first().unwrap().hour, "2025-01-07T00");
        assert_eq!(hours.last().unwrap().hour, "2025-01-30T00");
    }
}
