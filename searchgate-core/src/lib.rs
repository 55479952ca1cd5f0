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

//! Searchgate Core
//!
//! Usage analytics for the searchgate MCP gateway: request and tool-call
//! counters, the bounded recent-call history, and the JSON snapshot they are
//! persisted to between process restarts.

pub mod analytics;
pub mod error;

pub use analytics::{
    format_uptime, hour_bucket, AnalyticsDelta, AnalyticsSnapshot, AnalyticsStore,
    AnalyticsSummary, ClientInfo, Counter, HourlyCount, ToolAnalytics, ToolCallRecord, ToolCount,
    DEFAULT_MAX_RECENT_TOOL_CALLS, HOURLY_WINDOW, SNAPSHOT_FILE_NAME,
};
pub use error::{AnalyticsError, Result};
