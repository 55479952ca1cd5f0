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

//! Analytics aggregation and persistence.
//!
//! [`AnalyticsStore`] is the single owner of the process-wide
//! [`AnalyticsSnapshot`]. Request handlers record into it, the scheduler in
//! `searchgate-server` persists it, and the REST surface reads derived views
//! ([`AnalyticsSummary`], [`ToolAnalytics`]) out of it.

mod delta;
mod snapshot;
mod store;
mod summary;

pub use delta::AnalyticsDelta;
pub use snapshot::{
    hour_bucket, AnalyticsSnapshot, ClientInfo, Counter, ToolCallRecord,
    DEFAULT_MAX_RECENT_TOOL_CALLS,
};
pub use store::{AnalyticsStore, SNAPSHOT_FILE_NAME};
pub use summary::{
    format_uptime, AnalyticsSummary, HourlyCount, ToolAnalytics, ToolCount, HOURLY_WINDOW,
};
