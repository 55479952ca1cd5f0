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

//! HTML analytics dashboard.

use axum::{extract::State, response::Html};
use chrono::Utc;
use searchgate_core::{AnalyticsSummary, ToolAnalytics};
use std::fmt::Write;

use crate::api::AppState;

const RECENT_ROWS: usize = 20;
const BAR_MAX_WIDTH: u64 = 300;

/// GET /analytics/dashboard
pub async fn get_dashboard(State(state): State<AppState>) -> Html<String> {
    let summary = state.store.summarize(Utc::now());
    let tools = state.store.tool_analytics(RECENT_ROWS);
    Html(render_dashboard(&summary, &tools))
}

pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

pub fn render_dashboard(summary: &AnalyticsSummary, tools: &ToolAnalytics) -> String {
    let mut html = String::with_capacity(4096);
    html.push_str(concat!(
        "<!DOCTYPE html><html><head><meta charset=\"utf-8\">",
        "<title>searchgate analytics</title><style>",
        "body{font-family:system-ui,sans-serif;margin:2rem;color:#222}",
        ".cards{display:flex;gap:1rem;flex-wrap:wrap}",
        ".card{border:1px solid #ddd;border-radius:8px;padding:1rem;min-width:10rem}",
        ".card b{display:block;font-size:1.6rem}",
        "table{border-collapse:collapse;margin-top:1rem}",
        "td,th{border-bottom:1px solid #eee;padding:.3rem .8rem;text-align:left}",
        ".bar{background:#4a7bd0;height:.8rem}",
        "</style></head><body><h1>searchgate analytics</h1>",
    ));

    // Writing into a String cannot fail.
    let _ = write!(
        html,
        "<div class=\"cards\">\
         <div class=\"card\">Uptime<b>{}</b></div>\
         <div class=\"card\">Requests<b>{}</b></div>\
         <div class=\"card\">Tool calls<b>{}</b></div>\
         <div class=\"card\">Unique clients<b>{}</b></div></div>",
        escape_html(&summary.uptime),
        summary.total_requests,
        summary.total_tool_calls,
        summary.unique_clients,
    );

    html.push_str("<h2>Top tools</h2><table><tr><th>Tool</th><th>Calls</th></tr>");
    for entry in &summary.top_tools {
        let _ = write!(
            html,
            "<tr><td>{}</td><td>{}</td></tr>",
            escape_html(&entry.tool),
            entry.count
        );
    }
    html.push_str("</table>");

    let peak = summary
        .hourly_requests
        .iter()
        .map(|h| h.count)
        .max()
        .unwrap_or(0)
        .max(1);
    html.push_str("<h2>Requests per hour (UTC)</h2><table>");
    for bucket in &summary.hourly_requests {
        let width = bar_width(bucket.count, peak);
        let _ = write!(
            html,
            "<tr><td>{}</td><td><div class=\"bar\" style=\"width:{}px\"></div></td><td>{}</td></tr>",
            escape_html(&bucket.hour),
            width,
            bucket.count
        );
    }
    html.push_str("</table>");

    html.push_str(
        "<h2>Recent tool calls</h2><table>\
         <tr><th>Time</th><th>Tool</th><th>Client</th><th>User agent</th></tr>",
    );
    for call in &tools.recent_calls {
        let _ = write!(
            html,
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
            call.timestamp.format("%Y-%m-%d %H:%M:%S"),
            escape_html(&call.tool),
            escape_html(&call.client_ip),
            escape_html(&call.user_agent),
        );
    }
    html.push_str("</table></body></html>");

    html
}

/// Pixel width of an hourly bar, scaled against the busiest hour.
fn bar_width(count: u64, peak: u64) -> u64 {
    let scaled = u128::from(count) * u128::from(BAR_MAX_WIDTH) / u128::from(peak.max(1));
    u64::try_from(scaled).unwrap_or(BAR_MAX_WIDTH)
}
