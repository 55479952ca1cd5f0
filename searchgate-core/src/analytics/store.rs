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
use parking_lot::Mutex;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::delta::AnalyticsDelta;
use super::snapshot::{AnalyticsSnapshot, ClientInfo};
use super::summary::{AnalyticsSummary, ToolAnalytics};
use crate::error::{AnalyticsError, Result};

/// File name of the snapshot inside the analytics data directory.
pub const SNAPSHOT_FILE_NAME: &str = "analytics.json";

/// Process-wide analytics state.
///
/// All counters live behind one coarse mutex; every mutation is a short
/// critical section with no I/O. Persistence clones the snapshot under the
/// lock and writes it out after releasing it.
pub struct AnalyticsStore {
    state: Mutex<AnalyticsSnapshot>,
    storage_path: PathBuf,
    max_recent: usize,
    /// Serializes writers of the temp file.
    persist_lock: Mutex<()>,
}

impl AnalyticsStore {
    /// Open the store backed by `<data_dir>/analytics.json`.
    pub fn open_in_dir(data_dir: impl AsRef<Path>, max_recent: usize) -> Self {
        Self::open(data_dir.as_ref().join(SNAPSHOT_FILE_NAME), max_recent)
    }

    /// Open the store backed by `storage_path`, reloading any prior snapshot.
    ///
    /// Never fails: a missing or unreadable snapshot is logged and replaced by
    /// an empty one starting now.
    pub fn open(storage_path: impl AsRef<Path>, max_recent: usize) -> Self {
        Self::open_at(storage_path, max_recent, Utc::now())
    }

    /// Like [`AnalyticsStore::open`] with an explicit process start time.
    pub fn open_at(storage_path: impl AsRef<Path>, max_recent: usize, now: DateTime<Utc>) -> Self {
        let storage_path = storage_path.as_ref().to_path_buf();

        let snapshot = match load_from_disk(&storage_path) {
            Ok(Some(mut snapshot)) => {
                snapshot.recent_tool_calls.truncate(max_recent);
                info!(
                    path = %storage_path.display(),
                    total_requests = snapshot.total_requests,
                    total_tool_calls = snapshot.total_tool_calls,
                    "Loaded analytics snapshot"
                );
                snapshot
            }
            Ok(None) => {
                info!(
                    path = %storage_path.display(),
                    "No analytics snapshot found, starting fresh"
                );
                AnalyticsSnapshot::new(now)
            }
            Err(e) => {
                warn!(
                    error = %e,
                    "Failed to load analytics snapshot, starting fresh"
                );
                AnalyticsSnapshot::new(now)
            }
        };

        Self {
            state: Mutex::new(snapshot),
            storage_path,
            max_recent,
            persist_lock: Mutex::new(()),
        }
    }

    pub fn storage_path(&self) -> &Path {
        &self.storage_path
    }

    pub fn max_recent(&self) -> usize {
        self.max_recent
    }

    /// Count one inbound request.
    pub fn record_request(
        &self,
        method: &str,
        endpoint: &str,
        client: &ClientInfo,
        now: DateTime<Utc>,
    ) {
        self.state.lock().apply_request(method, endpoint, client, now);
    }

    /// Count one tool invocation and push it onto the recent-call history.
    pub fn record_tool_call(&self, tool: &str, client: &ClientInfo, now: DateTime<Utc>) {
        self.state
            .lock()
            .apply_tool_call(tool, client, now, self.max_recent);
    }

    /// Add externally supplied aggregates. Returns the merged section names.
    pub fn merge(&self, delta: &AnalyticsDelta) -> Vec<&'static str> {
        delta.apply_to(&mut self.state.lock());
        delta.sections()
    }

    /// Clone of the current counters.
    pub fn snapshot(&self) -> AnalyticsSnapshot {
        self.state.lock().clone()
    }

    pub fn summarize(&self, now: DateTime<Utc>) -> AnalyticsSummary {
        AnalyticsSummary::from_snapshot(&self.state.lock(), now)
    }

    pub fn tool_analytics(&self, recent_limit: usize) -> ToolAnalytics {
        ToolAnalytics::from_snapshot(&self.state.lock(), recent_limit)
    }

    /// Overwrite the durable snapshot with the current counters.
    ///
    /// Writes to a sibling temp file and renames it into place, so a crash
    /// mid-write leaves the previous snapshot intact.
    pub fn persist(&self) -> Result<()> {
        // Snapshot under the write lock so a later writer never carries older counts.
        let _guard = self.persist_lock.lock();
        let snapshot = self.snapshot();

        if let Some(parent) = self.storage_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| AnalyticsError::io(parent, e))?;
            }
        }

        let temp_path = self.storage_path.with_extension("json.tmp");
        {
            let file =
                File::create(&temp_path).map_err(|e| AnalyticsError::io(&temp_path, e))?;
            let mut writer = BufWriter::new(file);
            serde_json::to_writer_pretty(&mut writer, &snapshot)
                .map_err(AnalyticsError::Serialize)?;
            writer
                .flush()
                .map_err(|e| AnalyticsError::io(&temp_path, e))?;
        }

        fs::rename(&temp_path, &self.storage_path)
            .map_err(|e| AnalyticsError::io(&self.storage_path, e))?;

        debug!(
            path = %self.storage_path.display(),
            total_requests = snapshot.total_requests,
            "Persisted analytics snapshot"
        );
        Ok(())
    }
}

fn load_from_disk(path: &Path) -> Result<Option<AnalyticsSnapshot>> {
    if !path.exists() {
        return Ok(None);
    }

    let file = File::open(path).map_err(|e| AnalyticsError::io(path, e))?;
    let snapshot = serde_json::from_reader(BufReader::new(file)).map_err(AnalyticsError::Parse)?;
    Ok(Some(snapshot))
}
