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

//! Periodic analytics flushing.
//!
//! A background task persists the analytics snapshot on a fixed interval
//! until cancelled. [`AnalyticsScheduler::shutdown`] stops it and writes one
//! final snapshot, so a clean exit loses nothing.

use searchgate_core::AnalyticsStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

pub struct AnalyticsScheduler {
    store: Arc<AnalyticsStore>,
    token: CancellationToken,
    task: JoinHandle<()>,
}

impl AnalyticsScheduler {
    /// Start flushing `store` every `period`.
    pub fn spawn(store: Arc<AnalyticsStore>, period: Duration) -> Self {
        let token = CancellationToken::new();
        let task = tokio::spawn(flush_loop(store.clone(), period, token.clone()));

        info!(
            interval_secs = period.as_secs(),
            path = %store.storage_path().display(),
            "Analytics scheduler started"
        );

        Self { store, token, task }
    }

    /// Stop the periodic task and persist one last time.
    pub async fn shutdown(self) -> searchgate_core::Result<()> {
        self.token.cancel();
        if let Err(e) = self.task.await {
            error!(error = %e, "Analytics scheduler task failed");
        }

        let result = self.store.persist();
        match &result {
            Ok(()) => info!("Final analytics snapshot written"),
            Err(e) => error!(error = %e, "Failed to write final analytics snapshot"),
        }
        result
    }
}

async fn flush_loop(store: Arc<AnalyticsStore>, period: Duration, token: CancellationToken) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // First tick completes immediately.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = token.cancelled() => {
                debug!("Analytics scheduler cancelled");
                break;
            }
            _ = ticker.tick() => flush(&store).await,
        }
    }
}

async fn flush(store: &Arc<AnalyticsStore>) {
    let store = store.clone();
    match tokio::task::spawn_blocking(move || store.persist()).await {
        Ok(Ok(())) => debug!("Periodic analytics flush complete"),
        Ok(Err(e)) => warn!(error = %e, "Periodic analytics flush failed"),
        Err(e) => error!(error = %e, "Analytics flush task panicked"),
    }
}
