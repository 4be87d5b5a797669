use futures::FutureExt;
use serde::Serialize;
use std::sync::Weak;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use super::{now_ms, Collector};
use crate::error::StoreError;

const MS_PER_HOUR: i64 = 3_600_000;

/// Rows removed by one retention sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RetentionReport {
    pub deleted_by_age: u64,
    pub deleted_by_cap: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetentionOutcome {
    Completed(RetentionReport),
    Failed { error: String },
    /// A sweep was already in progress
    AlreadyRunning,
}

/// Start the retention task
///
/// Runs a sweep every `period`; the first sweep happens one period after
/// start. Failed sweeps are recorded and retried on the next tick.
pub(crate) fn spawn_retention_worker(
    collector: Weak<Collector>,
    period: Duration,
    mut stop: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let result = std::panic::AssertUnwindSafe(async {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = stop.changed() => break,
                    _ = ticker.tick() => {}
                }

                let Some(collector) = collector.upgrade() else {
                    break;
                };
                collector.enforce_retention().await;
            }
        })
        .catch_unwind()
        .await;

        match result {
            Ok(()) => tracing::debug!("Retention worker stopped"),
            Err(e) => tracing::error!(panic = ?e, "Retention worker panicked"),
        }
    })
}

impl Collector {
    /// Delete rows older than the retention window, then cap the row count.
    pub async fn enforce_retention(&self) -> RetentionOutcome {
        let Ok(_gate) = self.retention_gate.try_lock() else {
            return RetentionOutcome::AlreadyRunning;
        };

        let now = now_ms();
        let window_ms = i64::try_from(self.config.retention_hours)
            .unwrap_or(i64::MAX)
            .saturating_mul(MS_PER_HOUR);
        let cutoff = now.saturating_sub(window_ms);

        match self.sweep(cutoff).await {
            Ok(report) => {
                self.stats.lock().await.record_retention_success(
                    report.deleted_by_age,
                    report.deleted_by_cap,
                    now_ms(),
                );
                if report.deleted_by_age > 0 || report.deleted_by_cap > 0 {
                    tracing::info!(
                        deleted_by_age = report.deleted_by_age,
                        deleted_by_cap = report.deleted_by_cap,
                        retention_hours = self.config.retention_hours,
                        max_rows = self.config.max_rows,
                        "Retention sweep removed events"
                    );
                }
                RetentionOutcome::Completed(report)
            }
            Err(e) => {
                let error = e.to_string();
                self.stats
                    .lock()
                    .await
                    .record_retention_failure(now_ms(), error.clone());
                tracing::error!(error = %error, "Retention sweep failed");
                RetentionOutcome::Failed { error }
            }
        }
    }

    async fn sweep(&self, cutoff_ms: i64) -> Result<RetentionReport, StoreError> {
        let deleted_by_age = self.store.delete_older_than(cutoff_ms).await?;
        let deleted_by_cap = self.store.cap_rows(self.config.max_rows).await?;
        Ok(RetentionReport {
            deleted_by_age,
            deleted_by_cap,
        })
    }
}
