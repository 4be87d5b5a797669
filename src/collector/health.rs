//! Health snapshot served by `GET /health`

use serde::Serialize;

use super::{Collector, FailureRecord, LifecycleState};

/// The only admission policy the queue implements
pub const DROP_POLICY: &str = "drop-oldest";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub ok: bool,
    pub host: String,
    pub port: u16,
    pub db_path: String,
    pub lifecycle: LifecycleReport,
    pub queue: QueueReport,
    pub stats: StatsReport,
    pub retention: RetentionSettingsReport,
    pub redaction: RedactionReport,
    pub failures: FailuresReport,
    pub storage: StorageReport,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LifecycleReport {
    pub state: LifecycleState,
    pub started_at_ms: i64,
    pub shutdown_started_at_ms: Option<i64>,
    pub shutdown_timeout_ms: u64,
    pub last_successful_flush_at_ms: Option<i64>,
    pub last_successful_retention_at_ms: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueReport {
    pub length: usize,
    pub max_size: usize,
    pub drop_policy: &'static str,
    pub flush_batch_size: usize,
    pub flush_queue_threshold: usize,
    pub flush_interval_ms: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsReport {
    pub accepted: u64,
    pub dropped: u64,
    pub shutdown_dropped: u64,
    pub flushed: u64,
    pub flush_failures: u64,
    pub retention_failures: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RetentionSettingsReport {
    pub retention_hours: u64,
    pub max_rows: u64,
    pub interval_ms: u64,
    pub last_deleted_by_age: u64,
    pub last_deleted_by_cap: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RedactionReport {
    pub keys: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailuresReport {
    pub last_flush_error: Option<FailureRecord>,
    pub last_retention_error: Option<FailureRecord>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageReport {
    /// `None` when the store cannot be read, e.g. after close
    pub total_events: Option<i64>,
}

impl Collector {
    pub async fn health(&self) -> HealthReport {
        let queue_length = self.queue_len().await;
        let stats = self.stats().await;

        let total_events = if self.store.is_closed() {
            None
        } else {
            match self.store.count().await {
                Ok(total) => Some(total),
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to count stored events for health report");
                    None
                }
            }
        };

        let config = &self.config;
        HealthReport {
            ok: true,
            host: config.host.clone(),
            port: config.port,
            db_path: config.db_path.clone(),
            lifecycle: LifecycleReport {
                state: self.lifecycle.state(),
                started_at_ms: self.lifecycle.started_at_ms(),
                shutdown_started_at_ms: self.lifecycle.shutdown_started_at_ms(),
                shutdown_timeout_ms: config.shutdown_timeout_ms,
                last_successful_flush_at_ms: stats.last_flush_at_ms,
                last_successful_retention_at_ms: stats.last_retention_at_ms,
            },
            queue: QueueReport {
                length: queue_length,
                max_size: config.max_queue_size,
                drop_policy: DROP_POLICY,
                flush_batch_size: config.flush_batch_size,
                flush_queue_threshold: config.flush_queue_threshold,
                flush_interval_ms: config.flush_interval_ms,
            },
            stats: StatsReport {
                accepted: stats.accepted,
                dropped: stats.dropped,
                shutdown_dropped: stats.shutdown_dropped,
                flushed: stats.flushed,
                flush_failures: stats.flush_failures,
                retention_failures: stats.retention_failures,
            },
            retention: RetentionSettingsReport {
                retention_hours: config.retention_hours,
                max_rows: config.max_rows,
                interval_ms: config.retention_interval_ms,
                last_deleted_by_age: stats.last_deleted_by_age,
                last_deleted_by_cap: stats.last_deleted_by_cap,
            },
            redaction: RedactionReport {
                keys: config.redact_keys.to_vec(),
            },
            failures: FailuresReport {
                last_flush_error: stats.last_flush_error,
                last_retention_error: stats.last_retention_error,
            },
            storage: StorageReport { total_events },
        }
    }
}
