//! Collector runtime
//!
//! Owns the ingest queue, the runtime statistics, the store handle and the
//! two background workers (flush and retention), and coordinates them through
//! the lifecycle state machine.
//!
//! ```text
//! POST /ingest ──→ redact ──→ IngestQueue (drop-oldest)
//!                                 │      ▲
//!            threshold notify ────┘      │ acknowledge after write
//!                                 ▼      │
//!                        flush worker ──→ EventStore ←── retention worker
//! ```

pub mod flush;
pub mod health;
pub mod lifecycle;
pub mod queue;
pub mod retention;
pub mod stats;

use serde::Serialize;
use std::sync::{Arc, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::{watch, Mutex, Notify, OnceCell};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, timeout_at, Instant};

use crate::config::Config;
use crate::error::CollectorError;
use crate::event::Event;
use crate::redaction::redact_event;
use crate::store::EventStore;

pub use flush::FlushOutcome;
pub use health::HealthReport;
pub use lifecycle::{Lifecycle, LifecycleState};
pub use queue::IngestQueue;
pub use retention::{RetentionOutcome, RetentionReport};
pub use stats::{FailureRecord, RuntimeStats};

/// How often `close` re-checks the queue while draining
const SHUTDOWN_POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Result of an `enqueue` call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnqueueReceipt {
    /// Always the size of the submitted batch
    pub accepted: usize,
    /// Cumulative drop counter after this call
    pub dropped: u64,
    pub queue_length: usize,
}

/// Outcome of `close`, shared by every caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CloseReport {
    pub flushed_during_close: u64,
    pub discarded: u64,
    pub completed_at_ms: i64,
}

pub struct Collector {
    config: Arc<Config>,
    store: EventStore,
    queue: Mutex<IngestQueue>,
    stats: Mutex<RuntimeStats>,
    lifecycle: Lifecycle,
    /// Held for the duration of a drain pass; at most one pass runs at a time
    flush_gate: Mutex<()>,
    retention_gate: Mutex<()>,
    flush_signal: Arc<Notify>,
    stop_workers: watch::Sender<bool>,
    workers: std::sync::Mutex<Vec<JoinHandle<()>>>,
    closed: OnceCell<CloseReport>,
}

pub(crate) fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

impl Collector {
    /// Create the runtime and spawn its flush and retention workers.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(config: Arc<Config>, store: EventStore) -> Arc<Self> {
        let (stop_workers, _) = watch::channel(false);
        let collector = Arc::new(Self {
            queue: Mutex::new(IngestQueue::new(config.max_queue_size)),
            stats: Mutex::new(RuntimeStats::default()),
            lifecycle: Lifecycle::new(now_ms()),
            flush_gate: Mutex::new(()),
            retention_gate: Mutex::new(()),
            flush_signal: Arc::new(Notify::new()),
            stop_workers,
            workers: std::sync::Mutex::new(Vec::new()),
            closed: OnceCell::new(),
            store,
            config,
        });

        let flush_worker = flush::spawn_flush_worker(
            Arc::downgrade(&collector),
            Duration::from_millis(collector.config.flush_interval_ms),
            collector.flush_signal.clone(),
            collector.stop_workers.subscribe(),
        );
        let retention_worker = retention::spawn_retention_worker(
            Arc::downgrade(&collector),
            Duration::from_millis(collector.config.retention_interval_ms),
            collector.stop_workers.subscribe(),
        );
        collector
            .lock_workers()
            .extend([flush_worker, retention_worker]);

        tracing::info!(
            db_path = %collector.store.path(),
            max_queue_size = collector.config.max_queue_size,
            flush_interval_ms = collector.config.flush_interval_ms,
            retention_interval_ms = collector.config.retention_interval_ms,
            "Collector runtime started"
        );
        collector
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &EventStore {
        &self.store
    }

    pub fn lifecycle_state(&self) -> LifecycleState {
        self.lifecycle.state()
    }

    pub async fn queue_len(&self) -> usize {
        self.queue.lock().await.len()
    }

    /// Copy of the current counters
    pub async fn stats(&self) -> RuntimeStats {
        self.stats.lock().await.clone()
    }

    /// Redact and queue a batch of events.
    ///
    /// Never blocks on I/O. When the queue is full each admission evicts the
    /// oldest entry. Crossing the flush threshold wakes the flush worker
    /// instead of flushing inline.
    pub async fn enqueue(&self, events: Vec<Event>) -> Result<EnqueueReceipt, CollectorError> {
        let state = self.lifecycle.state();
        if state != LifecycleState::Running {
            return Err(CollectorError::NotAccepting { state });
        }

        let accepted = events.len();
        let keys = &self.config.redact_keys;
        let redacted: Vec<Event> = events.into_iter().map(|e| redact_event(e, keys)).collect();

        let mut queue = self.queue.lock().await;
        // Checked again under the queue lock so nothing lands after close
        // has started draining.
        let state = self.lifecycle.state();
        if state != LifecycleState::Running {
            return Err(CollectorError::NotAccepting { state });
        }

        let mut evicted = 0u64;
        for event in redacted {
            if queue.push(event) {
                evicted += 1;
            }
        }
        let queue_length = queue.len();

        let dropped = {
            let mut stats = self.stats.lock().await;
            stats.accepted += accepted as u64;
            stats.dropped += evicted;
            stats.dropped
        };
        drop(queue);

        if evicted > 0 {
            tracing::debug!(evicted, queue_length, "Ingest queue full, evicted oldest events");
        }
        if queue_length >= self.config.flush_queue_threshold {
            self.flush_signal.notify_one();
        }

        Ok(EnqueueReceipt {
            accepted,
            dropped,
            queue_length,
        })
    }

    /// Stop accepting ingest. Returns `true` for the call that made the change.
    pub fn begin_shutdown(&self) -> bool {
        let changed = self.lifecycle.begin_shutdown(now_ms());
        if changed {
            tracing::info!("Collector stopping, ingest disabled");
        }
        changed
    }

    /// Stop the workers, drain the queue within the shutdown timeout and close
    /// the store.
    ///
    /// Concurrent and repeated calls share one execution and all observe the
    /// same report.
    pub async fn close(&self) -> CloseReport {
        self.closed.get_or_init(|| self.run_close()).await.clone()
    }

    async fn run_close(&self) -> CloseReport {
        self.begin_shutdown();
        let deadline = Instant::now() + Duration::from_millis(self.config.shutdown_timeout_ms);
        // Writes the flush worker finishes while being joined count as well
        let flushed_before = self.stats.lock().await.flushed;

        self.join_workers(deadline).await;

        let discarded = match timeout_at(deadline, self.flush_gate.lock()).await {
            Ok(_gate) => {
                self.drain_until(deadline).await;
                self.queue.lock().await.clear() as u64
            }
            Err(_) => {
                tracing::warn!("Shutdown deadline reached while waiting for a running flush");
                self.queue.lock().await.clear() as u64
            }
        };

        let flushed_during_close = {
            let mut stats = self.stats.lock().await;
            if discarded > 0 {
                stats.record_shutdown_discard(discarded);
            }
            stats.flushed - flushed_before
        };
        if discarded > 0 {
            tracing::warn!(
                discarded,
                timeout_ms = self.config.shutdown_timeout_ms,
                "Discarded queued events that could not be flushed before shutdown"
            );
        }

        self.store.close().await;
        self.lifecycle.mark_stopped();

        let report = CloseReport {
            flushed_during_close,
            discarded,
            completed_at_ms: now_ms(),
        };
        tracing::info!(
            flushed = report.flushed_during_close,
            discarded = report.discarded,
            "Collector stopped"
        );
        report
    }

    /// Signal both workers to stop and wait for them, aborting stragglers at
    /// the deadline.
    async fn join_workers(&self, deadline: Instant) {
        self.stop_workers.send_replace(true);
        let handles: Vec<JoinHandle<()>> = self.lock_workers().drain(..).collect();
        for mut handle in handles {
            if timeout_at(deadline, &mut handle).await.is_err() {
                tracing::warn!("Background worker did not stop before the deadline, aborting");
                handle.abort();
            }
        }
    }

    /// Repeat drain passes until the queue is empty or the deadline passes.
    /// Caller holds the flush gate.
    async fn drain_until(&self, deadline: Instant) {
        loop {
            if self.queue.lock().await.is_empty() {
                return;
            }
            if timeout_at(deadline, self.drain_pass()).await.is_err() {
                tracing::warn!("Shutdown deadline reached during final flush");
                return;
            }
            if self.queue.lock().await.is_empty() || Instant::now() >= deadline {
                return;
            }
            sleep_until((Instant::now() + SHUTDOWN_POLL_INTERVAL).min(deadline)).await;
        }
    }

    fn lock_workers(&self) -> MutexGuard<'_, Vec<JoinHandle<()>>> {
        self.workers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
