//! Flush scheduling
//!
//! A single worker task owns both triggers: the periodic ticker and the
//! threshold notification from `enqueue`. Direct `flush()` calls and the
//! worker serialize on the collector's flush gate, so two triggers firing
//! together collapse into one drain pass.

use futures::FutureExt;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use super::{now_ms, Collector};

/// Result of one drain attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlushOutcome {
    /// Queue was already empty
    Idle,
    /// Queue drained completely
    Flushed { written: u64 },
    /// A batch write failed; its events are still queued
    Failed { written: u64, error: String },
    /// Another drain pass was in progress
    AlreadyRunning,
}

pub(crate) fn spawn_flush_worker(
    collector: Weak<Collector>,
    period: Duration,
    signal: Arc<Notify>,
    mut stop: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let result = std::panic::AssertUnwindSafe(async {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = stop.changed() => break,
                    _ = ticker.tick() => {}
                    _ = signal.notified() => {}
                }

                let Some(collector) = collector.upgrade() else {
                    break;
                };
                collector.flush().await;
            }
        })
        .catch_unwind()
        .await;

        match result {
            Ok(()) => tracing::debug!("Flush worker stopped"),
            Err(e) => tracing::error!(panic = ?e, "Flush worker panicked"),
        }
    })
}

impl Collector {
    /// Drain the queue into the store in batches of `flush_batch_size`.
    ///
    /// Returns `AlreadyRunning` without waiting if a pass is in progress.
    pub async fn flush(&self) -> FlushOutcome {
        let Ok(_gate) = self.flush_gate.try_lock() else {
            return FlushOutcome::AlreadyRunning;
        };
        self.drain_pass().await
    }

    /// Write oldest-first batches until the queue is empty or a write fails.
    /// Entries leave the queue only after their batch is committed.
    pub(super) async fn drain_pass(&self) -> FlushOutcome {
        let mut written = 0u64;

        loop {
            let batch = self
                .queue
                .lock()
                .await
                .peek_batch(self.config.flush_batch_size);
            let Some(batch) = batch else {
                break;
            };

            match self.store.insert_batch(&batch.events).await {
                Ok(count) => {
                    let pending = {
                        let mut queue = self.queue.lock().await;
                        queue.acknowledge(&batch);
                        queue.len()
                    };
                    self.stats.lock().await.record_flush_success(count, now_ms());
                    written += count;
                    tracing::trace!(written = count, pending, "Flushed event batch");
                }
                Err(e) => {
                    let error = e.to_string();
                    self.stats
                        .lock()
                        .await
                        .record_flush_failure(now_ms(), error.clone());
                    tracing::error!(
                        error = %error,
                        batch_size = batch.events.len(),
                        "Failed to flush event batch, events stay queued"
                    );
                    return FlushOutcome::Failed { written, error };
                }
            }
        }

        if written == 0 {
            FlushOutcome::Idle
        } else {
            FlushOutcome::Flushed { written }
        }
    }
}
