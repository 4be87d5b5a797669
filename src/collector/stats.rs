use serde::Serialize;

/// Longest error message kept in a failure summary
const MAX_ERROR_MESSAGE_LEN: usize = 500;

/// When and why a background operation last failed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureRecord {
    pub at_ms: i64,
    pub message: String,
}

impl FailureRecord {
    pub fn new(at_ms: i64, message: impl Into<String>) -> Self {
        let message = message.into();
        let message = if message.len() > MAX_ERROR_MESSAGE_LEN {
            let mut cut = MAX_ERROR_MESSAGE_LEN - 3;
            while !message.is_char_boundary(cut) {
                cut -= 1;
            }
            format!("{}...", &message[..cut])
        } else {
            message
        };
        Self { at_ms, message }
    }
}

/// Mutable runtime counters, owned by the collector behind one lock
#[derive(Debug, Clone, Default)]
pub struct RuntimeStats {
    pub accepted: u64,
    /// Queue-cap evictions plus events discarded at shutdown
    pub dropped: u64,
    pub shutdown_dropped: u64,
    pub flushed: u64,
    pub flush_failures: u64,
    pub retention_failures: u64,
    pub last_flush_at_ms: Option<i64>,
    pub last_retention_at_ms: Option<i64>,
    pub last_deleted_by_age: u64,
    pub last_deleted_by_cap: u64,
    pub last_flush_error: Option<FailureRecord>,
    pub last_retention_error: Option<FailureRecord>,
}

impl RuntimeStats {
    pub fn record_flush_success(&mut self, written: u64, now_ms: i64) {
        self.flushed += written;
        self.last_flush_at_ms = Some(now_ms);
        self.last_flush_error = None;
    }

    pub fn record_flush_failure(&mut self, now_ms: i64, message: impl Into<String>) {
        self.flush_failures += 1;
        self.last_flush_error = Some(FailureRecord::new(now_ms, message));
    }

    pub fn record_retention_success(&mut self, by_age: u64, by_cap: u64, now_ms: i64) {
        self.last_retention_at_ms = Some(now_ms);
        self.last_deleted_by_age = by_age;
        self.last_deleted_by_cap = by_cap;
        self.last_retention_error = None;
    }

    pub fn record_retention_failure(&mut self, now_ms: i64, message: impl Into<String>) {
        self.retention_failures += 1;
        self.last_retention_error = Some(FailureRecord::new(now_ms, message));
    }

    pub fn record_shutdown_discard(&mut self, discarded: u64) {
        self.shutdown_dropped += discarded;
        self.dropped += discarded;
    }
}
