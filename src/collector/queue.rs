//! Bounded ingest queue with drop-oldest admission
//!
//! Every entry carries a sequence number so a flush can acknowledge exactly
//! the entries it wrote, even if newer admissions evicted some of them while
//! the write was in flight.

use std::collections::VecDeque;

use crate::event::Event;

#[derive(Debug, Clone)]
struct QueueEntry {
    seq: u64,
    event: Event,
}

/// Oldest-first snapshot of queued events, to be acknowledged once written
#[derive(Debug, Clone)]
pub struct PendingBatch {
    pub events: Vec<Event>,
    last_seq: u64,
}

#[derive(Debug)]
pub struct IngestQueue {
    entries: VecDeque<QueueEntry>,
    max_size: usize,
    next_seq: u64,
}

impl IngestQueue {
    pub fn new(max_size: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            max_size: max_size.max(1),
            next_seq: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Append one event, evicting the oldest entry first if the queue is full.
    ///
    /// Returns `true` when an entry was evicted.
    pub fn push(&mut self, event: Event) -> bool {
        let evicted = if self.entries.len() >= self.max_size {
            self.entries.pop_front().is_some()
        } else {
            false
        };

        self.entries.push_back(QueueEntry {
            seq: self.next_seq,
            event,
        });
        self.next_seq += 1;
        evicted
    }

    /// Copy up to `max` of the oldest entries without removing them
    pub fn peek_batch(&self, max: usize) -> Option<PendingBatch> {
        let mut last_seq = None;
        let events: Vec<Event> = self
            .entries
            .iter()
            .take(max)
            .map(|entry| {
                last_seq = Some(entry.seq);
                entry.event.clone()
            })
            .collect();

        last_seq.map(|last_seq| PendingBatch { events, last_seq })
    }

    /// Remove the entries covered by a written batch.
    ///
    /// Entries already evicted by drop-oldest are simply no longer present.
    pub fn acknowledge(&mut self, batch: &PendingBatch) -> usize {
        let mut removed = 0;
        while self
            .entries
            .front()
            .is_some_and(|entry| entry.seq <= batch.last_seq)
        {
            self.entries.pop_front();
            removed += 1;
        }
        removed
    }

    /// Discard everything; returns the number of entries dropped
    pub fn clear(&mut self) -> usize {
        let discarded = self.entries.len();
        self.entries.clear();
        discarded
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Level;

    fn event(n: i64) -> Event {
        Event::new(n, Level::Info, format!("e{n}"))
    }

    fn names(batch: &PendingBatch) -> Vec<String> {
        batch.events.iter().map(|e| e.name.clone()).collect()
    }

    #[test]
    fn test_push_never_exceeds_max_size() {
        let mut queue = IngestQueue::new(3);
        let mut evictions = 0;
        for n in 0..10 {
            if queue.push(event(n)) {
                evictions += 1;
            }
            assert!(queue.len() <= 3);
        }
        assert_eq!(evictions, 7);

        // Freshest events survive
        let batch = queue.peek_batch(10).unwrap();
        assert_eq!(names(&batch), vec!["e7", "e8", "e9"]);
    }

    #[test]
    fn test_peek_batch_is_fifo_and_non_destructive() {
        let mut queue = IngestQueue::new(10);
        for n in 0..5 {
            queue.push(event(n));
        }

        let batch = queue.peek_batch(2).unwrap();
        assert_eq!(names(&batch), vec!["e0", "e1"]);
        assert_eq!(queue.len(), 5);

        assert_eq!(queue.acknowledge(&batch), 2);
        let next = queue.peek_batch(2).unwrap();
        assert_eq!(names(&next), vec!["e2", "e3"]);
    }

    #[test]
    fn test_peek_empty_queue() {
        let queue = IngestQueue::new(4);
        assert!(queue.peek_batch(10).is_none());
    }

    #[test]
    fn test_acknowledge_after_concurrent_eviction() {
        let mut queue = IngestQueue::new(3);
        for n in 0..3 {
            queue.push(event(n));
        }
        let batch = queue.peek_batch(2).unwrap(); // e0, e1

        // While the batch is being written, two admissions evict e0 and e1
        queue.push(event(3));
        queue.push(event(4));

        // Nothing covered by the batch is left; newer entries must survive
        assert_eq!(queue.acknowledge(&batch), 0);
        let rest = queue.peek_batch(10).unwrap();
        assert_eq!(names(&rest), vec!["e2", "e3", "e4"]);
    }

    #[test]
    fn test_acknowledge_partial_eviction() {
        let mut queue = IngestQueue::new(3);
        for n in 0..3 {
            queue.push(event(n));
        }
        let batch = queue.peek_batch(2).unwrap(); // e0, e1
        queue.push(event(3)); // evicts e0

        assert_eq!(queue.acknowledge(&batch), 1);
        let rest = queue.peek_batch(10).unwrap();
        assert_eq!(names(&rest), vec!["e2", "e3"]);
    }

    #[test]
    fn test_clear_reports_discarded() {
        let mut queue = IngestQueue::new(5);
        queue.push(event(1));
        queue.push(event(2));
        assert_eq!(queue.clear(), 2);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let mut queue = IngestQueue::new(0);
        queue.push(event(1));
        assert!(queue.push(event(2)));
        assert_eq!(queue.len(), 1);
    }
}
