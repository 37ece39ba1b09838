//! In-memory pending click counters.

use dashmap::DashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Per-URL counters. `in_flight` is the batch a flush is currently writing;
/// `settled_at` is the generation at which the last batch reached the store.
#[derive(Debug, Default, Clone, Copy)]
struct Slot {
    queued: i64,
    in_flight: i64,
    settled_at: u64,
}

/// Unflushed click increments per URL.
///
/// Never persisted. Updates to one key are serialised by the shard lock, so
/// concurrent increments on the same URL are atomic and applied in order.
///
/// A flush moves the queued clicks into an in-flight batch before writing
/// them, and clears the batch once the store returned the updated row. A
/// row read from the store while a batch is in flight may or may not contain
/// it, so such rows are overlaid with [`Self::queued`] only and are not
/// cached (see [`Self::is_current`]).
#[derive(Clone, Debug, Default)]
pub struct PendingClicks {
    inner: Arc<DashMap<i64, Slot>>,
    generation: Arc<AtomicU64>,
}

impl PendingClicks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one click and returns the new queued count.
    pub fn increment(&self, url_id: i64) -> i64 {
        let mut slot = self.inner.entry(url_id).or_default();
        slot.queued += 1;
        slot.queued
    }

    /// Adds `count` clicks back to the queue.
    pub fn restore(&self, url_id: i64, count: i64) {
        if count > 0 {
            self.inner.entry(url_id).or_default().queued += count;
        }
    }

    /// Removes `count` queued clicks that were never accepted.
    pub fn discard(&self, url_id: i64, count: i64) {
        if let Some(mut slot) = self.inner.get_mut(&url_id) {
            slot.queued = (slot.queued - count).max(0);
        }
    }

    /// Every click not yet reflected in a row written by a flush: queued plus
    /// in flight. The overlay for rows cached before the current batch.
    pub fn get(&self, url_id: i64) -> i64 {
        self.inner
            .get(&url_id)
            .map(|slot| slot.queued + slot.in_flight)
            .unwrap_or(0)
    }

    /// Clicks no flush has picked up yet.
    pub fn queued(&self, url_id: i64) -> i64 {
        self.inner.get(&url_id).map(|slot| slot.queued).unwrap_or(0)
    }

    /// Moves the queued clicks into the in-flight batch and returns its size.
    pub fn begin_flush(&self, url_id: i64) -> i64 {
        let Some(mut slot) = self.inner.get_mut(&url_id) else {
            return 0;
        };
        slot.in_flight += slot.queued;
        slot.queued = 0;
        slot.in_flight
    }

    /// Puts a failed batch back in the queue.
    pub fn abort_flush(&self, url_id: i64) {
        if let Some(mut slot) = self.inner.get_mut(&url_id) {
            slot.queued += slot.in_flight;
            slot.in_flight = 0;
        }
    }

    /// Drops the in-flight batch once the store holds it.
    pub fn finish_flush(&self, url_id: i64) {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(mut slot) = self.inner.get_mut(&url_id) {
            slot.in_flight = 0;
            slot.settled_at = generation;
        }
    }

    /// Marker taken before a store read, for [`Self::is_current`].
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Whether a row read after `generation` was taken can be cached under
    /// the [`Self::get`] overlay: no batch is in flight and none settled
    /// since the read started.
    pub fn is_current(&self, url_id: i64, generation: u64) -> bool {
        self.inner
            .get(&url_id)
            .is_none_or(|slot| slot.in_flight == 0 && slot.settled_at <= generation)
    }

    /// Every URL with queued clicks.
    pub fn snapshot(&self) -> Vec<(i64, i64)> {
        self.inner
            .iter()
            .filter(|entry| entry.queued > 0)
            .map(|entry| (*entry.key(), entry.queued))
            .collect()
    }

    /// Sum of all unflushed clicks.
    pub fn total(&self) -> i64 {
        self.inner
            .iter()
            .map(|entry| entry.queued + entry.in_flight)
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_increment_and_get() {
        let pending = PendingClicks::new();

        assert_eq!(pending.get(1), 0);
        assert_eq!(pending.increment(1), 1);
        assert_eq!(pending.increment(1), 2);
        assert_eq!(pending.increment(2), 1);
        assert_eq!(pending.get(1), 2);
        assert_eq!(pending.total(), 3);
    }

    #[test]
    fn test_begin_flush_moves_queue_in_flight() {
        let pending = PendingClicks::new();
        pending.increment(1);
        pending.increment(1);

        assert_eq!(pending.begin_flush(1), 2);
        pending.increment(1);

        assert_eq!(pending.queued(1), 1);
        assert_eq!(pending.get(1), 3);
        assert_eq!(pending.snapshot(), vec![(1, 1)]);
    }

    #[test]
    fn test_finish_flush_keeps_later_increments() {
        let pending = PendingClicks::new();
        pending.increment(1);
        pending.increment(1);
        pending.begin_flush(1);
        pending.increment(1);

        pending.finish_flush(1);

        assert_eq!(pending.get(1), 1);
        assert_eq!(pending.total(), 1);
    }

    #[test]
    fn test_abort_flush_requeues_batch() {
        let pending = PendingClicks::new();
        pending.increment(4);
        pending.begin_flush(4);
        pending.increment(4);

        pending.abort_flush(4);

        assert_eq!(pending.queued(4), 2);
        assert_eq!(pending.get(4), 2);
    }

    #[test]
    fn test_drained_url_is_empty() {
        let pending = PendingClicks::new();
        pending.increment(7);
        pending.begin_flush(7);

        pending.finish_flush(7);

        assert!(pending.is_empty());
        assert!(pending.snapshot().is_empty());
    }

    #[test]
    fn test_reads_overlapping_a_flush_are_not_current() {
        let pending = PendingClicks::new();
        pending.increment(1);

        let before = pending.generation();
        assert!(pending.is_current(1, before));

        pending.begin_flush(1);
        assert!(!pending.is_current(1, before));

        pending.finish_flush(1);
        assert!(!pending.is_current(1, before));
        assert!(pending.is_current(1, pending.generation()));
        assert!(pending.is_current(2, before));
    }

    #[test]
    fn test_restore_and_discard() {
        let pending = PendingClicks::new();
        pending.restore(3, 4);
        pending.restore(3, 0);
        pending.discard(3, 1);

        assert_eq!(pending.get(3), 3);
    }

    #[test]
    fn test_concurrent_increments_are_not_lost() {
        let pending = PendingClicks::new();

        std::thread::scope(|scope| {
            for _ in 0..8 {
                let pending = pending.clone();
                scope.spawn(move || {
                    for _ in 0..1_000 {
                        pending.increment(42);
                    }
                });
            }
        });

        assert_eq!(pending.get(42), 8_000);
    }
}
