//! Exactly-once reporting of URL completions.

use dashmap::DashSet;
use tracing::debug;

use crate::domain::background_task::{BackgroundTask, TaskQueue};

/// Remembers which URLs already had their completion handed to the
/// background queue, so concurrent readers observing the same exhausted URL
/// enqueue one correction between them.
#[derive(Debug)]
pub struct CompletionTracker {
    queue: TaskQueue,
    reported: DashSet<i64>,
}

impl CompletionTracker {
    pub fn new(queue: TaskQueue) -> Self {
        Self {
            queue,
            reported: DashSet::new(),
        }
    }

    /// Claims the completion of `url_id` for a caller that persists it
    /// itself. Returns false if it was already claimed or reported.
    pub fn claim(&self, url_id: i64) -> bool {
        self.reported.insert(url_id)
    }

    /// Enqueues an asynchronous completion the first time it is called for
    /// `url_id`. Returns true when this call enqueued it.
    pub fn report(&self, url_id: i64) -> bool {
        if !self.claim(url_id) {
            return false;
        }
        debug!(url_id, "Reporting url completion");
        if !self.queue.submit(BackgroundTask::PersistCompletion { url_id }) {
            self.reported.remove(&url_id);
            return false;
        }
        true
    }

    /// Forgets a URL so a later completion is reported again, e.g. after an
    /// admin raised its quota or a persistence attempt failed.
    pub fn release(&self, url_id: i64) {
        self.reported.remove(&url_id);
    }

    pub fn is_reported(&self, url_id: i64) -> bool {
        self.reported.contains(&url_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_enqueues_once() {
        let (queue, mut rx) = TaskQueue::bounded(8);
        let tracker = CompletionTracker::new(queue);

        assert!(tracker.report(3));
        assert!(!tracker.report(3));
        assert!(tracker.is_reported(3));

        assert_eq!(
            rx.try_recv().unwrap(),
            BackgroundTask::PersistCompletion { url_id: 3 }
        );
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_release_allows_new_report() {
        let (queue, mut rx) = TaskQueue::bounded(8);
        let tracker = CompletionTracker::new(queue);

        tracker.report(3);
        tracker.release(3);
        assert!(tracker.report(3));

        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_ok());
    }

    #[test]
    fn test_claim_blocks_report() {
        let (queue, mut rx) = TaskQueue::bounded(8);
        let tracker = CompletionTracker::new(queue);

        assert!(tracker.claim(4));
        assert!(!tracker.report(4));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_dropped_submission_is_not_remembered() {
        let (queue, rx) = TaskQueue::bounded(1);
        drop(rx);
        let tracker = CompletionTracker::new(queue);

        assert!(!tracker.report(5));
        assert!(!tracker.is_reported(5));
    }
}
