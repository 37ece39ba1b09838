//! Fire-and-forget work submitted from the request path.

use metrics::counter;
use tokio::sync::mpsc;
use tracing::warn;

use crate::domain::hit_event::HitEvent;

const BACKGROUND_TASKS_DROPPED_TOTAL: &str = "background_tasks_dropped_total";

/// Work the dispatcher and click accountant hand off instead of awaiting.
#[derive(Debug, Clone, PartialEq)]
pub enum BackgroundTask {
    /// Append a hit to the URL and campaign hit logs.
    RecordHit(HitEvent),
    /// Persist `status = completed` for a URL observed at or over its quota.
    PersistCompletion { url_id: i64 },
}

impl BackgroundTask {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::RecordHit(_) => "record_hit",
            Self::PersistCompletion { .. } => "persist_completion",
        }
    }
}

/// Sending half of the background queue.
///
/// Submission never waits: a full or closed queue drops the task with a
/// warning, the request is served regardless.
#[derive(Clone, Debug)]
pub struct TaskQueue {
    sender: mpsc::Sender<BackgroundTask>,
}

impl TaskQueue {
    /// Creates a bounded queue and returns its receiving half for the worker.
    pub fn bounded(capacity: usize) -> (Self, mpsc::Receiver<BackgroundTask>) {
        let (sender, receiver) = mpsc::channel(capacity);
        (Self { sender }, receiver)
    }

    pub fn submit(&self, task: BackgroundTask) -> bool {
        let kind = task.kind();
        match self.sender.try_send(task) {
            Ok(()) => true,
            Err(e) => {
                warn!(task = kind, error = %e, "Failed to enqueue background task");
                counter!(BACKGROUND_TASKS_DROPPED_TOTAL, "task" => kind).increment(1);
                false
            }
        }
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    /// Free slots left in the queue.
    pub fn capacity(&self) -> usize {
        self.sender.capacity()
    }
}
