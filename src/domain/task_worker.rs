//! Background worker draining the fire-and-forget queue.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Semaphore, mpsc};
use tokio::task::JoinSet;
use tokio_retry::Retry;
use tokio_retry::strategy::{ExponentialBackoff, jitter};
use tracing::{debug, error, info};

use crate::domain::background_task::BackgroundTask;
use crate::domain::repositories::{HitRepository, UrlRepository};
use crate::error::AppError;

const MAX_ATTEMPTS: usize = 3;

/// Processes background tasks until every sender is dropped.
///
/// At most `concurrency` tasks run at once. Each task is retried with
/// jittered exponential backoff; a task that still fails is logged and
/// discarded, it never reaches a request.
pub async fn run_task_worker(
    mut rx: mpsc::Receiver<BackgroundTask>,
    url_repository: Arc<dyn UrlRepository>,
    hit_repository: Arc<dyn HitRepository>,
    concurrency: usize,
) {
    let permits = Arc::new(Semaphore::new(concurrency.max(1)));
    let mut in_flight = JoinSet::new();

    while let Some(task) = rx.recv().await {
        let Ok(permit) = permits.clone().acquire_owned().await else {
            break;
        };
        let url_repository = url_repository.clone();
        let hit_repository = hit_repository.clone();

        in_flight.spawn(async move {
            let kind = task.kind();
            if let Err(e) = process_with_retry(task, url_repository, hit_repository).await {
                error!(task = kind, error = %e, "Background task failed after retries");
            }
            drop(permit);
        });

        while in_flight.try_join_next().is_some() {}
    }

    while in_flight.join_next().await.is_some() {}
    info!("Background task worker stopped");
}

async fn process_with_retry(
    task: BackgroundTask,
    url_repository: Arc<dyn UrlRepository>,
    hit_repository: Arc<dyn HitRepository>,
) -> Result<(), AppError> {
    let strategy = ExponentialBackoff::from_millis(10)
        .max_delay(Duration::from_secs(1))
        .map(jitter)
        .take(MAX_ATTEMPTS - 1);

    Retry::start(strategy, || {
        let task = task.clone();
        let url_repository = url_repository.clone();
        let hit_repository = hit_repository.clone();
        async move { process(task, url_repository.as_ref(), hit_repository.as_ref()).await }
    })
    .await
}

async fn process(
    task: BackgroundTask,
    url_repository: &dyn UrlRepository,
    hit_repository: &dyn HitRepository,
) -> Result<(), AppError> {
    match task {
        BackgroundTask::RecordHit(event) => hit_repository.record(event).await,
        BackgroundTask::PersistCompletion { url_id } => {
            let found = url_repository.mark_completed(url_id, false).await?;
            debug!(url_id, found, "Persisted url completion");
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::background_task::TaskQueue;
    use crate::domain::hit_event::HitEvent;
    use crate::domain::repositories::{MockHitRepository, MockUrlRepository};
    use chrono::{FixedOffset, Utc};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_worker_records_hits_and_completions() {
        let mut url_repo = MockUrlRepository::new();
        url_repo
            .expect_mark_completed()
            .withf(|id, detach| *id == 5 && !*detach)
            .times(1)
            .returning(|_, _| Ok(true));

        let mut hit_repo = MockHitRepository::new();
        hit_repo
            .expect_record()
            .withf(|event| event.url_id == 5 && event.campaign_id == 2)
            .times(1)
            .returning(|_| Ok(()));

        let (queue, rx) = TaskQueue::bounded(8);
        let tz = FixedOffset::east_opt(0).unwrap();
        queue.submit(BackgroundTask::RecordHit(HitEvent::new(5, 2, Utc::now(), tz)));
        queue.submit(BackgroundTask::PersistCompletion { url_id: 5 });
        drop(queue);

        run_task_worker(rx, Arc::new(url_repo), Arc::new(hit_repo), 2).await;
    }

    #[tokio::test]
    async fn test_worker_retries_failed_task() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let seen = attempts.clone();

        let url_repo = MockUrlRepository::new();
        let mut hit_repo = MockHitRepository::new();
        hit_repo.expect_record().times(2).returning(move |_| {
            if seen.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(AppError::internal("Database error", json!({})))
            } else {
                Ok(())
            }
        });

        let (queue, rx) = TaskQueue::bounded(8);
        let tz = FixedOffset::east_opt(0).unwrap();
        queue.submit(BackgroundTask::RecordHit(HitEvent::new(1, 1, Utc::now(), tz)));
        drop(queue);

        run_task_worker(rx, Arc::new(url_repo), Arc::new(hit_repo), 1).await;

        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_worker_gives_up_after_max_attempts() {
        let url_repo = MockUrlRepository::new();
        let mut hit_repo = MockHitRepository::new();
        hit_repo
            .expect_record()
            .times(MAX_ATTEMPTS)
            .returning(|_| Err(AppError::internal("Database error", json!({}))));

        let (queue, rx) = TaskQueue::bounded(8);
        let tz = FixedOffset::east_opt(0).unwrap();
        queue.submit(BackgroundTask::RecordHit(HitEvent::new(1, 1, Utc::now(), tz)));
        drop(queue);

        run_task_worker(rx, Arc::new(url_repo), Arc::new(hit_repo), 1).await;
    }
}
