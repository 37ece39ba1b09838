//! Periodic flush of pending clicks.

use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{MissedTickBehavior, interval};
use tracing::info;

use crate::application::services::{ClickAccountant, FlushReport};

/// Flushes pending clicks every `period` until `shutdown` flips to true or
/// its sender is dropped, then waits for running early flushes, runs one
/// final pass and returns its report.
///
/// A URL that fails to flush keeps its clicks pending and is retried on the
/// next tick.
pub async fn run_flush_loop(
    accountant: ClickAccountant,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> FlushReport {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                accountant.flush_all().await;
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }

    accountant.wait_for_early_flushes().await;
    let report = accountant.flush_all().await;
    info!(
        urls = report.urls,
        clicks = report.clicks,
        failures = report.failures,
        pending = accountant.pending().total(),
        "Final flush finished"
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::background_task::TaskQueue;
    use crate::domain::completion_tracker::CompletionTracker;
    use crate::domain::entities::{Url, UrlStatus};
    use crate::domain::pending_clicks::PendingClicks;
    use crate::domain::repositories::{MockCampaignRepository, MockUrlRepository, UrlRepository};
    use crate::infrastructure::cache::{CacheTtl, EntityCache};
    use std::sync::Arc;

    fn accountant(urls: MockUrlRepository) -> ClickAccountant {
        let (queue, _rx) = TaskQueue::bounded(4);
        let pending = PendingClicks::new();
        let completions = Arc::new(CompletionTracker::new(queue));
        let urls: Arc<dyn UrlRepository> = Arc::new(urls);
        let cache = Arc::new(EntityCache::new(
            CacheTtl::from_secs(60),
            pending.clone(),
            completions.clone(),
            Arc::new(MockCampaignRepository::new()),
            urls.clone(),
        ));
        ClickAccountant::new(cache, pending, completions, urls, 1_000)
    }

    fn url(id: i64, clicks: i64) -> Url {
        Url::new(
            id,
            Some(1),
            "https://example.com".to_string(),
            100,
            100,
            clicks,
            UrlStatus::Active,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_runs_final_flush() {
        let mut urls = MockUrlRepository::new();
        urls.expect_add_clicks()
            .times(1)
            .returning(|id, delta| Ok(Some(url(id, delta))));

        let accountant = accountant(urls);
        accountant.pending().increment(1);
        accountant.pending().increment(1);

        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(run_flush_loop(accountant.clone(), Duration::from_secs(3600), rx));
        tx.send(true).unwrap();

        let report = handle.await.unwrap();

        assert_eq!(report.clicks, 2);
        assert!(accountant.pending().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_tick_flushes_pending_clicks() {
        let mut urls = MockUrlRepository::new();
        urls.expect_add_clicks()
            .times(1)
            .returning(|id, delta| Ok(Some(url(id, delta))));

        let accountant = accountant(urls);
        accountant.pending().increment(5);

        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(run_flush_loop(accountant.clone(), Duration::from_secs(5), rx));

        tokio::time::sleep(Duration::from_secs(6)).await;
        assert!(accountant.pending().is_empty());

        drop(tx);
        let report = handle.await.unwrap();
        assert_eq!(report.clicks, 0);
    }
}
