//! Click accounting: pending increments, batched flushes and completion.

use std::sync::{Arc, Mutex, PoisonError};

use dashmap::DashSet;
use metrics::counter;
use serde::Serialize;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use super::dispatcher::DispatchError;
use crate::domain::completion_tracker::CompletionTracker;
use crate::domain::entities::{Url, UrlStatus};
use crate::domain::pending_clicks::PendingClicks;
use crate::domain::repositories::UrlRepository;
use crate::error::AppError;
use crate::infrastructure::cache::EntityCache;

const CLICKS_ACCEPTED_TOTAL: &str = "clicks_accepted_total";
const CLICKS_FLUSHED_TOTAL: &str = "clicks_flushed_total";
const FLUSH_FAILURES_TOTAL: &str = "flush_failures_total";

/// Outcome of one [`ClickAccountant::flush_all`] pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FlushReport {
    pub urls: usize,
    pub clicks: i64,
    pub failures: usize,
}

/// Sole writer of traffic-driven `clicks` and completion transitions.
///
/// Cheap to clone; clones share the pending counters, the cache, the
/// per-URL flush exclusion and the set of running early flushes.
#[derive(Clone)]
pub struct ClickAccountant {
    cache: Arc<EntityCache>,
    pending: PendingClicks,
    completions: Arc<CompletionTracker>,
    url_repository: Arc<dyn UrlRepository>,
    flushing: Arc<DashSet<i64>>,
    early_flushes: Arc<Mutex<JoinSet<()>>>,
    batch_threshold: i64,
}

/// Exclusive right to write `clicks` for one URL; released on drop.
struct FlushClaim {
    flushing: Arc<DashSet<i64>>,
    url_id: i64,
}

impl Drop for FlushClaim {
    fn drop(&mut self) {
        self.flushing.remove(&self.url_id);
    }
}

impl ClickAccountant {
    pub fn new(
        cache: Arc<EntityCache>,
        pending: PendingClicks,
        completions: Arc<CompletionTracker>,
        url_repository: Arc<dyn UrlRepository>,
        batch_threshold: i64,
    ) -> Self {
        Self {
            cache,
            pending,
            completions,
            url_repository,
            flushing: Arc::new(DashSet::new()),
            early_flushes: Arc::new(Mutex::new(JoinSet::new())),
            batch_threshold: batch_threshold.max(1),
        }
    }

    pub fn pending(&self) -> &PendingClicks {
        &self.pending
    }

    /// Accepts one click for `url_id` and returns the URL as observed after it.
    ///
    /// With a fresh cache entry the click is only counted in memory and the
    /// store is not touched. Otherwise the click and anything pending is
    /// written synchronously.
    ///
    /// # Errors
    ///
    /// - [`DispatchError::NotFound`] if the URL row no longer exists
    /// - [`DispatchError::StoreUnavailable`] if the synchronous write fails;
    ///   the click is not counted
    pub async fn increment(&self, url_id: i64) -> Result<Url, DispatchError> {
        if let Some(view) = self.increment_cached(url_id) {
            return Ok(view);
        }
        self.increment_uncached(url_id).await
    }

    fn increment_cached(&self, url_id: i64) -> Option<Url> {
        let (base, queued, pending) = self.cache.with_fresh_url(url_id, |base| {
            let queued = self.pending.increment(url_id);
            (base.clone(), queued, self.pending.get(url_id))
        })?;
        counter!(CLICKS_ACCEPTED_TOTAL).increment(1);

        let view = base.with_pending(pending);
        if view.is_exhausted() && base.status != UrlStatus::Completed {
            self.cache.mark_url_completed(url_id);
            self.completions.report(url_id);
            debug!(url_id, clicks = view.clicks, limit = view.click_limit, "Url exhausted in memory");
        }
        if let Some(campaign_id) = base.campaign_id {
            self.cache.invalidate_distribution(campaign_id);
        }

        if queued >= self.batch_threshold && !self.flushing.contains(&url_id) {
            self.spawn_early_flush(url_id);
        }

        Some(view)
    }

    fn spawn_early_flush(&self, url_id: i64) {
        let accountant = self.clone();
        let mut tasks = self
            .early_flushes
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        while tasks.try_join_next().is_some() {}
        tasks.spawn(async move {
            let _ = accountant.flush_url(url_id).await;
        });
    }

    /// Waits for every early flush started by the batch threshold, so a
    /// following [`Self::flush_all`] sees no URL claimed by one of them.
    pub async fn wait_for_early_flushes(&self) {
        let mut tasks = std::mem::take(
            &mut *self
                .early_flushes
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );
        while tasks.join_next().await.is_some() {}
    }

    async fn increment_uncached(&self, url_id: i64) -> Result<Url, DispatchError> {
        let Some(_claim) = self.claim(url_id) else {
            // A flush owns the row; count in memory and let it pick this up.
            self.pending.increment(url_id);
            counter!(CLICKS_ACCEPTED_TOTAL).increment(1);
            return match self.cache.url(url_id).await {
                Ok(Some(view)) => Ok(view),
                Ok(None) => {
                    self.pending.discard(url_id, 1);
                    Err(DispatchError::NotFound)
                }
                Err(e) => {
                    self.pending.discard(url_id, 1);
                    Err(DispatchError::StoreUnavailable(e.to_string()))
                }
            };
        };

        self.pending.increment(url_id);
        let delta = self.pending.begin_flush(url_id);
        let row = match self.url_repository.add_clicks(url_id, delta).await {
            Ok(Some(row)) => row,
            Ok(None) => {
                self.pending.abort_flush(url_id);
                self.pending.discard(url_id, 1);
                return Err(DispatchError::NotFound);
            }
            Err(e) => {
                self.pending.abort_flush(url_id);
                self.pending.discard(url_id, 1);
                return Err(DispatchError::StoreUnavailable(e.to_string()));
            }
        };
        counter!(CLICKS_ACCEPTED_TOTAL).increment(1);
        counter!(CLICKS_FLUSHED_TOTAL).increment(delta as u64);

        let campaign_id = row.campaign_id;
        let row = self.complete_if_exhausted(row).await;
        self.cache
            .put_url_settled(row.clone(), || self.pending.finish_flush(url_id));
        let view = row.with_pending(self.pending.get(url_id));
        if let Some(campaign_id) = campaign_id {
            self.cache.invalidate_distribution(campaign_id);
        }

        Ok(view)
    }

    /// Writes the pending clicks of one URL to the store.
    ///
    /// Returns the number of clicks written; zero when nothing was pending
    /// or another flush of the same URL is running. The batch is held in
    /// flight while the write runs, so cache reloads in that window neither
    /// lose nor double count it. On failure the clicks go back to the queue
    /// for the next pass.
    ///
    /// # Errors
    ///
    /// Propagates the store error after logging it.
    pub async fn flush_url(&self, url_id: i64) -> Result<i64, AppError> {
        let Some(_claim) = self.claim(url_id) else {
            return Ok(0);
        };
        let count = self.pending.begin_flush(url_id);
        if count <= 0 {
            return Ok(0);
        }

        let row = match self.url_repository.add_clicks(url_id, count).await {
            Ok(Some(row)) => row,
            Ok(None) => {
                warn!(url_id, count, "Dropping pending clicks of missing url");
                self.pending.finish_flush(url_id);
                return Ok(0);
            }
            Err(e) => {
                self.pending.abort_flush(url_id);
                error!(url_id, count, error = %e, "Failed to flush pending clicks");
                counter!(FLUSH_FAILURES_TOTAL).increment(1);
                return Err(e);
            }
        };
        counter!(CLICKS_FLUSHED_TOTAL).increment(count as u64);

        let campaign_id = row.campaign_id;
        let row = self.complete_if_exhausted(row).await;
        self.cache
            .put_url_settled(row, || self.pending.finish_flush(url_id));
        if let Some(campaign_id) = campaign_id {
            self.cache.invalidate_distribution(campaign_id);
        }

        debug!(url_id, count, "Flushed pending clicks");
        Ok(count)
    }

    /// Flushes every URL with pending clicks, isolating failures per URL.
    pub async fn flush_all(&self) -> FlushReport {
        let mut report = FlushReport::default();

        for (url_id, _) in self.pending.snapshot() {
            match self.flush_url(url_id).await {
                Ok(0) => {}
                Ok(count) => {
                    report.urls += 1;
                    report.clicks += count;
                }
                Err(_) => report.failures += 1,
            }
        }

        if report.urls > 0 || report.failures > 0 {
            info!(
                urls = report.urls,
                clicks = report.clicks,
                failures = report.failures,
                "Flush pass finished"
            );
        }
        report
    }

    /// Persists completion of an exhausted row and detaches it from its
    /// campaign, returning the re-read row.
    ///
    /// A failed write falls back to the background queue so the status is
    /// still corrected eventually.
    async fn complete_if_exhausted(&self, row: Url) -> Url {
        let attached = row.campaign_id.is_some();
        if !row.is_exhausted() || (row.status == UrlStatus::Completed && !attached) {
            return row;
        }

        let url_id = row.id;
        self.completions.claim(url_id);

        if let Err(e) = self.url_repository.mark_completed(url_id, true).await {
            error!(url_id, error = %e, "Failed to persist url completion");
            self.completions.release(url_id);
            self.completions.report(url_id);
            return row.with_pending(0);
        }

        info!(url_id, campaign_id = ?row.campaign_id, clicks = row.clicks, "Url completed and detached");
        if let Some(campaign_id) = row.campaign_id {
            self.cache.invalidate_members(campaign_id);
        }

        match self.url_repository.find_by_id(url_id).await {
            Ok(Some(fresh)) => fresh,
            Ok(None) | Err(_) => Url {
                campaign_id: None,
                status: UrlStatus::Completed,
                ..row
            },
        }
    }

    fn claim(&self, url_id: i64) -> Option<FlushClaim> {
        self.flushing.insert(url_id).then(|| FlushClaim {
            flushing: self.flushing.clone(),
            url_id,
        })
    }
}
