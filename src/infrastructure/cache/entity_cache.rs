//! In-process read-through cache for the dispatch hot path.

use std::sync::Arc;

use dashmap::DashMap;
use metrics::counter;
use tracing::{debug, warn};

use super::entry::{CacheEntry, CacheTtl};
use crate::domain::completion_tracker::CompletionTracker;
use crate::domain::distribution::DistributionIndex;
use crate::domain::entities::{Campaign, Url, UrlStatus};
use crate::domain::pending_clicks::PendingClicks;
use crate::domain::repositories::{CampaignRepository, UrlRepository};
use crate::error::AppError;

const CACHE_HITS_TOTAL: &str = "cache_hits_total";
const CACHE_MISSES_TOTAL: &str = "cache_misses_total";

/// Entry counts per tier, reported by the health endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    pub urls: usize,
    pub campaigns: usize,
    pub aliases: usize,
    pub distributions: usize,
}

/// Read-through cache over campaigns, URLs, alias paths and the derived
/// per-campaign distribution index.
///
/// URL entries hold the last persisted row; readers get that row with the
/// unflushed pending clicks added on top, so nobody observes a count older
/// than their own in-flight increments. Every tier obeys the same
/// [`CacheTtl`].
///
/// Tiers:
/// - `urls`: url id → persisted row
/// - `campaigns`: campaign id → campaign
/// - `aliases`: alias path → campaign id
/// - `members`: campaign id → ids of its attached URLs, in insertion order
/// - `distributions`: campaign id → weighted index built from `members`
pub struct EntityCache {
    ttl: CacheTtl,
    urls: DashMap<i64, CacheEntry<Url>>,
    campaigns: DashMap<i64, CacheEntry<Campaign>>,
    aliases: DashMap<String, CacheEntry<i64>>,
    members: DashMap<i64, CacheEntry<Vec<i64>>>,
    distributions: DashMap<i64, CacheEntry<Arc<DistributionIndex>>>,
    pending: PendingClicks,
    completions: Arc<CompletionTracker>,
    campaign_repository: Arc<dyn CampaignRepository>,
    url_repository: Arc<dyn UrlRepository>,
}

impl EntityCache {
    pub fn new(
        ttl: CacheTtl,
        pending: PendingClicks,
        completions: Arc<CompletionTracker>,
        campaign_repository: Arc<dyn CampaignRepository>,
        url_repository: Arc<dyn UrlRepository>,
    ) -> Self {
        Self {
            ttl,
            urls: DashMap::new(),
            campaigns: DashMap::new(),
            aliases: DashMap::new(),
            members: DashMap::new(),
            distributions: DashMap::new(),
            pending,
            completions,
            campaign_repository,
            url_repository,
        }
    }

    pub fn ttl(&self) -> CacheTtl {
        self.ttl
    }

    // ── Campaigns ──────────────────────────────────────────────────────────

    /// Returns a live campaign, loading it on miss.
    ///
    /// # Errors
    ///
    /// Propagates store errors from the load.
    pub async fn campaign(&self, id: i64) -> Result<Option<Campaign>, AppError> {
        if let Some(campaign) = self.fresh(&self.campaigns, &id, "campaign") {
            return Ok(Some(campaign));
        }

        let loaded = self.campaign_repository.find_by_id(id).await?;
        match &loaded {
            Some(campaign) => self.put_campaign(campaign.clone()),
            None => {
                self.campaigns.remove(&id);
            }
        }
        Ok(loaded)
    }

    /// Resolves an alias path to its live campaign, loading it on miss.
    ///
    /// # Errors
    ///
    /// Propagates store errors from the load.
    pub async fn campaign_by_alias(&self, alias: &str) -> Result<Option<Campaign>, AppError> {
        if let Some(id) = self.fresh(&self.aliases, alias, "alias")
            && let Some(campaign) = self.campaign(id).await?
            && campaign.alias.as_deref() == Some(alias)
        {
            return Ok(Some(campaign));
        }

        self.aliases.remove(alias);
        let loaded = self.campaign_repository.find_by_alias(alias).await?;
        if let Some(campaign) = &loaded {
            self.put_campaign(campaign.clone());
        }
        Ok(loaded)
    }

    fn put_campaign(&self, campaign: Campaign) {
        if let Some(alias) = &campaign.alias {
            self.aliases
                .insert(alias.clone(), CacheEntry::new(campaign.id));
        }
        self.campaigns.insert(campaign.id, CacheEntry::new(campaign));
    }

    // ── URLs ───────────────────────────────────────────────────────────────

    /// Returns a URL with pending clicks applied, loading it on miss.
    ///
    /// # Errors
    ///
    /// Propagates store errors from the load.
    pub async fn url(&self, id: i64) -> Result<Option<Url>, AppError> {
        if let Some(url) = self.fresh(&self.urls, &id, "url") {
            return Ok(Some(self.view(&url)));
        }

        let generation = self.pending.generation();
        let loaded = self.url_repository.find_by_id(id).await?;
        Ok(loaded.map(|url| {
            let view = self.loaded_view(&url);
            self.put_loaded_url(url, generation);
            view
        }))
    }

    /// The cached persisted row if it is still fresh. Never touches the store.
    pub fn fresh_url(&self, id: i64) -> Option<Url> {
        self.fresh(&self.urls, &id, "url")
    }

    /// Runs `f` on the fresh cached row while holding its entry lock.
    ///
    /// Pending-counter updates made inside `f` cannot interleave with
    /// [`Self::put_url_settled`] for the same URL, so the persisted base and
    /// the pending overlay are always read as a consistent pair. `f` must not
    /// touch the URL tier.
    pub fn with_fresh_url<R>(&self, id: i64, f: impl FnOnce(&Url) -> R) -> Option<R> {
        let entry = self.urls.get(&id);
        match entry {
            Some(entry) if entry.is_fresh(self.ttl) => {
                counter!(CACHE_HITS_TOTAL, "tier" => "url").increment(1);
                Some(f(&entry.value))
            }
            _ => {
                counter!(CACHE_MISSES_TOTAL, "tier" => "url").increment(1);
                None
            }
        }
    }

    /// Stores a row read while no click batch was in flight.
    pub fn put_url(&self, url: Url) {
        self.urls.insert(url.id, CacheEntry::new(url));
    }

    /// Stores a row read from the store after `generation` was taken, unless
    /// a flush of that URL overlapped the read. Such a row may already hold
    /// the in-flight batch, so caching it would count that batch twice; the
    /// flush caches its own returned row instead.
    fn put_loaded_url(&self, url: Url, generation: u64) {
        let slot = self.urls.entry(url.id);
        if self.pending.is_current(url.id, generation) {
            slot.insert(CacheEntry::new(url));
        } else {
            debug!(url_id = url.id, "Skipping cache fill overlapping a flush");
        }
    }

    /// Stores a row that already includes flushed clicks and runs `settle`
    /// under the same entry lock, so readers never count those clicks twice.
    pub fn put_url_settled(&self, url: Url, settle: impl FnOnce()) {
        let slot = self.urls.entry(url.id);
        settle();
        slot.insert(CacheEntry::new(url));
    }

    /// Flips the cached row to completed without refreshing its timestamp.
    pub fn mark_url_completed(&self, id: i64) {
        if let Some(mut entry) = self.urls.get_mut(&id) {
            entry.value.status = UrlStatus::Completed;
        }
    }

    /// All URLs attached to a campaign, with pending clicks applied.
    ///
    /// Served from memory when the membership list and every member row are
    /// fresh; otherwise the whole list is reloaded in one store query.
    ///
    /// # Errors
    ///
    /// Propagates store errors from the reload.
    pub async fn campaign_urls(&self, campaign_id: i64) -> Result<Vec<Url>, AppError> {
        if let Some(ids) = self.fresh(&self.members, &campaign_id, "members") {
            let cached: Option<Vec<Url>> = ids.iter().map(|id| self.fresh_url(*id)).collect();
            if let Some(urls) = cached {
                return Ok(urls.iter().map(|url| self.view(url)).collect());
            }
        }

        let generation = self.pending.generation();
        let loaded = self.url_repository.list_by_campaign(campaign_id).await?;
        let ids = loaded.iter().map(|url| url.id).collect();
        let views = loaded.iter().map(|url| self.loaded_view(url)).collect();
        for url in loaded {
            self.put_loaded_url(url, generation);
        }
        self.members.insert(campaign_id, CacheEntry::new(ids));
        Ok(views)
    }

    /// The campaign's weighted distribution index, rebuilt lazily after
    /// invalidation.
    ///
    /// # Errors
    ///
    /// Propagates store errors from a membership reload.
    pub async fn distribution(&self, campaign_id: i64) -> Result<Arc<DistributionIndex>, AppError> {
        if let Some(index) = self.fresh(&self.distributions, &campaign_id, "distribution") {
            return Ok(index);
        }

        let urls = self.campaign_urls(campaign_id).await?;
        let index = Arc::new(DistributionIndex::build(&urls));
        self.distributions
            .insert(campaign_id, CacheEntry::new(index.clone()));
        Ok(index)
    }

    /// Cached row plus every unflushed click. An exhausted URL whose stored
    /// status is not yet completed is presented as completed and its
    /// correction is reported once.
    fn view(&self, url: &Url) -> Url {
        self.overlay(url, self.pending.get(url.id))
    }

    /// Row just read from the store plus queued clicks only; an in-flight
    /// batch may already be part of it.
    fn loaded_view(&self, url: &Url) -> Url {
        self.overlay(url, self.pending.queued(url.id))
    }

    fn overlay(&self, url: &Url, pending: i64) -> Url {
        let view = url.with_pending(pending);
        if view.status == UrlStatus::Completed && url.status != UrlStatus::Completed {
            self.completions.report(url.id);
        }
        view
    }

    // ── Invalidation ───────────────────────────────────────────────────────

    /// Drops a campaign, its membership list, its distribution index and
    /// every alias entry pointing at it.
    pub fn invalidate_campaign(&self, campaign_id: i64) {
        self.campaigns.remove(&campaign_id);
        self.members.remove(&campaign_id);
        self.distributions.remove(&campaign_id);
        self.aliases.retain(|_, entry| entry.value != campaign_id);
        debug!(campaign_id, "Cache INVALIDATE campaign");
    }

    /// Drops the derived index only; remaining-click weights changed but
    /// membership did not.
    pub fn invalidate_distribution(&self, campaign_id: i64) {
        self.distributions.remove(&campaign_id);
    }

    /// Drops membership and index after URLs were attached or detached.
    pub fn invalidate_members(&self, campaign_id: i64) {
        self.members.remove(&campaign_id);
        self.distributions.remove(&campaign_id);
    }

    /// Drops a URL and cascades to every campaign that may list it.
    ///
    /// The owning campaign comes from the evicted entry, any membership list
    /// containing the id, and a best-effort store lookup. A failed lookup is
    /// logged, not returned.
    pub async fn invalidate_url(&self, url_id: i64) {
        let mut owners: Vec<i64> = Vec::new();

        if let Some((_, entry)) = self.urls.remove(&url_id)
            && let Some(campaign_id) = entry.value.campaign_id
        {
            owners.push(campaign_id);
        }

        owners.extend(
            self.members
                .iter()
                .filter(|entry| entry.value.contains(&url_id))
                .map(|entry| *entry.key()),
        );

        match self.url_repository.find_by_id(url_id).await {
            Ok(Some(url)) => owners.extend(url.campaign_id),
            Ok(None) => {}
            Err(e) => warn!(url_id, error = %e, "Owner lookup failed during url invalidation"),
        }

        self.completions.release(url_id);

        owners.sort_unstable();
        owners.dedup();
        for campaign_id in owners {
            self.invalidate_campaign(campaign_id);
        }
        debug!(url_id, "Cache INVALIDATE url");
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            urls: self.urls.len(),
            campaigns: self.campaigns.len(),
            aliases: self.aliases.len(),
            distributions: self.distributions.len(),
        }
    }

    fn fresh<K, Q, V>(&self, tier: &DashMap<K, CacheEntry<V>>, key: &Q, name: &'static str) -> Option<V>
    where
        K: std::hash::Hash + Eq + std::borrow::Borrow<Q>,
        Q: std::hash::Hash + Eq + ?Sized,
        V: Clone,
    {
        let hit = tier
            .get(key)
            .filter(|entry| entry.is_fresh(self.ttl))
            .map(|entry| entry.value.clone());

        if hit.is_some() {
            counter!(CACHE_HITS_TOTAL, "tier" => name).increment(1);
        } else {
            counter!(CACHE_MISSES_TOTAL, "tier" => name).increment(1);
        }
        hit
    }
}
