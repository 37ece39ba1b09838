//! Request-path entry point: campaign lookup, weighted pick, click, hit log.

use std::sync::Arc;

use chrono::{FixedOffset, Utc};
use serde_json::json;
use tracing::{debug, error};

use super::click_accountant::ClickAccountant;
use crate::domain::background_task::{BackgroundTask, TaskQueue};
use crate::domain::entities::{Campaign, Url};
use crate::domain::hit_event::HitEvent;
use crate::error::AppError;
use crate::infrastructure::cache::EntityCache;

/// Why a dispatch produced no redirect.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    /// Campaign, alias or URL is absent, deleted or mismatched.
    #[error("campaign or url not found")]
    NotFound,
    /// The campaign has no URL with remaining quota.
    #[error("no url with remaining clicks")]
    Exhausted,
    /// The chosen URL's stored target cannot be redirected to.
    #[error("url {0} has an invalid destination")]
    InvalidDestination(i64),
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),
}

impl From<AppError> for DispatchError {
    fn from(e: AppError) -> Self {
        DispatchError::StoreUnavailable(e.to_string())
    }
}

impl From<DispatchError> for AppError {
    fn from(e: DispatchError) -> Self {
        match e {
            DispatchError::NotFound => AppError::not_found("Campaign or url not found", json!({})),
            DispatchError::Exhausted => {
                AppError::gone("No url with remaining clicks", json!({}))
            }
            DispatchError::InvalidDestination(_) => {
                AppError::internal("Invalid destination url", json!({}))
            }
            DispatchError::StoreUnavailable(reason) => {
                error!(reason = %reason, "Dispatch failed");
                AppError::internal("Store unavailable", json!({}))
            }
        }
    }
}

/// What an incoming redirect request names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchTarget {
    Campaign(i64),
    /// A specific URL, which must belong to the campaign.
    CampaignUrl { campaign_id: i64, url_id: i64 },
    Alias(String),
}

/// A successful dispatch: the campaign and the URL as observed after the
/// click was counted.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectedUrl {
    pub campaign: Campaign,
    pub url: Url,
}

pub struct Dispatcher {
    cache: Arc<EntityCache>,
    accountant: ClickAccountant,
    queue: TaskQueue,
    reporting_tz: FixedOffset,
}

impl Dispatcher {
    pub fn new(
        cache: Arc<EntityCache>,
        accountant: ClickAccountant,
        queue: TaskQueue,
        reporting_tz: FixedOffset,
    ) -> Self {
        Self {
            cache,
            accountant,
            queue,
            reporting_tz,
        }
    }

    /// Resolves a target to a URL, counts one click and hands the hit log
    /// append to the background queue.
    ///
    /// A named URL that is still attached but no longer dispatchable falls
    /// back to weighted selection within the campaign. The chosen target is
    /// parsed before the click is counted.
    ///
    /// # Errors
    ///
    /// - [`DispatchError::NotFound`] if the campaign/alias does not exist or
    ///   the named URL is detached or belongs to another campaign
    /// - [`DispatchError::Exhausted`] if no URL has remaining quota
    /// - [`DispatchError::InvalidDestination`] if the chosen target is not an
    ///   absolute url; no click is counted
    /// - [`DispatchError::StoreUnavailable`] if a cache miss could not be
    ///   served from the store
    pub async fn resolve(&self, target: &DispatchTarget) -> Result<SelectedUrl, DispatchError> {
        let (campaign, chosen) = match target {
            DispatchTarget::Campaign(id) => (self.campaign(*id).await?, None),
            DispatchTarget::Alias(alias) => {
                let campaign = self
                    .cache
                    .campaign_by_alias(alias)
                    .await?
                    .ok_or(DispatchError::NotFound)?;
                (campaign, None)
            }
            DispatchTarget::CampaignUrl {
                campaign_id,
                url_id,
            } => {
                let campaign = self.campaign(*campaign_id).await?;
                let url = self
                    .cache
                    .url(*url_id)
                    .await?
                    .ok_or(DispatchError::NotFound)?;
                if url.campaign_id != Some(campaign.id) {
                    return Err(DispatchError::NotFound);
                }
                let named = url.is_dispatchable().then_some(url);
                (campaign, named)
            }
        };

        let chosen = match chosen {
            Some(url) => url,
            None => self.pick(campaign.id).await?,
        };

        if let Err(e) = chosen.destination() {
            error!(url_id = chosen.id, target = %chosen.target, error = %e, "Stored destination is not a valid url");
            return Err(DispatchError::InvalidDestination(chosen.id));
        }

        let url = self.accountant.increment(chosen.id).await?;
        self.queue.submit(BackgroundTask::RecordHit(HitEvent::new(
            url.id,
            campaign.id,
            Utc::now(),
            self.reporting_tz,
        )));

        debug!(campaign_id = campaign.id, url_id = url.id, clicks = url.clicks, "Dispatched");
        Ok(SelectedUrl { campaign, url })
    }

    async fn campaign(&self, id: i64) -> Result<Campaign, DispatchError> {
        self.cache
            .campaign(id)
            .await?
            .filter(|campaign| !campaign.is_deleted())
            .ok_or(DispatchError::NotFound)
    }

    async fn pick(&self, campaign_id: i64) -> Result<Url, DispatchError> {
        let index = self.cache.distribution(campaign_id).await?;
        let mut rng = rand::rng();
        index.pick(&mut rng).cloned().ok_or(DispatchError::Exhausted)
    }
}
