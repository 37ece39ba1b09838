//! Quota maintenance paths that run outside redirect traffic.

use std::sync::Arc;

use serde_json::json;
use tracing::info;

use crate::domain::click_protection::ClickProtection;
use crate::domain::entities::{MIN_MULTIPLIER, Url, effective_click_limit};
use crate::domain::repositories::{CampaignRepository, UrlRepository};
use crate::error::AppError;
use crate::infrastructure::cache::EntityCache;

/// Rewrites `click_limit` and `original_click_limit` on behalf of admin
/// actions and synchronization jobs, invalidating the cache after each
/// write.
///
/// Never touches `clicks`.
pub struct QuotaService {
    campaign_repository: Arc<dyn CampaignRepository>,
    url_repository: Arc<dyn UrlRepository>,
    cache: Arc<EntityCache>,
    protection: ClickProtection,
}

impl QuotaService {
    pub fn new(
        campaign_repository: Arc<dyn CampaignRepository>,
        url_repository: Arc<dyn UrlRepository>,
        cache: Arc<EntityCache>,
        protection: ClickProtection,
    ) -> Self {
        Self {
            campaign_repository,
            url_repository,
            cache,
            protection,
        }
    }

    pub fn protection(&self) -> &ClickProtection {
        &self.protection
    }

    /// Changes a campaign's multiplier and recomputes the effective limit of
    /// every attached URL. `original_click_limit` is left as entered.
    ///
    /// # Errors
    ///
    /// - [`AppError::Validation`] if `multiplier` is below 0.01 or not finite
    /// - [`AppError::NotFound`] if the campaign does not exist
    pub async fn apply_multiplier(
        &self,
        campaign_id: i64,
        multiplier: f64,
    ) -> Result<Vec<Url>, AppError> {
        if !multiplier.is_finite() || multiplier < MIN_MULTIPLIER {
            return Err(AppError::bad_request(
                "Multiplier must be at least 0.01",
                json!({ "multiplier": multiplier }),
            ));
        }

        if !self
            .campaign_repository
            .update_multiplier(campaign_id, multiplier)
            .await?
        {
            return Err(campaign_not_found(campaign_id));
        }

        let mut updated = Vec::new();
        for url in self.url_repository.list_by_campaign(campaign_id).await? {
            let click_limit = effective_click_limit(url.original_click_limit, multiplier);
            if click_limit == url.click_limit {
                updated.push(url);
                continue;
            }
            let original = self.protection.guard_original_limit(
                url.id,
                url.original_click_limit,
                url.original_click_limit,
            );
            if let Some(url) = self
                .url_repository
                .update_click_limits(url.id, click_limit, original)
                .await?
            {
                updated.push(url);
            }
        }

        self.cache.invalidate_campaign(campaign_id);
        for url in &updated {
            self.cache.invalidate_url(url.id).await;
        }

        info!(campaign_id, multiplier, urls = updated.len(), "Applied campaign multiplier");
        Ok(updated)
    }

    /// Automated rewrite of a URL's quota, e.g. from an upstream budget sync.
    ///
    /// While click protection is active the `original_click_limit` change is
    /// reverted and only the derived `click_limit` is recomputed.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::NotFound`] if the URL does not exist.
    pub async fn sync_original_limit(&self, url_id: i64, attempted: i64) -> Result<Url, AppError> {
        self.rewrite_original_limit(url_id, attempted).await
    }

    /// Authorized edit of a URL's quota. Runs inside a bypass window so the
    /// new `original_click_limit` is persisted.
    ///
    /// # Errors
    ///
    /// - [`AppError::Validation`] if `value` is not positive
    /// - [`AppError::NotFound`] if the URL does not exist
    pub async fn edit_original_limit(&self, url_id: i64, value: i64) -> Result<Url, AppError> {
        if value < 1 {
            return Err(AppError::bad_request(
                "Click limit must be positive",
                json!({ "original_click_limit": value }),
            ));
        }

        let _bypass = self.protection.bypass();
        self.rewrite_original_limit(url_id, value).await
    }

    async fn rewrite_original_limit(&self, url_id: i64, attempted: i64) -> Result<Url, AppError> {
        let url = self
            .url_repository
            .find_by_id(url_id)
            .await?
            .ok_or_else(|| url_not_found(url_id))?;

        let original =
            self.protection
                .guard_original_limit(url.id, url.original_click_limit, attempted);
        let multiplier = match url.campaign_id {
            Some(campaign_id) => self
                .campaign_repository
                .find_by_id(campaign_id)
                .await?
                .map_or(1.0, |campaign| campaign.multiplier),
            None => 1.0,
        };
        let click_limit = effective_click_limit(original, multiplier);

        let updated = self
            .url_repository
            .update_click_limits(url.id, click_limit, original)
            .await?
            .ok_or_else(|| url_not_found(url_id))?;
        self.cache.invalidate_url(url_id).await;

        info!(
            url_id,
            original_click_limit = updated.original_click_limit,
            click_limit = updated.click_limit,
            "Rewrote url quota"
        );
        Ok(updated)
    }

    /// Soft-deletes a campaign, detaching its URLs. Returns the detached ids.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::NotFound`] if the campaign does not exist or is
    /// already deleted.
    pub async fn soft_delete_campaign(&self, campaign_id: i64) -> Result<Vec<i64>, AppError> {
        let detached = self
            .campaign_repository
            .soft_delete(campaign_id)
            .await?
            .ok_or_else(|| campaign_not_found(campaign_id))?;

        self.cache.invalidate_campaign(campaign_id);
        for url_id in &detached {
            self.cache.invalidate_url(*url_id).await;
        }

        info!(campaign_id, detached = detached.len(), "Campaign deleted");
        Ok(detached)
    }
}

fn campaign_not_found(campaign_id: i64) -> AppError {
    AppError::not_found("Campaign not found", json!({ "campaign_id": campaign_id }))
}

fn url_not_found(url_id: i64) -> AppError {
    AppError::not_found("Url not found", json!({ "url_id": url_id }))
}
