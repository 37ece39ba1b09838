//! DTOs for the admin endpoints.

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::application::services::FlushReport;
use crate::domain::entities::{Url, UrlStatus};

/// Request body for `PUT /api/click-protection`.
#[derive(Debug, Deserialize)]
pub struct ClickProtectionRequest {
    /// `true` opens the bypass window, `false` closes it.
    pub enabled: bool,
}

#[derive(Debug, Serialize)]
pub struct ClickProtectionResponse {
    /// Whether any bypass (explicit or scoped) is currently open.
    pub bypassed: bool,
}

/// Request body for `PUT /api/campaigns/{id}/multiplier`.
#[derive(Debug, Deserialize, Validate)]
pub struct MultiplierRequest {
    #[validate(range(min = 0.01, message = "Multiplier must be at least 0.01"))]
    pub multiplier: f64,
}

/// Request body for the quota rewrite endpoints.
#[derive(Debug, Deserialize, Validate)]
pub struct OriginalClickLimitRequest {
    #[validate(range(min = 1, message = "Click limit must be positive"))]
    pub original_click_limit: i64,
}

/// A URL's quota state after an admin write.
#[derive(Debug, Serialize)]
pub struct UrlQuotaResponse {
    pub id: i64,
    pub campaign_id: Option<i64>,
    pub click_limit: i64,
    pub original_click_limit: i64,
    pub clicks: i64,
    pub remaining_clicks: i64,
    pub status: UrlStatus,
}

impl From<Url> for UrlQuotaResponse {
    fn from(url: Url) -> Self {
        Self {
            id: url.id,
            campaign_id: url.campaign_id,
            click_limit: url.click_limit,
            original_click_limit: url.original_click_limit,
            clicks: url.clicks,
            remaining_clicks: url.remaining_clicks(),
            status: url.effective_status(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MultiplierResponse {
    pub campaign_id: i64,
    pub multiplier: f64,
    pub urls: Vec<UrlQuotaResponse>,
}

#[derive(Debug, Serialize)]
pub struct CampaignDeletedResponse {
    pub campaign_id: i64,
    pub detached_url_ids: Vec<i64>,
}

#[derive(Debug, Serialize)]
pub struct FlushResponse {
    #[serde(flatten)]
    pub report: FlushReport,
    /// Clicks still pending after the pass (failed URLs and late arrivals).
    pub pending: i64,
}
