//! Handlers for the admin endpoints under `/api`.
//!
//! These are the hooks the campaign management layer calls after writing
//! campaigns and URLs, plus the quota maintenance operations.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use validator::Validate;

use crate::api::dto::admin::{
    CampaignDeletedResponse, ClickProtectionRequest, ClickProtectionResponse, FlushResponse,
    MultiplierRequest, MultiplierResponse, OriginalClickLimitRequest, UrlQuotaResponse,
};
use crate::error::AppError;
use crate::state::AppState;

/// Drops every cached entry derived from a campaign.
///
/// # Endpoint
///
/// `DELETE /api/cache/campaigns/{id}`
///
/// Idempotent: invalidating an uncached or unknown campaign is a no-op.
///
/// # Response
///
/// **204 No Content**
pub async fn invalidate_campaign_cache_handler(
    Path(campaign_id): Path<i64>,
    State(state): State<AppState>,
) -> StatusCode {
    state.cache.invalidate_campaign(campaign_id);
    tracing::info!(campaign_id, "Campaign cache invalidated");
    StatusCode::NO_CONTENT
}

/// Drops a cached URL and the distributions of the campaigns it belongs to.
///
/// # Endpoint
///
/// `DELETE /api/cache/urls/{id}`
///
/// # Response
///
/// **204 No Content**
pub async fn invalidate_url_cache_handler(
    Path(url_id): Path<i64>,
    State(state): State<AppState>,
) -> StatusCode {
    state.cache.invalidate_url(url_id).await;
    tracing::info!(url_id, "Url cache invalidated");
    StatusCode::NO_CONTENT
}

/// Opens or closes the click protection bypass.
///
/// # Endpoint
///
/// `PUT /api/click-protection`
///
/// # Request Body
///
/// ```json
/// { "enabled": true }
/// ```
///
/// # Response
///
/// ```json
/// { "bypassed": true }
/// ```
///
/// Closing the explicit bypass does not close scoped bypasses still held
/// by in-flight authorized edits, so `bypassed` may stay `true`.
pub async fn click_protection_handler(
    State(state): State<AppState>,
    Json(payload): Json<ClickProtectionRequest>,
) -> Json<ClickProtectionResponse> {
    let bypassed = state.protection.set_bypass(payload.enabled);
    Json(ClickProtectionResponse { bypassed })
}

/// Writes every pending click to the store now.
///
/// # Endpoint
///
/// `POST /api/flush`
///
/// # Response
///
/// ```json
/// { "urls": 3, "clicks": 41, "failures": 0, "pending": 0 }
/// ```
pub async fn flush_handler(State(state): State<AppState>) -> Json<FlushResponse> {
    let report = state.accountant.flush_all().await;
    Json(FlushResponse {
        report,
        pending: state.accountant.pending().total(),
    })
}

/// Changes a campaign's multiplier and recomputes its URLs' click limits.
///
/// # Endpoint
///
/// `PUT /api/campaigns/{id}/multiplier`
///
/// # Request Body
///
/// ```json
/// { "multiplier": 1.5 }
/// ```
///
/// # Errors
///
/// - **400 Bad Request**: Multiplier below 0.01
/// - **404 Not Found**: Unknown or deleted campaign
pub async fn multiplier_handler(
    Path(campaign_id): Path<i64>,
    State(state): State<AppState>,
    Json(payload): Json<MultiplierRequest>,
) -> Result<Json<MultiplierResponse>, AppError> {
    payload.validate()?;

    let urls = state
        .quota_service
        .apply_multiplier(campaign_id, payload.multiplier)
        .await?;

    Ok(Json(MultiplierResponse {
        campaign_id,
        multiplier: payload.multiplier,
        urls: urls.into_iter().map(UrlQuotaResponse::from).collect(),
    }))
}

/// Soft-deletes a campaign and detaches its URLs.
///
/// # Endpoint
///
/// `DELETE /api/campaigns/{id}`
///
/// # Errors
///
/// - **404 Not Found**: Unknown or already deleted campaign
pub async fn delete_campaign_handler(
    Path(campaign_id): Path<i64>,
    State(state): State<AppState>,
) -> Result<Json<CampaignDeletedResponse>, AppError> {
    let detached_url_ids = state.quota_service.soft_delete_campaign(campaign_id).await?;

    Ok(Json(CampaignDeletedResponse {
        campaign_id,
        detached_url_ids,
    }))
}

/// Authorized edit of a URL's original click limit.
///
/// # Endpoint
///
/// `PUT /api/urls/{id}/original-click-limit`
///
/// # Request Body
///
/// ```json
/// { "original_click_limit": 500 }
/// ```
///
/// The write runs inside a scoped bypass, so it always persists.
///
/// # Errors
///
/// - **400 Bad Request**: Limit below 1
/// - **404 Not Found**: Unknown URL
pub async fn edit_original_limit_handler(
    Path(url_id): Path<i64>,
    State(state): State<AppState>,
    Json(payload): Json<OriginalClickLimitRequest>,
) -> Result<Json<UrlQuotaResponse>, AppError> {
    payload.validate()?;

    let url = state
        .quota_service
        .edit_original_limit(url_id, payload.original_click_limit)
        .await?;

    Ok(Json(url.into()))
}

/// Automated quota resynchronization of one URL.
///
/// # Endpoint
///
/// `POST /api/urls/{id}/quota-sync`
///
/// # Request Body
///
/// ```json
/// { "original_click_limit": 500 }
/// ```
///
/// Unless click protection is bypassed, the original limit is kept and only
/// the effective limit is recomputed. The response shows the persisted
/// values.
///
/// # Errors
///
/// - **400 Bad Request**: Limit below 1
/// - **404 Not Found**: Unknown URL
pub async fn quota_sync_handler(
    Path(url_id): Path<i64>,
    State(state): State<AppState>,
    Json(payload): Json<OriginalClickLimitRequest>,
) -> Result<Json<UrlQuotaResponse>, AppError> {
    payload.validate()?;

    let url = state
        .quota_service
        .sync_original_limit(url_id, payload.original_click_limit)
        .await?;

    Ok(Json(url.into()))
}
