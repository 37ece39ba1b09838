//! Handlers for the public redirect endpoints.

use axum::{
    extract::{Path, Query, State},
    response::Response,
};
use serde_json::json;
use tracing::debug;

use crate::api::dto::bridge::BridgeQuery;
use crate::api::redirect;
use crate::application::services::DispatchTarget;
use crate::error::AppError;
use crate::state::AppState;

async fn dispatch(state: &AppState, target: DispatchTarget) -> Result<Response, AppError> {
    let selected = state.dispatcher.resolve(&target).await?;
    debug!(
        campaign_id = selected.campaign.id,
        url_id = selected.url.id,
        mode = %selected.campaign.redirect_mode,
        "Dispatched"
    );
    redirect::encode(&selected, &state.bridge)
}

/// Redirects to a URL picked by weight from a campaign.
///
/// # Endpoint
///
/// `GET /redirect/{campaign_id}`
///
/// # Response
///
/// Depends on the campaign's redirect mode: `302`/`307` with `Location`, or a
/// `200` HTML page that refreshes to the destination.
///
/// # Errors
///
/// - **404 Not Found**: Unknown or deleted campaign
/// - **410 Gone**: No URL in the campaign has remaining quota
/// - **500 Internal Server Error**: Store unavailable on a cache miss
pub async fn redirect_campaign_handler(
    Path(campaign_id): Path<i64>,
    State(state): State<AppState>,
) -> Result<Response, AppError> {
    dispatch(&state, DispatchTarget::Campaign(campaign_id)).await
}

/// Redirects to a specific URL of a campaign.
///
/// # Endpoint
///
/// `GET /redirect/{campaign_id}/{url_id}`
///
/// A URL that is exhausted or detached falls back to weighted selection
/// within the campaign.
///
/// # Errors
///
/// - **404 Not Found**: Unknown campaign or URL, or the URL belongs to a
///   different campaign
/// - **410 Gone**: No URL in the campaign has remaining quota
pub async fn redirect_campaign_url_handler(
    Path((campaign_id, url_id)): Path<(i64, i64)>,
    State(state): State<AppState>,
) -> Result<Response, AppError> {
    dispatch(
        &state,
        DispatchTarget::CampaignUrl {
            campaign_id,
            url_id,
        },
    )
    .await
}

/// Redirects through a campaign's alias path.
///
/// # Endpoint
///
/// `GET /alias/{alias}`
///
/// # Errors
///
/// - **404 Not Found**: No live campaign has this alias
/// - **410 Gone**: No URL in the campaign has remaining quota
pub async fn alias_handler(
    Path(alias): Path<String>,
    State(state): State<AppState>,
) -> Result<Response, AppError> {
    dispatch(&state, DispatchTarget::Alias(alias)).await
}

/// Second hop of a double meta refresh.
///
/// # Endpoint
///
/// `GET /bridge?to=<destination>&sig=<hex hmac>`
///
/// Renders a meta refresh page to `to`. No click is counted here; the click
/// was counted when the first page was served.
///
/// # Errors
///
/// - **404 Not Found**: Missing or invalid signature
pub async fn bridge_handler(
    Query(query): Query<BridgeQuery>,
    State(state): State<AppState>,
) -> Result<Response, AppError> {
    if !state.bridge.verify(&query.to, &query.sig) {
        debug!("Rejected bridge request with invalid signature");
        return Err(AppError::not_found("Not found", json!({})));
    }

    let location = redirect::normalize_location(&query.to)?;
    Ok(redirect::meta_refresh(location.to_string()))
}
