//! Admin API route configuration.
//!
//! All routes here require the admin bearer token via
//! [`crate::api::middleware::auth`]; the layer is applied in
//! [`crate::routes::app_router`].

use crate::api::handlers::{
    click_protection_handler, delete_campaign_handler, edit_original_limit_handler,
    flush_handler, hourly_hits_handler, invalidate_campaign_cache_handler,
    invalidate_url_cache_handler, multiplier_handler, quota_sync_handler,
};
use crate::state::AppState;
use axum::{
    Router,
    routing::{delete, get, post, put},
};

/// Admin routes, protected by Bearer token authentication.
///
/// # Endpoints
///
/// - `DELETE /cache/campaigns/{id}`             - Invalidate a cached campaign
/// - `DELETE /cache/urls/{id}`                  - Invalidate a cached URL
/// - `PUT    /click-protection`                 - Open/close the protection bypass
/// - `POST   /flush`                            - Flush pending clicks now
/// - `PUT    /campaigns/{id}/multiplier`        - Change a campaign's multiplier
/// - `DELETE /campaigns/{id}`                   - Soft-delete a campaign
/// - `GET    /campaigns/{id}/hits`              - Hourly hits for a reporting day
/// - `PUT    /urls/{id}/original-click-limit`   - Authorized quota edit
/// - `POST   /urls/{id}/quota-sync`             - Automated quota resync
pub fn protected_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/cache/campaigns/{id}",
            delete(invalidate_campaign_cache_handler),
        )
        .route("/cache/urls/{id}", delete(invalidate_url_cache_handler))
        .route("/click-protection", put(click_protection_handler))
        .route("/flush", post(flush_handler))
        .route("/campaigns/{id}", delete(delete_campaign_handler))
        .route("/campaigns/{id}/multiplier", put(multiplier_handler))
        .route("/campaigns/{id}/hits", get(hourly_hits_handler))
        .route(
            "/urls/{id}/original-click-limit",
            put(edit_original_limit_handler),
        )
        .route("/urls/{id}/quota-sync", post(quota_sync_handler))
}
