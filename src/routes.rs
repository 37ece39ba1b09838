//! Top-level router configuration.
//!
//! # Route Structure
//!
//! - `GET  /redirect/{campaign_id}`           - Weighted redirect (public)
//! - `GET  /redirect/{campaign_id}/{url_id}`  - Redirect to a named URL (public)
//! - `GET  /alias/{alias}`                    - Redirect via campaign alias (public)
//! - `GET  /bridge`                           - Signed second hop of a double meta refresh
//! - `GET  /health`                           - Health check: DB, task queue, cache (public)
//! - `/api/*`                                 - Admin API (Bearer token required)
//!
//! # Middleware
//!
//! - **Tracing** - Structured request/response logging on every route
//! - **Rate limiting** - Per-IP token bucket on `/api` only
//! - **Authentication** - Admin bearer token on `/api`
//! - **Path normalization** - Trailing slash handling

use crate::api;
use crate::api::handlers::{
    alias_handler, bridge_handler, health_handler, redirect_campaign_handler,
    redirect_campaign_url_handler,
};
use crate::api::middleware::{auth, rate_limit, tracing};
use crate::state::AppState;
use axum::routing::get;
use axum::{Router, middleware};
use tower::Layer;
use tower_http::normalize_path::{NormalizePath, NormalizePathLayer};

/// Constructs the application router with all routes and middleware.
///
/// # Arguments
///
/// - `state` - shared application state injected into all handlers
/// - `behind_proxy` - when `true`, rate limiting reads client IP from
///   `X-Forwarded-For` / `X-Real-IP` headers instead of the peer socket address;
///   enable only when the service runs behind a trusted reverse proxy
pub fn app_router(state: AppState, behind_proxy: bool) -> NormalizePath<Router> {
    let api_router = api::routes::protected_routes()
        .route_layer(middleware::from_fn_with_state(state.clone(), auth::layer))
        .layer(rate_limit::admin_layer(behind_proxy));

    let router = Router::new()
        .route("/redirect/{campaign_id}", get(redirect_campaign_handler))
        .route(
            "/redirect/{campaign_id}/{url_id}",
            get(redirect_campaign_url_handler),
        )
        .route("/alias/{alias}", get(alias_handler))
        .route("/bridge", get(bridge_handler))
        .route("/health", get(health_handler))
        .nest("/api", api_router)
        .with_state(state)
        .layer(tracing::layer());

    NormalizePathLayer::trim_trailing_slash().layer(router)
}
