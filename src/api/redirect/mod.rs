//! Redirect response encoding, one function per [`RedirectMode`].

pub mod bridge;

use askama::Template;
use askama_web::WebTemplate;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde_json::json;

use crate::application::services::SelectedUrl;
use crate::domain::entities::RedirectMode;
use crate::error::AppError;

pub use bridge::{BridgeSigner, BridgeSignerError};

/// Name of the cookie set by [`RedirectMode::TemporaryTracked`].
pub const TRACKING_COOKIE: &str = "crv";
const TRACKING_COOKIE_MAX_AGE: u32 = 86_400;

/// HTML page that refreshes to `destination`, with a script fallback.
#[derive(Template, WebTemplate)]
#[template(path = "meta_refresh.html")]
pub struct MetaRefreshTemplate {
    pub destination: String,
}

/// Renders the response for a dispatched URL in its campaign's mode.
///
/// # Errors
///
/// Returns [`AppError::Internal`] if the stored destination is not an
/// absolute URL.
pub fn encode(selected: &SelectedUrl, bridge: &BridgeSigner) -> Result<Response, AppError> {
    let location = normalize_location(&selected.url.target)?;

    let response = match selected.campaign.redirect_mode {
        RedirectMode::Immediate => immediate(&location),
        RedirectMode::MetaRefresh => meta_refresh(location.to_string()),
        RedirectMode::DoubleMetaRefresh => meta_refresh(bridge.link(location.as_str())),
        RedirectMode::Temporary => temporary(&location),
        RedirectMode::TemporaryNoReferrer => temporary_no_referrer(&location),
        RedirectMode::TemporaryTracked => {
            temporary_tracked(&location, selected.campaign.id, selected.url.id)
        }
    };
    Ok(response)
}

/// Parses a destination into an absolute, percent-encoded URL.
///
/// # Errors
///
/// Returns [`AppError::Internal`] if `target` is not an absolute URL.
pub fn normalize_location(target: &str) -> Result<url::Url, AppError> {
    url::Url::parse(target).map_err(|e| {
        tracing::error!(destination = target, error = %e, "Stored destination is not a valid url");
        AppError::internal("Invalid destination url", json!({}))
    })
}

fn location_header(location: &url::Url) -> HeaderValue {
    // Serialized urls are ASCII, so this only fails on control characters.
    HeaderValue::from_str(location.as_str()).unwrap_or_else(|_| HeaderValue::from_static("/"))
}

fn immediate(location: &url::Url) -> Response {
    (
        StatusCode::FOUND,
        [(header::LOCATION, location_header(location))],
    )
        .into_response()
}

fn temporary(location: &url::Url) -> Response {
    (
        StatusCode::TEMPORARY_REDIRECT,
        [(header::LOCATION, location_header(location))],
    )
        .into_response()
}

fn temporary_no_referrer(location: &url::Url) -> Response {
    (
        StatusCode::TEMPORARY_REDIRECT,
        [
            (header::LOCATION, location_header(location)),
            (header::REFERRER_POLICY, HeaderValue::from_static("no-referrer")),
            (header::CACHE_CONTROL, HeaderValue::from_static("no-store")),
        ],
    )
        .into_response()
}

fn temporary_tracked(location: &url::Url, campaign_id: i64, url_id: i64) -> Response {
    let cookie = format!(
        "{TRACKING_COOKIE}={campaign_id}.{url_id}; Path=/; Max-Age={TRACKING_COOKIE_MAX_AGE}; HttpOnly; SameSite=Lax"
    );
    let mut response = temporary(location);
    let headers = response.headers_mut();
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    if let Ok(cookie) = HeaderValue::from_str(&cookie) {
        headers.insert(header::SET_COOKIE, cookie);
    }
    response
}

/// 200 HTML page refreshing to `destination`, never cached.
pub fn meta_refresh(destination: String) -> Response {
    (
        [(header::CACHE_CONTROL, HeaderValue::from_static("no-store"))],
        MetaRefreshTemplate { destination },
    )
        .into_response()
}
