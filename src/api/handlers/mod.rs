//! HTTP request handlers for API endpoints.
//!
//! Each handler module corresponds to a logical grouping of endpoints.

pub mod admin;
pub mod health;
pub mod hits;
pub mod redirect;

pub use admin::{
    click_protection_handler, delete_campaign_handler, edit_original_limit_handler,
    flush_handler, invalidate_campaign_cache_handler, invalidate_url_cache_handler,
    multiplier_handler, quota_sync_handler,
};
pub use health::health_handler;
pub use hits::hourly_hits_handler;
pub use redirect::{
    alias_handler, bridge_handler, redirect_campaign_handler, redirect_campaign_url_handler,
};
