//! Core domain entities.
//!
//! - [`Campaign`] - A group of destination URLs with a shared redirect mode
//! - [`Url`] - A destination with its own click quota
//!
//! Entities are plain data; the quota rules that depend only on a single
//! entity (remaining clicks, effective status) live here as methods.

pub mod campaign;
pub mod url;

pub use campaign::{Campaign, MIN_MULTIPLIER, RedirectMode, effective_click_limit};
pub use url::{Url, UrlStatus};
