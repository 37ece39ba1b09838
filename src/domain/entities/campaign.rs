//! Campaign entity and its redirect response mode.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Smallest multiplier a campaign may carry.
pub const MIN_MULTIPLIER: f64 = 0.01;

/// Wire encoding used for every redirect served on behalf of a campaign.
///
/// The mode belongs to the campaign, never to the individual request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RedirectMode {
    /// `302 Found` with a `Location` header.
    Immediate,
    /// HTML page with a zero-delay meta refresh.
    MetaRefresh,
    /// Meta refresh to a signed bridge page, which refreshes again to the target.
    DoubleMetaRefresh,
    /// Plain `307 Temporary Redirect`.
    Temporary,
    /// `307` with `Referrer-Policy: no-referrer` and no-store caching.
    TemporaryNoReferrer,
    /// `307` that also drops a visit cookie naming the campaign and URL.
    TemporaryTracked,
}

impl RedirectMode {
    pub const ALL: [RedirectMode; 6] = [
        RedirectMode::Immediate,
        RedirectMode::MetaRefresh,
        RedirectMode::DoubleMetaRefresh,
        RedirectMode::Temporary,
        RedirectMode::TemporaryNoReferrer,
        RedirectMode::TemporaryTracked,
    ];

    /// Storage representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Immediate => "immediate",
            Self::MetaRefresh => "meta_refresh",
            Self::DoubleMetaRefresh => "double_meta_refresh",
            Self::Temporary => "temporary",
            Self::TemporaryNoReferrer => "temporary_no_referrer",
            Self::TemporaryTracked => "temporary_tracked",
        }
    }
}

impl fmt::Display for RedirectMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RedirectMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|mode| mode.as_str() == s)
            .ok_or_else(|| format!("unknown redirect mode '{}'", s))
    }
}

/// A named group of destination URLs sharing a redirect mode and quota multiplier.
#[derive(Debug, Clone, PartialEq)]
pub struct Campaign {
    pub id: i64,
    pub name: String,
    pub redirect_mode: RedirectMode,
    /// Alternate dispatch key served under `/alias/{alias}`.
    pub alias: Option<String>,
    /// Applied to `original_click_limit` to derive each URL's effective quota.
    pub multiplier: f64,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Campaign {
    pub fn new(
        id: i64,
        name: String,
        redirect_mode: RedirectMode,
        alias: Option<String>,
        multiplier: f64,
    ) -> Self {
        Self {
            id,
            name,
            redirect_mode,
            alias,
            multiplier,
            deleted_at: None,
        }
    }

    /// Returns true if the campaign has been soft-deleted.
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Effective quota for a URL created or resynced under this campaign.
    pub fn effective_click_limit(&self, original_click_limit: i64) -> i64 {
        effective_click_limit(original_click_limit, self.multiplier)
    }
}

/// `ceil(original × multiplier)`, tolerant of binary floating-point noise
/// such as `100 × 1.1 = 110.00000000000001`.
pub fn effective_click_limit(original_click_limit: i64, multiplier: f64) -> i64 {
    let scaled = original_click_limit as f64 * multiplier;
    let rounded = scaled.round();
    if (scaled - rounded).abs() < 1e-9 {
        rounded as i64
    } else {
        scaled.ceil() as i64
    }
}
