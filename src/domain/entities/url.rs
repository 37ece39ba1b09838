//! Url entity: a trackable destination with its own click quota.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle state of a destination URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UrlStatus {
    Active,
    Paused,
    Completed,
    Deleted,
    Rejected,
}

impl UrlStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Paused => "paused",
            Self::Completed => "completed",
            Self::Deleted => "deleted",
            Self::Rejected => "rejected",
        }
    }
}

impl fmt::Display for UrlStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UrlStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "paused" => Ok(Self::Paused),
            "completed" => Ok(Self::Completed),
            "deleted" => Ok(Self::Deleted),
            "rejected" => Ok(Self::Rejected),
            other => Err(format!("unknown url status '{}'", other)),
        }
    }
}

/// A destination URL belonging to (at most) one campaign.
///
/// `clicks` is only ever advanced by redirect traffic. `original_click_limit`
/// is the user-entered quota and `click_limit` the effective one derived from
/// it through the campaign multiplier.
#[derive(Debug, Clone, PartialEq)]
pub struct Url {
    pub id: i64,
    /// `None` once the URL has been detached (completed or campaign deleted).
    pub campaign_id: Option<i64>,
    pub target: String,
    pub click_limit: i64,
    pub original_click_limit: i64,
    pub clicks: i64,
    pub status: UrlStatus,
}

impl Url {
    pub fn new(
        id: i64,
        campaign_id: Option<i64>,
        target: String,
        click_limit: i64,
        original_click_limit: i64,
        clicks: i64,
        status: UrlStatus,
    ) -> Self {
        Self {
            id,
            campaign_id,
            target,
            click_limit,
            original_click_limit,
            clicks,
            status,
        }
    }

    /// Clicks left before the quota is reached, never negative.
    pub fn remaining_clicks(&self) -> i64 {
        (self.click_limit - self.clicks).max(0)
    }

    pub fn is_exhausted(&self) -> bool {
        self.clicks >= self.click_limit
    }

    /// Status as it must be presented to readers: an exhausted URL is
    /// completed whatever the stored status says.
    pub fn effective_status(&self) -> UrlStatus {
        if self.is_exhausted() {
            UrlStatus::Completed
        } else {
            self.status
        }
    }

    /// True when the stored status disagrees with [`Self::effective_status`]
    /// and a completion still has to be persisted.
    pub fn needs_completion(&self) -> bool {
        self.is_exhausted() && self.status != UrlStatus::Completed
    }

    /// Eligible for weighted selection.
    pub fn is_dispatchable(&self) -> bool {
        self.effective_status() == UrlStatus::Active
    }

    /// The stored target parsed as an absolute url.
    pub fn destination(&self) -> Result<::url::Url, ::url::ParseError> {
        ::url::Url::parse(&self.target)
    }

    /// Copy with `extra` unflushed clicks applied and the status normalised.
    pub fn with_pending(&self, extra: i64) -> Self {
        let mut view = self.clone();
        view.clicks += extra;
        view.status = view.effective_status();
        view
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(click_limit: i64, clicks: i64, status: UrlStatus) -> Url {
        Url::new(
            1,
            Some(10),
            "https://example.com".to_string(),
            click_limit,
            click_limit,
            clicks,
            status,
        )
    }

    #[test]
    fn test_remaining_clicks() {
        assert_eq!(url(10, 3, UrlStatus::Active).remaining_clicks(), 7);
        assert_eq!(url(10, 12, UrlStatus::Active).remaining_clicks(), 0);
    }

    #[test]
    fn test_exhausted_url_presents_completed() {
        let exhausted = url(5, 5, UrlStatus::Active);
        assert_eq!(exhausted.effective_status(), UrlStatus::Completed);
        assert!(exhausted.needs_completion());
        assert!(!exhausted.is_dispatchable());
    }

    #[test]
    fn test_completed_url_needs_no_further_completion() {
        let done = url(5, 5, UrlStatus::Completed);
        assert!(!done.needs_completion());
    }

    #[test]
    fn test_paused_url_is_not_dispatchable() {
        let paused = url(5, 0, UrlStatus::Paused);
        assert_eq!(paused.effective_status(), UrlStatus::Paused);
        assert!(!paused.is_dispatchable());
    }

    #[test]
    fn test_with_pending_overlays_clicks() {
        let base = url(3, 1, UrlStatus::Active);

        let view = base.with_pending(1);
        assert_eq!(view.clicks, 2);
        assert_eq!(view.status, UrlStatus::Active);

        let view = base.with_pending(2);
        assert_eq!(view.clicks, 3);
        assert_eq!(view.status, UrlStatus::Completed);
    }

    #[test]
    fn test_status_parse() {
        assert_eq!("rejected".parse::<UrlStatus>(), Ok(UrlStatus::Rejected));
        assert!("archived".parse::<UrlStatus>().is_err());
    }

    #[test]
    fn test_destination_requires_absolute_url() {
        let mut url = url(10, 0, UrlStatus::Active);
        assert_eq!(url.destination().unwrap().as_str(), "https://example.com/");

        url.target = "shop/landing".to_string();
        assert!(url.destination().is_err());
    }
}
