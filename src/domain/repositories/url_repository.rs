//! Repository trait for destination URL data access.

use crate::domain::entities::Url;
use crate::error::AppError;
use async_trait::async_trait;

/// Repository interface for destination URLs and their durable click counters.
///
/// # Implementations
///
/// - [`crate::infrastructure::persistence::PgUrlRepository`] - PostgreSQL implementation
/// - Test mocks available with `cfg(test)`
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UrlRepository: Send + Sync {
    /// Finds a URL by id, attached or not.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Internal`] on database errors.
    async fn find_by_id(&self, id: i64) -> Result<Option<Url>, AppError>;

    /// Lists every URL currently attached to a campaign, in insertion order.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Internal`] on database errors.
    async fn list_by_campaign(&self, campaign_id: i64) -> Result<Vec<Url>, AppError>;

    /// Atomically applies `clicks = clicks + delta` and returns the updated row.
    ///
    /// Returns `Ok(None)` if the URL does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Internal`] on database errors.
    async fn add_clicks(&self, id: i64, delta: i64) -> Result<Option<Url>, AppError>;

    /// Persists `status = completed`; with `detach`, also clears the campaign
    /// reference so membership queries stop returning the URL.
    ///
    /// Returns `Ok(false)` if the URL does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Internal`] on database errors.
    async fn mark_completed(&self, id: i64, detach: bool) -> Result<bool, AppError>;

    /// Overwrites both quota fields.
    ///
    /// Callers are responsible for passing `original_click_limit` through
    /// [`crate::domain::click_protection::ClickProtection`] first.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Internal`] on database errors.
    async fn update_click_limits(
        &self,
        id: i64,
        click_limit: i64,
        original_click_limit: i64,
    ) -> Result<Option<Url>, AppError>;
}
