//! Repository trait for campaign data access.

use crate::domain::entities::Campaign;
use crate::error::AppError;
use async_trait::async_trait;

/// Repository interface for campaigns.
///
/// Soft-deleted campaigns are invisible to the lookup methods.
///
/// # Implementations
///
/// - [`crate::infrastructure::persistence::PgCampaignRepository`] - PostgreSQL implementation
/// - Test mocks available with `cfg(test)`
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CampaignRepository: Send + Sync {
    /// Finds a live campaign by id.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Internal`] on database errors.
    async fn find_by_id(&self, id: i64) -> Result<Option<Campaign>, AppError>;

    /// Finds a live campaign by its alias path.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Internal`] on database errors.
    async fn find_by_alias(&self, alias: &str) -> Result<Option<Campaign>, AppError>;

    /// Persists a new quota multiplier.
    ///
    /// Returns `Ok(false)` if the campaign does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Internal`] on database errors.
    async fn update_multiplier(&self, id: i64, multiplier: f64) -> Result<bool, AppError>;

    /// Soft-deletes a campaign and detaches all of its URLs.
    ///
    /// Returns the ids of the detached URLs, or `None` if the campaign was
    /// not found or already deleted.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Internal`] on database errors.
    async fn soft_delete(&self, id: i64) -> Result<Option<Vec<i64>>, AppError>;

    /// Number of live campaigns; doubles as the database health probe.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Internal`] on database errors.
    async fn count_live(&self) -> Result<i64, AppError>;
}
