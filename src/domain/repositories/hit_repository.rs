//! Repository trait for the hit log.

use crate::domain::hit_event::{HitEvent, HourlyHits};
use crate::error::AppError;
use async_trait::async_trait;
use chrono::NaiveDate;

/// Repository interface for the per-URL and per-campaign hit logs.
///
/// # Implementations
///
/// - [`crate::infrastructure::persistence::PgHitRepository`] - PostgreSQL implementation
/// - Test mocks available with `cfg(test)`
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait HitRepository: Send + Sync {
    /// Appends one hit to both the URL log and the campaign log.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Internal`] on database errors.
    async fn record(&self, event: HitEvent) -> Result<(), AppError>;

    /// Returns non-empty hour buckets of a campaign for one reporting day,
    /// ordered by hour.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Internal`] on database errors.
    async fn hourly_counts(
        &self,
        campaign_id: i64,
        day: NaiveDate,
    ) -> Result<Vec<HourlyHits>, AppError>;
}
