//! Hit event model for the per-URL and per-campaign hit log.

use chrono::{DateTime, FixedOffset, NaiveDate, Timelike, Utc};

/// One successful dispatch, bucketed for downstream aggregation.
///
/// Created by the dispatcher, handed to the background queue and appended
/// to both the URL and the campaign hit logs. The day and hour keys are
/// computed in the fixed reporting timezone, not in UTC, so that daily
/// totals line up with the reporting calendar.
#[derive(Debug, Clone, PartialEq)]
pub struct HitEvent {
    pub url_id: i64,
    pub campaign_id: i64,
    pub hit_at: DateTime<Utc>,
    pub day_key: NaiveDate,
    pub hour_key: i16,
}

impl HitEvent {
    /// Creates an event for a hit at `hit_at`, bucketed in `reporting_tz`.
    ///
    /// # Examples
    ///
    /// ```ignore
    /// let tz = FixedOffset::west_opt(5 * 3600).unwrap();
    /// let event = HitEvent::new(42, 7, Utc::now(), tz);
    /// ```
    pub fn new(url_id: i64, campaign_id: i64, hit_at: DateTime<Utc>, reporting_tz: FixedOffset) -> Self {
        let local = hit_at.with_timezone(&reporting_tz);
        Self {
            url_id,
            campaign_id,
            hit_at,
            day_key: local.date_naive(),
            hour_key: local.hour() as i16,
        }
    }
}

/// Hit count for one hour bucket of one reporting day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HourlyHits {
    pub hour: i16,
    pub hits: i64,
}
