//! DTOs for the hit log aggregation endpoint.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Query parameters for `GET /api/campaigns/{id}/hits`.
#[derive(Debug, Deserialize)]
pub struct HitsQuery {
    /// Reporting day (`YYYY-MM-DD`); defaults to today in the reporting timezone.
    pub day: Option<NaiveDate>,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct HourBucket {
    pub hour: i16,
    pub hits: i64,
}

/// Hourly hits for one campaign and reporting day, always 24 buckets.
#[derive(Debug, Serialize)]
pub struct HourlyHitsResponse {
    pub campaign_id: i64,
    pub day: NaiveDate,
    pub total: i64,
    pub hours: Vec<HourBucket>,
}
