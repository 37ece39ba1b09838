//! Handler for the hourly hit histogram.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use chrono::Utc;
use serde_json::json;

use crate::api::dto::hits::{HitsQuery, HourBucket, HourlyHitsResponse};
use crate::domain::hit_event::HourlyHits;
use crate::error::AppError;
use crate::state::AppState;

/// Returns hourly hits of a campaign for one reporting day.
///
/// # Endpoint
///
/// `GET /api/campaigns/{id}/hits?day=YYYY-MM-DD`
///
/// `day` defaults to today in the reporting timezone. Hours without hits are
/// reported as zero, so the response always has 24 buckets.
///
/// # Errors
///
/// - **404 Not Found**: Unknown or deleted campaign
pub async fn hourly_hits_handler(
    Path(campaign_id): Path<i64>,
    Query(query): Query<HitsQuery>,
    State(state): State<AppState>,
) -> Result<Json<HourlyHitsResponse>, AppError> {
    if state.campaign_repository.find_by_id(campaign_id).await?.is_none() {
        return Err(AppError::not_found(
            "Campaign not found",
            json!({"campaign_id": campaign_id}),
        ));
    }

    let day = query
        .day
        .unwrap_or_else(|| Utc::now().with_timezone(&state.reporting_tz).date_naive());

    let counts = state.hit_repository.hourly_counts(campaign_id, day).await?;
    let hours = fill_hours(&counts);
    let total = hours.iter().map(|b| b.hits).sum();

    Ok(Json(HourlyHitsResponse {
        campaign_id,
        day,
        total,
        hours,
    }))
}

fn fill_hours(counts: &[HourlyHits]) -> Vec<HourBucket> {
    (0..24)
        .map(|hour| HourBucket {
            hour,
            hits: counts
                .iter()
                .filter(|c| c.hour == hour)
                .map(|c| c.hits)
                .sum(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fill_hours_pads_missing_buckets() {
        let hours = fill_hours(&[
            HourlyHits { hour: 0, hits: 2 },
            HourlyHits { hour: 13, hits: 5 },
        ]);

        assert_eq!(hours.len(), 24);
        assert_eq!(hours[0], HourBucket { hour: 0, hits: 2 });
        assert_eq!(hours[1], HourBucket { hour: 1, hits: 0 });
        assert_eq!(hours[13], HourBucket { hour: 13, hits: 5 });
        assert_eq!(hours[23], HourBucket { hour: 23, hits: 0 });
    }
}
