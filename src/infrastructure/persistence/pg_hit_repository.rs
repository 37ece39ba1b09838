//! PostgreSQL implementation of the hit log.

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{FromRow, PgPool};
use std::sync::Arc;

use crate::domain::hit_event::{HitEvent, HourlyHits};
use crate::domain::repositories::HitRepository;
use crate::error::AppError;

#[derive(FromRow)]
struct HourlyRow {
    hour_key: i16,
    hits: i64,
}

/// PostgreSQL repository for the per-URL and per-campaign hit logs.
pub struct PgHitRepository {
    pool: Arc<PgPool>,
}

impl PgHitRepository {
    /// Creates a new repository with a database connection pool.
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl HitRepository for PgHitRepository {
    async fn record(&self, event: HitEvent) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO url_hits (url_id, hit_at, day_key, hour_key) VALUES ($1, $2, $3, $4)",
        )
        .bind(event.url_id)
        .bind(event.hit_at)
        .bind(event.day_key)
        .bind(event.hour_key)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT INTO campaign_hits (campaign_id, hit_at, day_key, hour_key) VALUES ($1, $2, $3, $4)",
        )
        .bind(event.campaign_id)
        .bind(event.hit_at)
        .bind(event.day_key)
        .bind(event.hour_key)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn hourly_counts(
        &self,
        campaign_id: i64,
        day: NaiveDate,
    ) -> Result<Vec<HourlyHits>, AppError> {
        let rows = sqlx::query_as::<_, HourlyRow>(
            r#"
            SELECT hour_key, COUNT(*) AS hits
            FROM campaign_hits
            WHERE campaign_id = $1 AND day_key = $2
            GROUP BY hour_key
            ORDER BY hour_key
            "#,
        )
        .bind(campaign_id)
        .bind(day)
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| HourlyHits {
                hour: r.hour_key,
                hits: r.hits,
            })
            .collect())
    }
}
