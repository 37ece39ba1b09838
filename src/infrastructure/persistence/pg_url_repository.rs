//! PostgreSQL implementation of URL repository.

use async_trait::async_trait;
use serde_json::json;
use sqlx::{FromRow, PgPool};
use std::sync::Arc;

use crate::domain::entities::{Url, UrlStatus};
use crate::domain::repositories::UrlRepository;
use crate::error::AppError;

#[derive(FromRow)]
struct UrlRow {
    id: i64,
    campaign_id: Option<i64>,
    target: String,
    click_limit: i64,
    original_click_limit: i64,
    clicks: i64,
    status: String,
}

impl TryFrom<UrlRow> for Url {
    type Error = AppError;

    fn try_from(row: UrlRow) -> Result<Self, Self::Error> {
        let status: UrlStatus = row.status.parse().map_err(|reason: String| {
            AppError::internal("Corrupt url row", json!({ "id": row.id, "reason": reason }))
        })?;
        Ok(Url::new(
            row.id,
            row.campaign_id,
            row.target,
            row.click_limit,
            row.original_click_limit,
            row.clicks,
            status,
        ))
    }
}

/// PostgreSQL repository for destination URLs.
///
/// `clicks` is only ever advanced with `clicks = clicks + $delta`, so
/// concurrent writers cannot lose increments.
pub struct PgUrlRepository {
    pool: Arc<PgPool>,
}

impl PgUrlRepository {
    /// Creates a new repository with a database connection pool.
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UrlRepository for PgUrlRepository {
    async fn find_by_id(&self, id: i64) -> Result<Option<Url>, AppError> {
        sqlx::query_as::<_, UrlRow>(
            r#"
            SELECT id, campaign_id, target, click_limit, original_click_limit, clicks, status
            FROM urls
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(self.pool.as_ref())
        .await?
        .map(Url::try_from)
        .transpose()
    }

    async fn list_by_campaign(&self, campaign_id: i64) -> Result<Vec<Url>, AppError> {
        sqlx::query_as::<_, UrlRow>(
            r#"
            SELECT id, campaign_id, target, click_limit, original_click_limit, clicks, status
            FROM urls
            WHERE campaign_id = $1
            ORDER BY id
            "#,
        )
        .bind(campaign_id)
        .fetch_all(self.pool.as_ref())
        .await?
        .into_iter()
        .map(Url::try_from)
        .collect()
    }

    async fn add_clicks(&self, id: i64, delta: i64) -> Result<Option<Url>, AppError> {
        sqlx::query_as::<_, UrlRow>(
            r#"
            UPDATE urls
            SET clicks = clicks + $2, updated_at = NOW()
            WHERE id = $1
            RETURNING id, campaign_id, target, click_limit, original_click_limit, clicks, status
            "#,
        )
        .bind(id)
        .bind(delta)
        .fetch_optional(self.pool.as_ref())
        .await?
        .map(Url::try_from)
        .transpose()
    }

    async fn mark_completed(&self, id: i64, detach: bool) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE urls
            SET status = 'completed',
                campaign_id = CASE WHEN $2 THEN NULL ELSE campaign_id END,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(detach)
        .execute(self.pool.as_ref())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn update_click_limits(
        &self,
        id: i64,
        click_limit: i64,
        original_click_limit: i64,
    ) -> Result<Option<Url>, AppError> {
        sqlx::query_as::<_, UrlRow>(
            r#"
            UPDATE urls
            SET click_limit = $2,
                original_click_limit = $3,
                status = CASE
                    WHEN status = 'completed' AND clicks < $2 AND campaign_id IS NOT NULL
                        THEN 'active'
                    ELSE status
                END,
                updated_at = NOW()
            WHERE id = $1
            RETURNING id, campaign_id, target, click_limit, original_click_limit, clicks, status
            "#,
        )
        .bind(id)
        .bind(click_limit)
        .bind(original_click_limit)
        .fetch_optional(self.pool.as_ref())
        .await?
        .map(Url::try_from)
        .transpose()
    }
}
