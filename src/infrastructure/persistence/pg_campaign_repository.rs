//! PostgreSQL implementation of campaign repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::json;
use sqlx::{FromRow, PgPool};
use std::sync::Arc;

use crate::domain::entities::{Campaign, RedirectMode};
use crate::domain::repositories::CampaignRepository;
use crate::error::AppError;

const CAMPAIGN_COLUMNS: &str = "id, name, redirect_mode, alias, multiplier, deleted_at";

#[derive(FromRow)]
struct CampaignRow {
    id: i64,
    name: String,
    redirect_mode: String,
    alias: Option<String>,
    multiplier: f64,
    deleted_at: Option<DateTime<Utc>>,
}

impl TryFrom<CampaignRow> for Campaign {
    type Error = AppError;

    fn try_from(row: CampaignRow) -> Result<Self, Self::Error> {
        let mode: RedirectMode = row.redirect_mode.parse().map_err(|reason: String| {
            AppError::internal("Corrupt campaign row", json!({ "id": row.id, "reason": reason }))
        })?;
        let mut campaign = Campaign::new(row.id, row.name, mode, row.alias, row.multiplier);
        campaign.deleted_at = row.deleted_at;
        Ok(campaign)
    }
}

/// PostgreSQL repository for campaigns.
pub struct PgCampaignRepository {
    pool: Arc<PgPool>,
}

impl PgCampaignRepository {
    /// Creates a new repository with a database connection pool.
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CampaignRepository for PgCampaignRepository {
    async fn find_by_id(&self, id: i64) -> Result<Option<Campaign>, AppError> {
        let sql = format!(
            "SELECT {CAMPAIGN_COLUMNS} FROM campaigns WHERE id = $1 AND deleted_at IS NULL"
        );
        sqlx::query_as::<_, CampaignRow>(&sql)
            .bind(id)
            .fetch_optional(self.pool.as_ref())
            .await?
            .map(Campaign::try_from)
            .transpose()
    }

    async fn find_by_alias(&self, alias: &str) -> Result<Option<Campaign>, AppError> {
        let sql = format!(
            "SELECT {CAMPAIGN_COLUMNS} FROM campaigns WHERE alias = $1 AND deleted_at IS NULL"
        );
        sqlx::query_as::<_, CampaignRow>(&sql)
            .bind(alias)
            .fetch_optional(self.pool.as_ref())
            .await?
            .map(Campaign::try_from)
            .transpose()
    }

    async fn update_multiplier(&self, id: i64, multiplier: f64) -> Result<bool, AppError> {
        let result = sqlx::query(
            "UPDATE campaigns SET multiplier = $2 WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .bind(multiplier)
        .execute(self.pool.as_ref())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn soft_delete(&self, id: i64) -> Result<Option<Vec<i64>>, AppError> {
        let mut tx = self.pool.begin().await?;

        let deleted = sqlx::query(
            "UPDATE campaigns SET deleted_at = NOW() WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .execute(&mut *tx)
        .await?;

        if deleted.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(None);
        }

        let detached: Vec<i64> = sqlx::query_scalar(
            r#"
            UPDATE urls SET campaign_id = NULL, updated_at = NOW()
            WHERE campaign_id = $1
            RETURNING id
            "#,
        )
        .bind(id)
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(detached))
    }

    async fn count_live(&self) -> Result<i64, AppError> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM campaigns WHERE deleted_at IS NULL")
                .fetch_one(self.pool.as_ref())
                .await?;
        Ok(count)
    }
}
