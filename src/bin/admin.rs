//! CLI administration tool for campaign-router.
//!
//! Inspects campaigns and hit logs and runs quota maintenance directly
//! against the database, without going through the HTTP API.
//!
//! # Usage
//!
//! ```bash
//! # Check database connection
//! cargo run --bin admin -- db check
//!
//! # Show a campaign and its URLs
//! cargo run --bin admin -- campaign show 12
//!
//! # Hourly hits for a reporting day
//! cargo run --bin admin -- hits 12 --day 2025-03-01
//!
//! # Automated quota resync (protected unless --bypass)
//! cargo run --bin admin -- quota resync 40 500 --bypass
//! ```
//!
//! # Environment Variables
//!
//! - `DATABASE_URL` (or `DB_HOST`/`DB_PORT`/`DB_USER`/`DB_PASSWORD`/`DB_NAME`)
//! - `REPORTING_UTC_OFFSET_HOURS` (default `-5`): default day for `hits`
//!
//! A running server keeps serving cached quotas until its TTL expires or
//! `DELETE /api/cache/urls/{id}` is called.

use campaign_router::application::services::QuotaService;
use campaign_router::config::Config;
use campaign_router::domain::background_task::TaskQueue;
use campaign_router::domain::click_protection::ClickProtection;
use campaign_router::domain::completion_tracker::CompletionTracker;
use campaign_router::domain::entities::UrlStatus;
use campaign_router::domain::pending_clicks::PendingClicks;
use campaign_router::domain::repositories::{CampaignRepository, HitRepository, UrlRepository};
use campaign_router::infrastructure::cache::{CacheTtl, EntityCache};
use campaign_router::infrastructure::persistence::{
    PgCampaignRepository, PgHitRepository, PgUrlRepository,
};

use anyhow::{Context, Result};
use chrono::{FixedOffset, NaiveDate, Offset, Utc};
use clap::{Parser, Subcommand};
use colored::*;
use dialoguer::Confirm;
use sqlx::PgPool;
use std::sync::Arc;

/// Width of the longest bar in the hourly histogram.
const HISTOGRAM_WIDTH: i64 = 40;

/// CLI tool for managing campaign-router.
#[derive(Parser)]
#[command(name = "admin")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Top-level command groups.
#[derive(Subcommand)]
enum Commands {
    /// Database operations
    Db {
        #[command(subcommand)]
        action: DbAction,
    },

    /// Inspect campaigns
    Campaign {
        #[command(subcommand)]
        action: CampaignAction,
    },

    /// Hourly hit histogram of a campaign
    Hits {
        /// Campaign ID
        campaign_id: i64,

        /// Reporting day (YYYY-MM-DD), defaults to today in the reporting timezone
        #[arg(short, long)]
        day: Option<NaiveDate>,
    },

    /// Quota maintenance
    Quota {
        #[command(subcommand)]
        action: QuotaAction,
    },
}

/// Database operation subcommands.
#[derive(Subcommand)]
enum DbAction {
    /// Check database connection
    Check,
}

#[derive(Subcommand)]
enum CampaignAction {
    /// Show a campaign with its URLs and remaining quota
    Show { campaign_id: i64 },
}

#[derive(Subcommand)]
enum QuotaAction {
    /// Rewrite a URL's original click limit through the automated path
    Resync {
        url_id: i64,

        /// New original click limit
        value: i64,

        /// Open a click protection bypass for this write
        #[arg(long)]
        bypass: bool,

        /// Skip confirmation prompt
        #[arg(short = 'y', long)]
        yes: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let database_url = Config::load_database_url()?;
    let pool = PgPool::connect(&database_url)
        .await
        .context("Failed to connect to database")?;
    let pool = Arc::new(pool);

    match cli.command {
        Commands::Db { action } => handle_db_action(action, &pool).await?,
        Commands::Campaign { action } => handle_campaign_action(action, pool).await?,
        Commands::Hits { campaign_id, day } => show_hits(campaign_id, day, pool).await?,
        Commands::Quota { action } => handle_quota_action(action, pool).await?,
    }

    Ok(())
}

/// Handles database diagnostic commands.
async fn handle_db_action(action: DbAction, pool: &PgPool) -> Result<()> {
    match action {
        DbAction::Check => {
            println!("{}", "Checking database connection...".bright_blue());

            sqlx::query("SELECT 1").fetch_one(pool).await?;
            let live = PgCampaignRepository::new(Arc::new(pool.clone()))
                .count_live()
                .await
                .map_err(|e| anyhow::anyhow!("Failed to count campaigns: {}", e))?;

            println!("{}", "Database connection OK".green().bold());
            println!(
                "  Live campaigns: {}",
                live.to_string().bright_white().bold()
            );
        }
    }

    Ok(())
}

async fn handle_campaign_action(action: CampaignAction, pool: Arc<PgPool>) -> Result<()> {
    match action {
        CampaignAction::Show { campaign_id } => show_campaign(campaign_id, pool).await,
    }
}

/// Prints a campaign and its URLs.
///
/// # Output Format
///
/// ```text
/// Campaign 12: Spring sale (temporary, x1.5, alias spring)
///
///   ID    Clicks   Limit    Remaining  Status     Target
///   40    120      300      180        active     https://shop.example.com/a
/// ```
async fn show_campaign(campaign_id: i64, pool: Arc<PgPool>) -> Result<()> {
    let campaigns = PgCampaignRepository::new(pool.clone());
    let urls = PgUrlRepository::new(pool);

    let campaign = campaigns
        .find_by_id(campaign_id)
        .await
        .map_err(|e| anyhow::anyhow!("Database error: {}", e))?
        .context("Campaign not found")?;

    let alias = campaign
        .alias
        .as_deref()
        .map(|a| format!(", alias {}", a))
        .unwrap_or_default();
    println!(
        "{} ({}, x{}{})",
        format!("Campaign {}: {}", campaign.id, campaign.name)
            .bright_blue()
            .bold(),
        campaign.redirect_mode,
        campaign.multiplier,
        alias
    );
    println!();

    let rows = urls
        .list_by_campaign(campaign_id)
        .await
        .map_err(|e| anyhow::anyhow!("Database error: {}", e))?;

    if rows.is_empty() {
        println!("{}", "  No URLs attached".yellow());
        return Ok(());
    }

    println!(
        "  {:<5} {:<8} {:<8} {:<10} {:<10} {}",
        "ID".bright_white().bold(),
        "Clicks".bright_white().bold(),
        "Limit".bright_white().bold(),
        "Remaining".bright_white().bold(),
        "Status".bright_white().bold(),
        "Target".bright_white().bold()
    );

    for url in &rows {
        let status = match url.effective_status() {
            UrlStatus::Active => "active".green(),
            UrlStatus::Completed => "completed".red(),
            other => other.as_str().yellow(),
        };
        println!(
            "  {:<5} {:<8} {:<8} {:<10} {:<10} {}",
            url.id.to_string().bright_black(),
            url.clicks,
            url.click_limit,
            url.remaining_clicks(),
            status,
            url.target.cyan()
        );
    }

    let remaining: i64 = rows.iter().map(|u| u.remaining_clicks()).sum();
    println!();
    println!(
        "  Remaining clicks: {}",
        remaining.to_string().bright_white().bold()
    );

    Ok(())
}

/// Prints the hourly hit histogram of a campaign.
async fn show_hits(campaign_id: i64, day: Option<NaiveDate>, pool: Arc<PgPool>) -> Result<()> {
    let day = day.unwrap_or_else(|| Utc::now().with_timezone(&reporting_tz()).date_naive());
    let hits = PgHitRepository::new(pool);

    let counts = hits
        .hourly_counts(campaign_id, day)
        .await
        .map_err(|e| anyhow::anyhow!("Database error: {}", e))?;

    println!(
        "{}",
        format!("Hits for campaign {} on {}", campaign_id, day)
            .bright_blue()
            .bold()
    );
    println!();

    let max = counts.iter().map(|c| c.hits).max().unwrap_or(0).max(1);
    for hour in 0..24i16 {
        let hits = counts
            .iter()
            .find(|c| c.hour == hour)
            .map_or(0, |c| c.hits);
        let bar = "#".repeat((hits * HISTOGRAM_WIDTH / max) as usize);
        println!("  {:02}:00 {:>7} {}", hour, hits, bar.green());
    }

    let total: i64 = counts.iter().map(|c| c.hits).sum();
    println!();
    println!("  Total: {}", total.to_string().bright_white().bold());

    Ok(())
}

async fn handle_quota_action(action: QuotaAction, pool: Arc<PgPool>) -> Result<()> {
    match action {
        QuotaAction::Resync {
            url_id,
            value,
            bypass,
            yes,
        } => resync_quota(url_id, value, bypass, yes, pool).await,
    }
}

/// Runs the automated quota rewrite for one URL in-process.
///
/// Without `--bypass` the original click limit stays protected and only the
/// effective limit is recomputed.
async fn resync_quota(
    url_id: i64,
    value: i64,
    bypass: bool,
    skip_confirm: bool,
    pool: Arc<PgPool>,
) -> Result<()> {
    println!("{}", "Quota resync".bright_blue().bold());
    println!();

    let campaigns: Arc<dyn CampaignRepository> = Arc::new(PgCampaignRepository::new(pool.clone()));
    let urls: Arc<dyn UrlRepository> = Arc::new(PgUrlRepository::new(pool));

    // The queue is never drained here: this process does not count clicks.
    let (queue, _task_rx) = TaskQueue::bounded(1);
    let cache = Arc::new(EntityCache::new(
        CacheTtl::AlwaysRevalidate,
        PendingClicks::new(),
        Arc::new(CompletionTracker::new(queue)),
        campaigns.clone(),
        urls.clone(),
    ));
    let protection = ClickProtection::new();
    let service = QuotaService::new(campaigns, urls.clone(), cache, protection.clone());

    let before = urls
        .find_by_id(url_id)
        .await
        .map_err(|e| anyhow::anyhow!("Database error: {}", e))?
        .context("Url not found")?;

    println!("  Url:             {}", before.target.cyan());
    println!(
        "  Original limit:  {} -> {}",
        before.original_click_limit,
        value.to_string().bright_yellow()
    );
    println!();

    if bypass {
        println!(
            "{}",
            "Click protection will be bypassed for this write."
                .red()
                .bold()
        );
        if !skip_confirm {
            let confirmed = Confirm::new()
                .with_prompt("Overwrite the original click limit?")
                .default(false)
                .interact()?;

            if !confirmed {
                println!("{}", "Cancelled".red());
                return Ok(());
            }
        }
    }

    let updated = {
        let _guard = bypass.then(|| protection.bypass());
        service
            .sync_original_limit(url_id, value)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to resync quota: {}", e))?
    };

    println!();
    if updated.original_click_limit == value {
        println!("{}", "Quota updated".green().bold());
    } else {
        println!(
            "{}",
            "Original click limit is protected, kept the prior value".yellow()
        );
    }
    println!(
        "  Original limit: {}  Effective limit: {}  Remaining: {}",
        updated.original_click_limit.to_string().bright_white().bold(),
        updated.click_limit.to_string().bright_white().bold(),
        updated.remaining_clicks().to_string().bright_white().bold()
    );

    Ok(())
}

fn reporting_tz() -> FixedOffset {
    let hours: i32 = std::env::var("REPORTING_UTC_OFFSET_HOURS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(-5);
    FixedOffset::east_opt(hours * 3600).unwrap_or_else(|| Utc.fix())
}
