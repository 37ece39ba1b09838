//! Shared application state wiring.
//!
//! [`AppState::build`] assembles the engine (cache, click accountant,
//! dispatcher, quota service) over a set of repositories. The server uses it
//! with the PostgreSQL repositories; integration tests use it with in-memory
//! ones.

use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use chrono::FixedOffset;
use tokio::sync::mpsc;

use crate::api::middleware::auth::AdminToken;
use crate::api::redirect::BridgeSigner;
use crate::application::services::{ClickAccountant, Dispatcher, QuotaService};
use crate::config::Config;
use crate::domain::background_task::{BackgroundTask, TaskQueue};
use crate::domain::click_protection::ClickProtection;
use crate::domain::completion_tracker::CompletionTracker;
use crate::domain::pending_clicks::PendingClicks;
use crate::domain::repositories::{CampaignRepository, HitRepository, UrlRepository};
use crate::infrastructure::cache::{CacheTtl, EntityCache};

/// Storage backends the engine runs on.
#[derive(Clone)]
pub struct Repositories {
    pub campaigns: Arc<dyn CampaignRepository>,
    pub urls: Arc<dyn UrlRepository>,
    pub hits: Arc<dyn HitRepository>,
}

/// Engine tuning taken from [`Config`].
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub cache_ttl: CacheTtl,
    pub flush_batch_threshold: i64,
    pub task_queue_capacity: usize,
    pub reporting_tz: FixedOffset,
    pub admin_token: String,
    pub bridge_signing_secret: String,
    pub public_base_url: String,
}

impl EngineSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            cache_ttl: config.cache_ttl(),
            flush_batch_threshold: config.flush_batch_threshold,
            task_queue_capacity: config.task_queue_capacity,
            reporting_tz: config.reporting_tz(),
            admin_token: config.admin_token.clone(),
            bridge_signing_secret: config.bridge_signing_secret.clone(),
            public_base_url: config.public_base_url.clone(),
        }
    }
}

/// State injected into every handler.
///
/// Cheap to clone: every field is an `Arc` or a handle over one.
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
    pub accountant: ClickAccountant,
    pub quota_service: Arc<QuotaService>,
    pub cache: Arc<EntityCache>,
    pub protection: ClickProtection,
    pub campaign_repository: Arc<dyn CampaignRepository>,
    pub hit_repository: Arc<dyn HitRepository>,
    pub task_queue: TaskQueue,
    pub bridge: Arc<BridgeSigner>,
    pub admin_token: Arc<AdminToken>,
    pub reporting_tz: FixedOffset,
}

impl AppState {
    /// Wires the engine over `repositories`.
    ///
    /// Returns the state and the receiving half of the background queue,
    /// which the caller hands to
    /// [`run_task_worker`](crate::domain::task_worker::run_task_worker).
    ///
    /// # Errors
    ///
    /// Fails if the bridge signer cannot be built from the public base URL
    /// or the admin token is unusable.
    pub fn build(
        repositories: Repositories,
        settings: EngineSettings,
    ) -> Result<(Self, mpsc::Receiver<BackgroundTask>)> {
        let (task_queue, task_rx) = TaskQueue::bounded(settings.task_queue_capacity);

        let pending = PendingClicks::new();
        let completions = Arc::new(CompletionTracker::new(task_queue.clone()));
        let protection = ClickProtection::new();

        let cache = Arc::new(EntityCache::new(
            settings.cache_ttl,
            pending.clone(),
            completions.clone(),
            repositories.campaigns.clone(),
            repositories.urls.clone(),
        ));

        let accountant = ClickAccountant::new(
            cache.clone(),
            pending,
            completions,
            repositories.urls.clone(),
            settings.flush_batch_threshold,
        );

        let dispatcher = Arc::new(Dispatcher::new(
            cache.clone(),
            accountant.clone(),
            task_queue.clone(),
            settings.reporting_tz,
        ));

        let quota_service = Arc::new(QuotaService::new(
            repositories.campaigns.clone(),
            repositories.urls.clone(),
            cache.clone(),
            protection.clone(),
        ));

        let bridge = BridgeSigner::new(&settings.bridge_signing_secret, &settings.public_base_url)
            .context("Failed to build bridge signer")?;
        let admin_token = AdminToken::new(&settings.admin_token)
            .ok_or_else(|| anyhow!("Failed to key admin token"))?;

        let state = Self {
            dispatcher,
            accountant,
            quota_service,
            cache,
            protection,
            campaign_repository: repositories.campaigns,
            hit_repository: repositories.hits,
            task_queue,
            bridge: Arc::new(bridge),
            admin_token: Arc::new(admin_token),
            reporting_tz: settings.reporting_tz,
        };

        Ok((state, task_rx))
    }
}
