#![allow(dead_code)]

use async_trait::async_trait;
use axum::Router;
use axum::extract::ConnectInfo;
use axum_test::TestServer;
use campaign_router::domain::entities::{Campaign, RedirectMode, Url, UrlStatus};
use campaign_router::domain::hit_event::{HitEvent, HourlyHits};
use campaign_router::domain::repositories::{CampaignRepository, HitRepository, UrlRepository};
use campaign_router::domain::task_worker::run_task_worker;
use campaign_router::error::AppError;
use campaign_router::infrastructure::cache::CacheTtl;
use campaign_router::routes::app_router;
use campaign_router::state::{AppState, EngineSettings, Repositories};
use chrono::{FixedOffset, NaiveDate, Utc};
use serde_json::json;
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tower::Layer;

pub const ADMIN_TOKEN: &str = "test-admin-token";
pub const BRIDGE_SECRET: &str = "test-bridge-secret";
pub const PUBLIC_BASE_URL: &str = "http://localhost:3000";

/// In-memory stand-in for the PostgreSQL repositories.
#[derive(Default)]
pub struct MemoryStore {
    campaigns: Mutex<BTreeMap<i64, Campaign>>,
    urls: Mutex<BTreeMap<i64, Url>>,
    hits: Mutex<Vec<HitEvent>>,
    unavailable: AtomicBool,
    url_reads: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn add_campaign(&self, id: i64, mode: RedirectMode, alias: Option<&str>, multiplier: f64) {
        self.campaigns.lock().unwrap().insert(
            id,
            Campaign::new(
                id,
                format!("campaign {}", id),
                mode,
                alias.map(str::to_string),
                multiplier,
            ),
        );
    }

    pub fn add_url(&self, id: i64, campaign_id: i64, target: &str, click_limit: i64, clicks: i64) {
        self.add_url_with_status(id, campaign_id, target, click_limit, clicks, UrlStatus::Active);
    }

    pub fn add_url_with_status(
        &self,
        id: i64,
        campaign_id: i64,
        target: &str,
        click_limit: i64,
        clicks: i64,
        status: UrlStatus,
    ) {
        self.urls.lock().unwrap().insert(
            id,
            Url::new(
                id,
                Some(campaign_id),
                target.to_string(),
                click_limit,
                click_limit,
                clicks,
                status,
            ),
        );
    }

    pub fn detach(&self, id: i64) {
        if let Some(url) = self.urls.lock().unwrap().get_mut(&id) {
            url.campaign_id = None;
        }
    }

    pub fn url(&self, id: i64) -> Url {
        self.urls.lock().unwrap().get(&id).cloned().unwrap()
    }

    pub fn campaign_row(&self, id: i64) -> Campaign {
        self.campaigns.lock().unwrap().get(&id).cloned().unwrap()
    }

    pub fn hits(&self) -> Vec<HitEvent> {
        self.hits.lock().unwrap().clone()
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn url_reads(&self) -> usize {
        self.url_reads.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<(), AppError> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(AppError::internal("Database error", json!({})))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl CampaignRepository for MemoryStore {
    async fn find_by_id(&self, id: i64) -> Result<Option<Campaign>, AppError> {
        self.check()?;
        Ok(self
            .campaigns
            .lock()
            .unwrap()
            .get(&id)
            .filter(|c| !c.is_deleted())
            .cloned())
    }

    async fn find_by_alias(&self, alias: &str) -> Result<Option<Campaign>, AppError> {
        self.check()?;
        Ok(self
            .campaigns
            .lock()
            .unwrap()
            .values()
            .find(|c| !c.is_deleted() && c.alias.as_deref() == Some(alias))
            .cloned())
    }

    async fn update_multiplier(&self, id: i64, multiplier: f64) -> Result<bool, AppError> {
        self.check()?;
        let mut campaigns = self.campaigns.lock().unwrap();
        match campaigns.get_mut(&id).filter(|c| !c.is_deleted()) {
            Some(campaign) => {
                campaign.multiplier = multiplier;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn soft_delete(&self, id: i64) -> Result<Option<Vec<i64>>, AppError> {
        self.check()?;
        let mut campaigns = self.campaigns.lock().unwrap();
        let Some(campaign) = campaigns.get_mut(&id).filter(|c| !c.is_deleted()) else {
            return Ok(None);
        };
        campaign.deleted_at = Some(Utc::now());

        let mut detached = Vec::new();
        for url in self.urls.lock().unwrap().values_mut() {
            if url.campaign_id == Some(id) {
                url.campaign_id = None;
                detached.push(url.id);
            }
        }
        Ok(Some(detached))
    }

    async fn count_live(&self) -> Result<i64, AppError> {
        self.check()?;
        Ok(self
            .campaigns
            .lock()
            .unwrap()
            .values()
            .filter(|c| !c.is_deleted())
            .count() as i64)
    }
}

#[async_trait]
impl UrlRepository for MemoryStore {
    async fn find_by_id(&self, id: i64) -> Result<Option<Url>, AppError> {
        self.check()?;
        self.url_reads.fetch_add(1, Ordering::SeqCst);
        Ok(self.urls.lock().unwrap().get(&id).cloned())
    }

    async fn list_by_campaign(&self, campaign_id: i64) -> Result<Vec<Url>, AppError> {
        self.check()?;
        self.url_reads.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .urls
            .lock()
            .unwrap()
            .values()
            .filter(|u| u.campaign_id == Some(campaign_id))
            .cloned()
            .collect())
    }

    async fn add_clicks(&self, id: i64, delta: i64) -> Result<Option<Url>, AppError> {
        self.check()?;
        let mut urls = self.urls.lock().unwrap();
        Ok(urls.get_mut(&id).map(|url| {
            url.clicks += delta;
            url.clone()
        }))
    }

    async fn mark_completed(&self, id: i64, detach: bool) -> Result<bool, AppError> {
        self.check()?;
        let mut urls = self.urls.lock().unwrap();
        match urls.get_mut(&id) {
            Some(url) => {
                url.status = UrlStatus::Completed;
                if detach {
                    url.campaign_id = None;
                }
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn update_click_limits(
        &self,
        id: i64,
        click_limit: i64,
        original_click_limit: i64,
    ) -> Result<Option<Url>, AppError> {
        self.check()?;
        let mut urls = self.urls.lock().unwrap();
        Ok(urls.get_mut(&id).map(|url| {
            url.click_limit = click_limit;
            url.original_click_limit = original_click_limit;
            if url.status == UrlStatus::Completed
                && url.clicks < click_limit
                && url.campaign_id.is_some()
            {
                url.status = UrlStatus::Active;
            }
            url.clone()
        }))
    }
}

#[async_trait]
impl HitRepository for MemoryStore {
    async fn record(&self, event: HitEvent) -> Result<(), AppError> {
        self.check()?;
        self.hits.lock().unwrap().push(event);
        Ok(())
    }

    async fn hourly_counts(
        &self,
        campaign_id: i64,
        day: NaiveDate,
    ) -> Result<Vec<HourlyHits>, AppError> {
        self.check()?;
        let mut buckets: BTreeMap<i16, i64> = BTreeMap::new();
        for hit in self.hits.lock().unwrap().iter() {
            if hit.campaign_id == campaign_id && hit.day_key == day {
                *buckets.entry(hit.hour_key).or_insert(0) += 1;
            }
        }
        Ok(buckets
            .into_iter()
            .map(|(hour, hits)| HourlyHits { hour, hits })
            .collect())
    }
}

pub fn reporting_tz() -> FixedOffset {
    FixedOffset::west_opt(5 * 3600).unwrap()
}

pub fn test_settings() -> EngineSettings {
    EngineSettings {
        cache_ttl: CacheTtl::from_secs(300),
        flush_batch_threshold: 1_000,
        task_queue_capacity: 1_024,
        reporting_tz: reporting_tz(),
        admin_token: ADMIN_TOKEN.to_string(),
        bridge_signing_secret: BRIDGE_SECRET.to_string(),
        public_base_url: PUBLIC_BASE_URL.to_string(),
    }
}

/// Inserts a fixed peer address, as `into_make_service_with_connect_info`
/// does in production, so the rate limiter can key requests.
#[derive(Clone)]
pub struct MockConnectInfoLayer;

impl<S> Layer<S> for MockConnectInfoLayer {
    type Service = MockConnectInfoService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        MockConnectInfoService { inner }
    }
}

#[derive(Clone)]
pub struct MockConnectInfoService<S> {
    inner: S,
}

impl<S, B> tower::Service<axum::http::Request<B>> for MockConnectInfoService<S>
where
    S: tower::Service<axum::http::Request<B>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    B: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = S::Future;

    fn poll_ready(
        &mut self,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: axum::http::Request<B>) -> Self::Future {
        let addr: SocketAddr = "127.0.0.1:12345".parse().unwrap();
        req.extensions_mut().insert(ConnectInfo(addr));
        self.inner.call(req)
    }
}

pub struct TestApp {
    pub server: TestServer,
    pub state: AppState,
    pub store: Arc<MemoryStore>,
}

impl TestApp {
    /// Polls until the background worker has appended `count` hits.
    pub async fn wait_for_hits(&self, count: usize) -> Vec<HitEvent> {
        for _ in 0..100 {
            let hits = self.store.hits();
            if hits.len() >= count {
                return hits;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        self.store.hits()
    }

    /// Polls until `check` holds for the stored row of `url_id`.
    pub async fn wait_for_url(&self, url_id: i64, check: impl Fn(&Url) -> bool) -> Url {
        for _ in 0..100 {
            let url = self.store.url(url_id);
            if check(&url) {
                return url;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        self.store.url(url_id)
    }
}

pub fn spawn_app(store: Arc<MemoryStore>) -> TestApp {
    spawn_app_with(store, test_settings())
}

pub fn spawn_app_with(store: Arc<MemoryStore>, settings: EngineSettings) -> TestApp {
    let repositories = Repositories {
        campaigns: store.clone(),
        urls: store.clone(),
        hits: store.clone(),
    };
    let (state, task_rx) = AppState::build(repositories, settings).unwrap();
    tokio::spawn(run_task_worker(task_rx, store.clone(), store.clone(), 2));

    let app = Router::new()
        .fallback_service(app_router(state.clone(), false))
        .layer(MockConnectInfoLayer);
    let server = TestServer::new(app).unwrap();

    TestApp {
        server,
        state,
        store,
    }
}

pub async fn insert_campaign(pool: &sqlx::PgPool, mode: &str, alias: Option<&str>) -> i64 {
    sqlx::query_scalar(
        "INSERT INTO campaigns (name, redirect_mode, alias) VALUES ('test', $1, $2) RETURNING id",
    )
    .bind(mode)
    .bind(alias)
    .fetch_one(pool)
    .await
    .unwrap()
}

pub async fn insert_url(
    pool: &sqlx::PgPool,
    campaign_id: i64,
    target: &str,
    click_limit: i64,
    clicks: i64,
) -> i64 {
    sqlx::query_scalar(
        "INSERT INTO urls (campaign_id, target, click_limit, original_click_limit, clicks)
         VALUES ($1, $2, $3, $3, $4) RETURNING id",
    )
    .bind(campaign_id)
    .bind(target)
    .bind(click_limit)
    .bind(clicks)
    .fetch_one(pool)
    .await
    .unwrap()
}
