//! PostgreSQL repository implementations.
//!
//! Concrete implementations of domain repository traits using SQLx runtime
//! queries mapped through `FromRow` row structs.
//!
//! # Repositories
//!
//! - [`PgCampaignRepository`] - Campaign lookup, multiplier and soft delete
//! - [`PgUrlRepository`] - URLs and their durable click counters
//! - [`PgHitRepository`] - Per-URL and per-campaign hit logs

pub mod pg_campaign_repository;
pub mod pg_hit_repository;
pub mod pg_url_repository;

pub use pg_campaign_repository::PgCampaignRepository;
pub use pg_hit_repository::PgHitRepository;
pub use pg_url_repository::PgUrlRepository;
