//! Repository trait definitions for the domain layer.
//!
//! These traits abstract the persistent store. Implementations live in
//! `crate::infrastructure::persistence`; mocks are generated with `mockall`
//! for unit tests.
//!
//! # Available Repositories
//!
//! - [`CampaignRepository`] - Campaign lookups, multiplier and soft delete
//! - [`UrlRepository`] - Destination URLs and their durable click counters
//! - [`HitRepository`] - Hour/day bucketed hit log

pub mod campaign_repository;
pub mod hit_repository;
pub mod url_repository;

pub use campaign_repository::CampaignRepository;
pub use hit_repository::HitRepository;
pub use url_repository::UrlRepository;

#[cfg(test)]
pub use campaign_repository::MockCampaignRepository;
#[cfg(test)]
pub use hit_repository::MockHitRepository;
#[cfg(test)]
pub use url_repository::MockUrlRepository;
