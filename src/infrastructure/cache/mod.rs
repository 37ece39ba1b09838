//! In-process caching for fast redirect resolution.
//!
//! - [`EntityCache`] - read-through cache of campaigns, URLs, aliases and
//!   distribution indexes
//! - [`CacheTtl`] - freshness policy shared by every tier

mod entity_cache;
mod entry;

pub use entity_cache::{CacheStats, EntityCache};
pub use entry::{CacheEntry, CacheTtl};
