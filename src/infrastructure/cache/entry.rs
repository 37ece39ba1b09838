//! Cache entries and the global freshness policy.

use std::time::{Duration, Instant};

/// Freshness policy shared by every cache tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheTtl {
    /// Every read goes to the store.
    AlwaysRevalidate,
    /// Entries younger than the duration are served from memory.
    Fresh(Duration),
}

impl CacheTtl {
    /// `0` means always revalidate.
    pub fn from_secs(seconds: u64) -> Self {
        if seconds == 0 {
            Self::AlwaysRevalidate
        } else {
            Self::Fresh(Duration::from_secs(seconds))
        }
    }
}

/// A cached value and the moment it was loaded.
#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    pub value: T,
    pub last_updated: Instant,
}

impl<T> CacheEntry<T> {
    pub fn new(value: T) -> Self {
        Self {
            value,
            last_updated: Instant::now(),
        }
    }

    pub fn is_fresh(&self, ttl: CacheTtl) -> bool {
        match ttl {
            CacheTtl::AlwaysRevalidate => false,
            CacheTtl::Fresh(ttl) => self.last_updated.elapsed() < ttl,
        }
    }
}
