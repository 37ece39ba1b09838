//! Click protection: keeps automated paths away from `original_click_limit`.
//!
//! `original_click_limit` is the quota a person entered. Synchronization
//! jobs (multiplier changes, quota resyncs) may recompute the derived
//! `click_limit` at any time, but may only rewrite the original value while
//! a bypass is open. Redirect traffic never consults this guard.

use metrics::counter;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tracing::{info, warn};

const CLICK_PROTECTION_REVERTS_TOTAL: &str = "click_protection_reverts_total";

/// An automated path tried to change `original_click_limit` while protected.
///
/// Always recovered by keeping the prior value; never returned to clients.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("original click limit of url {url_id} is protected ({current} -> {attempted} reverted)")]
pub struct InvariantViolation {
    pub url_id: i64,
    pub current: i64,
    pub attempted: i64,
}

/// Process-wide protection flag.
///
/// Bypass windows nest: the flag reads as bypassed while at least one
/// [`BypassGuard`] or explicit [`ClickProtection::set_bypass`] hold is open.
#[derive(Clone, Debug, Default)]
pub struct ClickProtection {
    bypass_holders: Arc<AtomicUsize>,
    explicit_hold: Arc<AtomicBool>,
}

impl ClickProtection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_bypassed(&self) -> bool {
        self.bypass_holders.load(Ordering::SeqCst) > 0
    }

    /// Opens a bypass window that closes when the guard is dropped.
    pub fn bypass(&self) -> BypassGuard {
        self.bypass_holders.fetch_add(1, Ordering::SeqCst);
        info!("Click protection bypass opened");
        BypassGuard {
            holders: self.bypass_holders.clone(),
        }
    }

    /// Explicit toggle for callers that cannot hold a guard across calls
    /// (the admin HTTP endpoint). Enabling twice does not stack; disabling
    /// closes every explicit hold but leaves open guards untouched.
    pub fn set_bypass(&self, enabled: bool) -> bool {
        if enabled {
            if self
                .explicit_hold
                .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
            {
                self.bypass_holders.fetch_add(1, Ordering::SeqCst);
            }
            info!("Click protection bypass enabled");
        } else {
            if self
                .explicit_hold
                .compare_exchange(true, false, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
            {
                self.bypass_holders.fetch_sub(1, Ordering::SeqCst);
            }
            info!("Click protection bypass disabled");
        }
        self.is_bypassed()
    }

    /// Checks an automated rewrite of `original_click_limit`.
    ///
    /// Returns the value that may be persisted: `attempted` when bypassed or
    /// unchanged, otherwise an [`InvariantViolation`] carrying the value to
    /// keep.
    pub fn check_original_limit(
        &self,
        url_id: i64,
        current: i64,
        attempted: i64,
    ) -> Result<i64, InvariantViolation> {
        if current == attempted || self.is_bypassed() {
            return Ok(attempted);
        }
        Err(InvariantViolation {
            url_id,
            current,
            attempted,
        })
    }

    /// Like [`Self::check_original_limit`] but recovers by reverting, logging
    /// the attempt.
    pub fn guard_original_limit(&self, url_id: i64, current: i64, attempted: i64) -> i64 {
        match self.check_original_limit(url_id, current, attempted) {
            Ok(value) => value,
            Err(violation) => {
                warn!(
                    url_id = violation.url_id,
                    current = violation.current,
                    attempted = violation.attempted,
                    "Reverted protected original click limit change"
                );
                counter!(CLICK_PROTECTION_REVERTS_TOTAL).increment(1);
                violation.current
            }
        }
    }
}

/// Scoped bypass; dropping it closes the window.
#[must_use = "the bypass closes as soon as the guard is dropped"]
#[derive(Debug)]
pub struct BypassGuard {
    holders: Arc<AtomicUsize>,
}

impl Drop for BypassGuard {
    fn drop(&mut self) {
        self.holders.fetch_sub(1, Ordering::SeqCst);
        info!("Click protection bypass closed");
    }
}
