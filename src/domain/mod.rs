//! Domain layer containing business entities and logic.
//!
//! Everything here is independent of HTTP and of the storage backend.
//!
//! # Architecture
//!
//! - [`entities`] - Campaigns and destination URLs
//! - [`repositories`] - Data access trait definitions
//! - [`distribution`] - Weighted selection by remaining quota
//! - [`pending_clicks`] - Unflushed click counters
//! - [`click_protection`] - Guard for user-entered quotas
//! - [`completion_tracker`] - One completion report per exhausted URL
//! - [`hit_event`] - Hit log entries bucketed in the reporting timezone
//! - [`background_task`] / [`task_worker`] - Fire-and-forget work and its worker
//!
//! # Click Processing Flow
//!
//! 1. The dispatcher picks a URL and hands the click to the click accountant
//! 2. The click is counted in [`pending_clicks::PendingClicks`]
//! 3. The flush loop writes pending counts to the store in batches
//! 4. A [`hit_event::HitEvent`] is queued and appended by
//!    [`task_worker::run_task_worker`]

pub mod background_task;
pub mod click_protection;
pub mod completion_tracker;
pub mod distribution;
pub mod entities;
pub mod hit_event;
pub mod pending_clicks;
pub mod repositories;
pub mod task_worker;
