//! Application layer services implementing business logic.
//!
//! Services coordinate the cache, the pending click counters and the
//! repository traits; HTTP handlers only call into them.
//!
//! # Available Services
//!
//! - [`services::dispatcher::Dispatcher`] - Redirect resolution and weighted selection
//! - [`services::click_accountant::ClickAccountant`] - Pending clicks, flushes and completion
//! - [`services::quota_service::QuotaService`] - Multiplier changes, quota rewrites, campaign deletion
//! - [`flush_scheduler::run_flush_loop`] - Periodic flush task

pub mod flush_scheduler;
pub mod services;
