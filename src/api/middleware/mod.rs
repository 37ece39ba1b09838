//! HTTP middleware for request processing and protection.
//!
//! - [`auth`] - Admin bearer token check
//! - [`rate_limit`] - Per-IP limiter for the admin routes
//! - [`tracing`] - Request spans and latency logging

pub mod auth;
pub mod rate_limit;
pub mod tracing;
