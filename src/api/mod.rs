//! HTTP layer: redirect endpoints and the admin API.
//!
//! This layer translates HTTP requests into engine operations and formats
//! responses.
//!
//! # Modules
//!
//! - [`dto`] - Data Transfer Objects for request/response serialization
//! - [`handlers`] - HTTP request handlers
//! - [`middleware`] - Authentication, rate limiting and tracing
//! - [`redirect`] - Response encoding per redirect mode, bridge links
//! - [`routes`] - Admin route configuration

pub mod dto;
pub mod handlers;
pub mod middleware;
pub mod redirect;
pub mod routes;
