//! Business logic services for the application layer.

pub mod click_accountant;
pub mod dispatcher;
pub mod quota_service;

pub use click_accountant::{ClickAccountant, FlushReport};
pub use dispatcher::{DispatchError, DispatchTarget, Dispatcher, SelectedUrl};
pub use quota_service::QuotaService;
