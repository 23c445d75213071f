//! Request handlers, one module per resource.

pub mod admin;
pub mod auth;
pub mod dispatch;
pub mod license;
pub mod session;
pub mod templates;
