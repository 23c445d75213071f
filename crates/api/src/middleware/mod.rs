//! Authentication and authorization extractors.
//!
//! - [`auth::AuthUser`] -- extracts the authenticated user from a JWT
//!   Bearer token.
//! - [`auth::RequireAdmin`] -- additionally requires the admin flag.

pub mod auth;
