//! # Auth Module
//!
//! Accounts and sessions:
//! - Password registration and login
//! - Session cookies carrying access and refresh tokens
//! - OAuth sign-in, account linking and registration handoff
//! - `require_session` middleware and the `AuthedUser` extractor

pub mod cookies;
pub mod extractors;
pub mod handlers;
pub mod models;
pub mod oauth;
pub mod routes;
pub mod validators;

#[cfg(test)]
mod tests;

pub use extractors::{require_session, AuthedUser};
pub use models::User;
pub use routes::auth_routes;
