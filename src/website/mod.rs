//! # Website Module
//!
//! The user's public page: display settings, ordered social links and the
//! unauthenticated public view.

pub mod handlers;
pub mod models;
pub mod routes;
pub mod validators;


pub use routes::website_routes;
