//! Website routes

use axum::{
    middleware,
    routing::{get, put},
    Router,
};

use super::handlers;
use crate::auth::require_session;

/// Creates and returns the website router
///
/// # Routes
/// - `GET/PUT /api/website` - Own website (session required)
/// - `GET/POST /api/links` - Own links (session required)
/// - `PUT /api/links/reorder` - Reorder own links (session required)
/// - `PUT/DELETE /api/links/:id` - Edit or remove a link (session required)
/// - `GET /api/public/:username` - Public page
pub fn website_routes() -> Router {
    let protected = Router::new()
        .route(
            "/api/website",
            get(handlers::get_website).put(handlers::update_website),
        )
        .route(
            "/api/links",
            get(handlers::list_links).post(handlers::create_link),
        )
        .route("/api/links/reorder", put(handlers::reorder_links))
        .route(
            "/api/links/:id",
            put(handlers::update_link).delete(handlers::delete_link),
        )
        .route_layer(middleware::from_fn(require_session));

    Router::new()
        .route("/api/public/:username", get(handlers::public_page))
        .merge(protected)
}
