//! Authentication routes

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use super::{extractors::require_session, handlers, oauth};

/// Creates and returns the authentication router
///
/// # Routes
/// - `POST /auth/register` - Password registration
/// - `POST /auth/login` - Password login
/// - `POST /auth/logout` - Clear session cookies
/// - `POST /auth/refresh` - New access token from the refresh cookie
/// - `GET /auth/oauth/:provider` - Redirect to the provider
/// - `GET /auth/oauth/:provider/callback` - Provider callback
/// - `POST /auth/oauth/finish` - Complete a registration handoff
/// - `GET /auth/errors/:reason` - Message for an OAuth error reason
/// - `GET /api/me` - Current user (session required)
pub fn auth_routes() -> Router {
    let protected = Router::new()
        .route("/api/me", get(handlers::me))
        .route_layer(middleware::from_fn(require_session));

    Router::new()
        .route("/auth/register", post(handlers::register))
        .route("/auth/login", post(handlers::login))
        .route("/auth/logout", post(handlers::logout))
        .route("/auth/refresh", post(handlers::refresh))
        .route("/auth/oauth/finish", post(oauth::finish_oauth))
        .route("/auth/oauth/:provider", get(oauth::oauth_start))
        .route("/auth/oauth/:provider/callback", get(oauth::oauth_callback))
        .route("/auth/errors/:reason", get(oauth::oauth_error_message))
        .merge(protected)
}
