//! Session enforcement for protected routes
//!
//! `require_session` is layered onto every protected router and rejects the
//! request with 401 before any handler runs. Handlers then pick up the
//! identity with the `AuthedUser` extractor.

use async_trait::async_trait;
use axum::{
    extract::{Extension, FromRequestParts, Request},
    http::request::Parts,
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use tracing::{debug, warn};

use super::cookies::ACCESS_COOKIE;
use crate::common::{ApiError, SharedState};
use crate::services::TokenService;

/// Authenticated identity decoded from the access token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthedUser {
    pub id: String,
    pub username: String,
}

/// Verifies the access-token cookie.
///
/// Missing, malformed, forged and expired tokens all produce the same 401.
pub fn authenticate(jar: &CookieJar, tokens: &TokenService) -> Result<AuthedUser, ApiError> {
    let token = match jar.get(ACCESS_COOKIE).map(|c| c.value()) {
        Some(t) if !t.is_empty() => t,
        _ => {
            debug!("Authentication failed: missing access token cookie");
            return Err(ApiError::Unauthorized("authentication required".into()));
        }
    };

    let session = tokens.verify_access(token).map_err(|_| {
        warn!("Authentication failed: invalid access token");
        ApiError::Unauthorized("authentication required".into())
    })?;

    Ok(AuthedUser {
        id: session.user_id,
        username: session.username,
    })
}

/// Middleware: attach `AuthedUser` to the request or answer 401.
pub async fn require_session(
    Extension(state_lock): Extension<SharedState>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let tokens = state_lock.read().await.tokens.clone();
    let user = authenticate(&jar, &tokens)?;

    debug!(user_id = %user.id, "Session verified");
    request.extensions_mut().insert(user);

    Ok(next.run(request).await)
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthedUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(user) = parts.extensions.get::<AuthedUser>() {
            return Ok(user.clone());
        }

        // Route without the middleware layer: verify here instead.
        let Extension(state_lock): Extension<SharedState> =
            Extension::from_request_parts(parts, state)
                .await
                .map_err(|_| ApiError::InternalServer("missing app state".to_string()))?;
        let tokens = state_lock.read().await.tokens.clone();

        let jar = CookieJar::from_headers(&parts.headers);
        authenticate(&jar, &tokens)
    }
}
