//! Authentication handlers

use axum::{
    extract::{Extension, Json},
    http::StatusCode,
};
use axum_extra::extract::cookie::CookieJar;
use serde_json::{json, Value};
use tracing::{debug, error, info, warn};

use super::cookies::{self, REFRESH_COOKIE};
use super::extractors::AuthedUser;
use super::models::{LoginRequest, RegisterRequest};
use super::validators::{LoginValidator, RegisterValidator};
use crate::common::{safe_email_log, ApiError, SharedState, Validator};
use crate::services::passwords::PasswordError;
use crate::services::{NewAccount, StoreError};
use crate::website::models::NewWebsite;

fn invalid_credentials() -> ApiError {
    ApiError::Unauthorized("invalid email or password".to_string())
}

/// POST /auth/register
/// Creates a password account with an empty website and signs it in
///
/// # Request Body
/// ```json
/// { "email": "a@b.com", "username": "alice_01", "password": "pass1234" }
/// ```
pub async fn register(
    Extension(state_lock): Extension<SharedState>,
    jar: CookieJar,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, CookieJar, Json<Value>), ApiError> {
    let state = state_lock.read().await.clone();

    RegisterValidator.validate(&payload).into_result()?;

    let email = payload.email.trim().to_string();
    debug!(email = %safe_email_log(&email), username = %payload.username, "Registration requested");

    if state.accounts.find_user_by_email(&email).await?.is_some() {
        warn!(email = %safe_email_log(&email), "Registration rejected: email taken");
        return Err(ApiError::Conflict("email is already taken".to_string()));
    }
    if state
        .accounts
        .find_user_by_username(&payload.username)
        .await?
        .is_some()
    {
        warn!(username = %payload.username, "Registration rejected: username taken");
        return Err(ApiError::Conflict("username is already taken".to_string()));
    }

    let password_hash = state.passwords.hash(&payload.password).await?;

    // A concurrent registration can still win between the checks above and
    // the insert; the unique constraints turn that into the same 409.
    let (user, website) = state
        .accounts
        .create_account(NewAccount {
            email,
            username: payload.username.clone(),
            password_hash: Some(password_hash),
            oauth: None,
            website: NewWebsite::default(),
        })
        .await?;

    let tokens = state.tokens.issue_pair(&user.id, &user.username)?;
    let jar = cookies::with_session(jar, tokens, state.secure_cookies());

    info!(
        user_id = %user.id,
        email = %safe_email_log(&user.email),
        "User registered"
    );

    Ok((
        StatusCode::CREATED,
        jar,
        Json(json!({ "user": user, "website": website })),
    ))
}

/// POST /auth/login
///
/// Unknown email, wrong password and accounts without a password all get the
/// same 401.
pub async fn login(
    Extension(state_lock): Extension<SharedState>,
    jar: CookieJar,
    Json(payload): Json<LoginRequest>,
) -> Result<(CookieJar, Json<Value>), ApiError> {
    let state = state_lock.read().await.clone();

    LoginValidator.validate(&payload).into_result()?;

    let email = payload.email.trim();
    let user = match state.accounts.find_user_by_email(email).await? {
        Some(user) => user,
        None => {
            debug!(email = %safe_email_log(email), "Login failed: unknown email");
            return Err(invalid_credentials());
        }
    };

    let Some(hash) = user.password_hash.as_deref() else {
        debug!(user_id = %user.id, "Login failed: account has no password");
        return Err(invalid_credentials());
    };

    match state.passwords.verify(&payload.password, hash).await {
        Ok(true) => {}
        Ok(false) => {
            debug!(user_id = %user.id, "Login failed: wrong password");
            return Err(invalid_credentials());
        }
        Err(PasswordError::MalformedHash) => {
            error!(user_id = %user.id, "Stored password hash is malformed");
            return Err(invalid_credentials());
        }
        Err(e) => return Err(e.into()),
    }

    let tokens = state.tokens.issue_pair(&user.id, &user.username)?;
    let jar = cookies::with_session(jar, tokens, state.secure_cookies());

    info!(user_id = %user.id, "User logged in");
    Ok((jar, Json(json!({ "user": user }))))
}

/// POST /auth/logout
/// Tokens are stateless; logging out only clears the cookies.
pub async fn logout(
    Extension(state_lock): Extension<SharedState>,
    jar: CookieJar,
) -> (CookieJar, Json<Value>) {
    let secure = state_lock.read().await.secure_cookies();
    (
        cookies::cleared(jar, secure),
        Json(json!({ "message": "logged out" })),
    )
}

/// POST /auth/refresh
/// Issues a new access token from the refresh-token cookie.
pub async fn refresh(
    Extension(state_lock): Extension<SharedState>,
    jar: CookieJar,
) -> Result<(CookieJar, Json<Value>), ApiError> {
    let state = state_lock.read().await.clone();

    let token = match jar.get(REFRESH_COOKIE).map(|c| c.value()) {
        Some(t) if !t.is_empty() => t.to_string(),
        _ => return Err(ApiError::Unauthorized("refresh token required".to_string())),
    };

    let session = state.tokens.verify_refresh(&token).map_err(|_| {
        warn!("Refresh rejected: invalid refresh token");
        ApiError::Unauthorized("invalid or expired refresh token".to_string())
    })?;

    let access = state.tokens.issue_access(&session.user_id, &session.username)?;
    let jar = jar.add(cookies::access_cookie(access, state.secure_cookies()));

    debug!(user_id = %session.user_id, "Access token refreshed");
    Ok((jar, Json(json!({ "message": "token refreshed" }))))
}

/// GET /api/me
pub async fn me(
    Extension(state_lock): Extension<SharedState>,
    authed: AuthedUser,
) -> Result<Json<Value>, ApiError> {
    let state = state_lock.read().await.clone();

    let user = state
        .accounts
        .find_user_by_id(&authed.id)
        .await?
        .ok_or(StoreError::NotFound("user"))?;
    let website = state.accounts.find_website_by_user(&user.id).await?;

    Ok(Json(json!({ "user": user, "website": website })))
}
