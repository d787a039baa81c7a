//! Browser-facing OAuth flow
//!
//! `oauth_start` sends the browser to the provider, `oauth_callback` decides
//! what the returned identity means locally (login, account linking or a
//! registration handoff) and `finish_oauth` turns a handoff into an account.
//! Every callback failure ends in a redirect to the frontend error page with a
//! short reason code; the cause is only logged.

use axum::{
    extract::{Extension, Json, Path, Query},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::CookieJar;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, error, info, warn};

use super::cookies;
use super::extractors::authenticate;
use super::models::{FinishOAuthRequest, OAuthCallbackParams, OAuthStartParams, User};
use crate::common::config::LinkAccountMode;
use crate::common::validation::{check_email, check_password, is_valid_username};
use crate::common::{
    generate_placeholder_username, safe_email_log, safe_token_log, ApiError, AppState,
    SharedState, ValidationResult,
};
use crate::services::oauth::ProviderProfile;
use crate::services::tokens::{HandoffIdentity, LinkTarget};
use crate::services::{NewAccount, NewOAuthLink, Provider, StoreError};
use crate::website::models::{NewWebsite, Website};

const PLACEHOLDER_ATTEMPTS: usize = 5;

pub const AVATAR_UPLOAD_FAILED: &str = "avatar-upload-failed";

/// Reason codes carried to the frontend error page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OAuthFailure {
    MissingCode,
    OAuthFailed,
    EmailNotAvailable,
    EmailTaken,
    InvalidProvider,
}

impl OAuthFailure {
    pub const ALL: [OAuthFailure; 5] = [
        OAuthFailure::MissingCode,
        OAuthFailure::OAuthFailed,
        OAuthFailure::EmailNotAvailable,
        OAuthFailure::EmailTaken,
        OAuthFailure::InvalidProvider,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            OAuthFailure::MissingCode => "missing-code",
            OAuthFailure::OAuthFailed => "oauth-failed",
            OAuthFailure::EmailNotAvailable => "email-not-available",
            OAuthFailure::EmailTaken => "email-taken",
            OAuthFailure::InvalidProvider => "invalid-provider",
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            OAuthFailure::MissingCode => {
                "The sign-in provider did not return an authorization code. Please try again."
            }
            OAuthFailure::OAuthFailed => {
                "We could not complete sign-in with the provider. Please try again."
            }
            OAuthFailure::EmailNotAvailable => {
                "Your provider account has no email address we can use. Add one with the provider or register with email instead."
            }
            OAuthFailure::EmailTaken => {
                "An account with this email already exists. Log in with your password and link the provider from settings."
            }
            OAuthFailure::InvalidProvider => "This sign-in provider is not supported.",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.code() == code)
    }
}

/// Round-tripped through the provider as the `state` parameter.
///
/// Plain logins send just the provider name; linking sends JSON whose
/// `link_account` is a signed link-state token, never a bare email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallbackState {
    pub provider: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link_account: Option<String>,
}

impl CallbackState {
    pub fn encode(&self) -> String {
        match &self.link_account {
            None => self.provider.clone(),
            Some(_) => serde_json::to_string(self).unwrap_or_else(|_| self.provider.clone()),
        }
    }

    pub fn decode(raw: &str) -> Self {
        serde_json::from_str(raw).unwrap_or_else(|_| CallbackState {
            provider: raw.to_string(),
            link_account: None,
        })
    }
}

/// What a successful callback resolved to
#[derive(Debug)]
pub enum CallbackOutcome {
    LoggedIn(User),
    Linked { user_id: String },
    Handoff(String),
}

fn error_redirect(frontend: &str, failure: OAuthFailure) -> Redirect {
    Redirect::to(&format!("{}/auth/error?reason={}", frontend, failure.code()))
}

/// Signs a link-state for the session user behind `jar`.
async fn link_state_for_session(
    state: &AppState,
    jar: &CookieJar,
    provider: Provider,
) -> Result<String, OAuthFailure> {
    let session = authenticate(jar, &state.tokens).map_err(|_| {
        warn!(provider = %provider, "Account link requested without a session");
        OAuthFailure::OAuthFailed
    })?;

    let user = state
        .accounts
        .find_user_by_id(&session.id)
        .await
        .map_err(|e| {
            error!(error = %e, "Database error during OAuth start");
            OAuthFailure::OAuthFailed
        })?
        .ok_or_else(|| {
            warn!(user_id = %session.id, "Session user no longer exists");
            OAuthFailure::OAuthFailed
        })?;

    state
        .tokens
        .issue_link_state(&LinkTarget {
            provider: provider.as_str().to_string(),
            user_id: user.id,
            email: user.email,
        })
        .map_err(|e| {
            error!(error = %e, "Failed to sign link state");
            OAuthFailure::OAuthFailed
        })
}

/// GET /auth/oauth/:provider
///
/// `?link_account=` asks to link the provider to the signed-in account. The
/// target is always the session user, whatever value the parameter carries.
pub async fn oauth_start(
    Extension(state_lock): Extension<SharedState>,
    Path(provider): Path<String>,
    Query(params): Query<OAuthStartParams>,
    jar: CookieJar,
) -> Redirect {
    let state = state_lock.read().await.clone();
    let frontend = state.config.frontend_url.as_str();

    let provider: Provider = match provider.parse() {
        Ok(p) => p,
        Err(e) => {
            warn!(error = %e, "OAuth start rejected");
            return error_redirect(frontend, OAuthFailure::InvalidProvider);
        }
    };

    if !state.oauth.is_configured(provider) {
        warn!(provider = %provider, "OAuth start for unconfigured provider");
        return error_redirect(frontend, OAuthFailure::InvalidProvider);
    }

    let wants_link = params
        .link_account
        .as_deref()
        .is_some_and(|v| !v.trim().is_empty());

    let link_account = if wants_link {
        match link_state_for_session(&state, &jar, provider).await {
            Ok(token) => Some(token),
            Err(failure) => return error_redirect(frontend, failure),
        }
    } else {
        None
    };

    let callback_state = CallbackState {
        provider: provider.as_str().to_string(),
        link_account,
    };

    match state
        .oauth
        .authorization_url(provider, &callback_state.encode())
    {
        Ok(url) => {
            info!(
                provider = %provider,
                linking = callback_state.link_account.is_some(),
                "Redirecting to OAuth provider"
            );
            Redirect::to(&url)
        }
        Err(e) => {
            warn!(error = %e, "OAuth start rejected");
            error_redirect(frontend, OAuthFailure::InvalidProvider)
        }
    }
}

/// GET /auth/oauth/:provider/callback
pub async fn oauth_callback(
    Extension(state_lock): Extension<SharedState>,
    Path(provider): Path<String>,
    Query(params): Query<OAuthCallbackParams>,
    jar: CookieJar,
) -> Response {
    let state = state_lock.read().await.clone();
    let frontend = state.config.frontend_url.clone();

    let provider: Provider = match provider.parse() {
        Ok(p) => p,
        Err(_) => return error_redirect(&frontend, OAuthFailure::InvalidProvider).into_response(),
    };

    match resolve_callback(&state, provider, params).await {
        Ok(CallbackOutcome::LoggedIn(user)) => {
            let tokens = match state.tokens.issue_pair(&user.id, &user.username) {
                Ok(t) => t,
                Err(e) => {
                    error!(error = %e, user_id = %user.id, "Failed to issue tokens after OAuth login");
                    return error_redirect(&frontend, OAuthFailure::OAuthFailed).into_response();
                }
            };
            info!(user_id = %user.id, provider = %provider, "User logged in via OAuth");
            let jar = cookies::with_session(jar, tokens, state.secure_cookies());
            (jar, Redirect::to(&format!("{}/dashboard", frontend))).into_response()
        }
        Ok(CallbackOutcome::Linked { user_id }) => {
            debug!(user_id = %user_id, provider = %provider, "Redirecting after account link");
            Redirect::to(&format!(
                "{}/dashboard/settings?linked={}",
                frontend,
                provider.as_str()
            ))
            .into_response()
        }
        Ok(CallbackOutcome::Handoff(token)) => Redirect::to(&format!(
            "{}/auth/complete-signup?token={}",
            frontend,
            urlencoding::encode(&token)
        ))
        .into_response(),
        Err(failure) => {
            warn!(provider = %provider, reason = failure.code(), "OAuth callback failed");
            error_redirect(&frontend, failure).into_response()
        }
    }
}

/// Exchanges the code, fetches the profile and decides what it means locally.
pub async fn resolve_callback(
    state: &AppState,
    provider: Provider,
    params: OAuthCallbackParams,
) -> Result<CallbackOutcome, OAuthFailure> {
    if let Some(err) = params.error.as_deref() {
        warn!(provider = %provider, error = %err, "Provider returned an error");
        return Err(OAuthFailure::OAuthFailed);
    }

    let code = match params.code.as_deref() {
        Some(c) if !c.is_empty() => c,
        _ => return Err(OAuthFailure::MissingCode),
    };

    let callback_state = params
        .state
        .as_deref()
        .map(CallbackState::decode)
        .unwrap_or_else(|| CallbackState {
            provider: provider.as_str().to_string(),
            link_account: None,
        });
    if !callback_state.provider.eq_ignore_ascii_case(provider.as_str()) {
        warn!(
            provider = %provider,
            state_provider = %callback_state.provider,
            "OAuth state does not match callback provider"
        );
        return Err(OAuthFailure::OAuthFailed);
    }

    let link_target = match callback_state.link_account.as_deref() {
        None => None,
        Some(raw) => {
            let target = state.tokens.verify_link_state(raw).map_err(|_| {
                warn!(provider = %provider, "Rejected unverifiable link state");
                OAuthFailure::OAuthFailed
            })?;
            if !target.provider.eq_ignore_ascii_case(provider.as_str()) {
                warn!(provider = %provider, "Link state was issued for another provider");
                return Err(OAuthFailure::OAuthFailed);
            }
            Some(target)
        }
    };

    let access_token = state
        .oauth
        .exchange_code(provider, code)
        .await
        .map_err(|e| {
            error!(provider = %provider, error = %e, "OAuth code exchange failed");
            OAuthFailure::OAuthFailed
        })?;

    let profile = state
        .oauth
        .fetch_profile(provider, &access_token)
        .await
        .map_err(|e| {
            error!(provider = %provider, error = %e, "OAuth profile fetch failed");
            OAuthFailure::OAuthFailed
        })?;

    let Some(email) = profile.email.clone() else {
        warn!(provider = %provider, external_id = %profile.external_id, "Provider returned no email");
        return Err(OAuthFailure::EmailNotAvailable);
    };

    let db_failure = |e: StoreError| {
        error!(provider = %provider, error = %e, "Database error during OAuth callback");
        OAuthFailure::OAuthFailed
    };

    let existing = state
        .accounts
        .find_oauth_link(provider.as_str(), &profile.external_id)
        .await
        .map_err(db_failure)?;

    if let Some(link_target) = link_target {
        let branch_fires = match state.config.link_account_mode {
            LinkAccountMode::Literal => existing.is_some(),
            LinkAccountMode::Direct => existing.is_none(),
        };

        if branch_fires {
            let target = state
                .accounts
                .find_user_by_email(&link_target.email)
                .await
                .map_err(db_failure)?
                .filter(|user| user.id == link_target.user_id)
                .ok_or_else(|| {
                    warn!(email = %safe_email_log(&link_target.email), "Link target account not found");
                    OAuthFailure::OAuthFailed
                })?;

            state
                .accounts
                .link_oauth(
                    &NewOAuthLink {
                        provider: provider.as_str().to_string(),
                        external_id: profile.external_id.clone(),
                        email: email.clone(),
                    },
                    &target.id,
                )
                .await
                .map_err(db_failure)?;

            return Ok(CallbackOutcome::Linked { user_id: target.id });
        }
    }

    if let Some(link) = existing {
        let user = state
            .accounts
            .find_user_by_id(&link.user_id)
            .await
            .map_err(db_failure)?
            .ok_or_else(|| {
                error!(user_id = %link.user_id, "OAuth link points at a missing user");
                OAuthFailure::OAuthFailed
            })?;
        return Ok(CallbackOutcome::LoggedIn(user));
    }

    if state
        .accounts
        .find_user_by_email(&email)
        .await
        .map_err(db_failure)?
        .is_some()
    {
        return Err(OAuthFailure::EmailTaken);
    }

    let token = state
        .tokens
        .issue_handoff(&handoff_identity(provider, profile, email))
        .map_err(|e| {
            error!(error = %e, "Failed to sign handoff token");
            OAuthFailure::OAuthFailed
        })?;

    debug!(provider = %provider, token = %safe_token_log(&token), "Issued registration handoff");
    Ok(CallbackOutcome::Handoff(token))
}

fn handoff_identity(provider: Provider, profile: ProviderProfile, email: String) -> HandoffIdentity {
    HandoffIdentity {
        provider: provider.as_str().to_string(),
        external_id: profile.external_id,
        email,
        name: profile.name,
        avatar: profile.avatar,
    }
}

/// Provider name when usable and free, otherwise a fresh placeholder.
async fn choose_username(state: &AppState, name: Option<&str>) -> Result<String, ApiError> {
    if let Some(name) = name.filter(|n| is_valid_username(n)) {
        if state.accounts.find_user_by_username(name).await?.is_none() {
            return Ok(name.to_string());
        }
        debug!(username = %name, "Provider username taken, using placeholder");
    }

    let mut candidate = generate_placeholder_username();
    for _ in 1..PLACEHOLDER_ATTEMPTS {
        if state
            .accounts
            .find_user_by_username(&candidate)
            .await?
            .is_none()
        {
            break;
        }
        candidate = generate_placeholder_username();
    }
    Ok(candidate)
}

/// Creates the account, swapping in a fresh placeholder whenever the
/// username was claimed between `choose_username` and the insert.
async fn create_with_free_username(
    state: &AppState,
    mut account: NewAccount,
) -> Result<(User, Website), StoreError> {
    let mut retries = 0;
    loop {
        match state.accounts.create_account(account.clone()).await {
            Err(StoreError::Conflict("username")) if retries < PLACEHOLDER_ATTEMPTS => {
                retries += 1;
                debug!(username = %account.username, retries, "Username claimed concurrently, retrying");
                account.username = generate_placeholder_username();
            }
            result => return result,
        }
    }
}

/// POST /auth/oauth/finish
/// Completes a registration handoff with the chosen password
///
/// # Request Body
/// ```json
/// { "token": "<handoff token>", "password": "letters123" }
/// ```
pub async fn finish_oauth(
    Extension(state_lock): Extension<SharedState>,
    jar: CookieJar,
    Json(payload): Json<FinishOAuthRequest>,
) -> Result<(StatusCode, CookieJar, Json<Value>), ApiError> {
    let state = state_lock.read().await.clone();

    let identity = state.tokens.verify_handoff(&payload.token).map_err(|_| {
        warn!("OAuth finish rejected: invalid handoff token");
        ApiError::Unauthorized("invalid or expired token".to_string())
    })?;

    let mut validation = ValidationResult::new();
    check_email(&mut validation, &identity.email);
    check_password(&mut validation, &payload.password);
    validation.into_result()?;

    if state
        .accounts
        .find_user_by_email(&identity.email)
        .await?
        .is_some()
    {
        return Err(ApiError::Conflict("email is already taken".to_string()));
    }
    if state
        .accounts
        .find_oauth_link(&identity.provider, &identity.external_id)
        .await?
        .is_some()
    {
        return Err(ApiError::Conflict("oauth account is already linked".to_string()));
    }

    let username = choose_username(&state, identity.name.as_deref()).await?;
    let password_hash = state.passwords.hash(&payload.password).await?;

    // Without an image host the provider URL is kept as-is.
    let rehost_avatar = state.images.is_configured();
    let initial_avatar = if rehost_avatar {
        None
    } else {
        identity.avatar.clone()
    };

    let (user, mut website) = create_with_free_username(
        &state,
        NewAccount {
            email: identity.email.clone(),
            username,
            password_hash: Some(password_hash),
            oauth: Some(NewOAuthLink {
                provider: identity.provider.clone(),
                external_id: identity.external_id.clone(),
                email: identity.email.clone(),
            }),
            website: NewWebsite {
                display_name: identity.name.clone(),
                avatar_url: initial_avatar,
            },
        },
    )
    .await?;

    let mut warnings: Vec<&str> = Vec::new();
    if let (true, Some(remote)) = (rehost_avatar, identity.avatar.as_deref()) {
        match state.images.rehost(remote).await {
            Ok(hosted) => match state.accounts.set_website_avatar(&user.id, &hosted).await {
                Ok(()) => website.avatar_url = Some(hosted),
                Err(e) => {
                    error!(user_id = %user.id, error = %e, "Failed to store re-hosted avatar");
                    warnings.push(AVATAR_UPLOAD_FAILED);
                }
            },
            Err(e) => {
                warn!(user_id = %user.id, error = %e, "Avatar re-hosting failed");
                warnings.push(AVATAR_UPLOAD_FAILED);
            }
        }
    }

    let tokens = state.tokens.issue_pair(&user.id, &user.username)?;
    let jar = cookies::with_session(jar, tokens, state.secure_cookies());

    info!(
        user_id = %user.id,
        email = %safe_email_log(&user.email),
        provider = %identity.provider,
        "User registered via OAuth"
    );

    Ok((
        StatusCode::CREATED,
        jar,
        Json(json!({ "user": user, "website": website, "warnings": warnings })),
    ))
}

/// GET /auth/errors/:reason
pub async fn oauth_error_message(Path(reason): Path<String>) -> Result<Json<Value>, ApiError> {
    let failure = OAuthFailure::from_code(&reason)
        .ok_or_else(|| ApiError::NotFound(format!("unknown reason: {}", reason)))?;

    Ok(Json(json!({
        "reason": failure.code(),
        "message": failure.message(),
    })))
}
