//! Website and social link handlers

use axum::{
    extract::{Extension, Json, Path},
    http::StatusCode,
};
use serde_json::{json, Value};
use tracing::info;

use super::models::*;
use super::validators::{CreateLinkValidator, UpdateLinkValidator, WebsiteUpdateValidator};
use crate::auth::AuthedUser;
use crate::common::{ApiError, SharedState, Validator};

// ============================================================================
// Website
// ============================================================================

/// GET /api/website
pub async fn get_website(
    Extension(state_lock): Extension<SharedState>,
    authed: AuthedUser,
) -> Result<Json<Value>, ApiError> {
    let state = state_lock.read().await.clone();

    let website = state.accounts.website_for_user(&authed.id).await?;
    let links = state.accounts.list_links(&website.id).await?;

    Ok(Json(json!({ "website": website, "links": links })))
}

/// PUT /api/website
/// Updates any of display name, bio, avatar and theme
pub async fn update_website(
    Extension(state_lock): Extension<SharedState>,
    authed: AuthedUser,
    Json(payload): Json<UpdateWebsiteRequest>,
) -> Result<Json<Website>, ApiError> {
    let state = state_lock.read().await.clone();

    WebsiteUpdateValidator.validate(&payload).into_result()?;

    let website = state.accounts.update_website(&authed.id, &payload).await?;
    info!(user_id = %authed.id, website_id = %website.id, "Website updated");

    Ok(Json(website))
}

// ============================================================================
// Social links
// ============================================================================

/// GET /api/links
pub async fn list_links(
    Extension(state_lock): Extension<SharedState>,
    authed: AuthedUser,
) -> Result<Json<Vec<SocialLink>>, ApiError> {
    let state = state_lock.read().await.clone();
    let website = state.accounts.website_for_user(&authed.id).await?;
    Ok(Json(state.accounts.list_links(&website.id).await?))
}

/// POST /api/links
pub async fn create_link(
    Extension(state_lock): Extension<SharedState>,
    authed: AuthedUser,
    Json(payload): Json<CreateLinkRequest>,
) -> Result<(StatusCode, Json<SocialLink>), ApiError> {
    let state = state_lock.read().await.clone();

    CreateLinkValidator.validate(&payload).into_result()?;

    let website = state.accounts.website_for_user(&authed.id).await?;
    let link = state
        .accounts
        .create_link(&website.id, payload.title.trim(), payload.url.trim())
        .await?;
    info!(user_id = %authed.id, link_id = %link.id, "Link created");

    Ok((StatusCode::CREATED, Json(link)))
}

/// PUT /api/links/:id
pub async fn update_link(
    Extension(state_lock): Extension<SharedState>,
    authed: AuthedUser,
    Path(link_id): Path<String>,
    Json(payload): Json<UpdateLinkRequest>,
) -> Result<Json<SocialLink>, ApiError> {
    let state = state_lock.read().await.clone();

    UpdateLinkValidator.validate(&payload).into_result()?;

    let website = state.accounts.website_for_user(&authed.id).await?;
    let link = state
        .accounts
        .update_link(
            &website.id,
            &link_id,
            payload.title.as_deref().map(str::trim),
            payload.url.as_deref().map(str::trim),
        )
        .await?;

    Ok(Json(link))
}

/// DELETE /api/links/:id
pub async fn delete_link(
    Extension(state_lock): Extension<SharedState>,
    authed: AuthedUser,
    Path(link_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let state = state_lock.read().await.clone();

    let website = state.accounts.website_for_user(&authed.id).await?;
    state.accounts.delete_link(&website.id, &link_id).await?;
    info!(user_id = %authed.id, link_id = %link_id, "Link deleted");

    Ok(StatusCode::NO_CONTENT)
}

/// PUT /api/links/reorder
///
/// # Request Body
/// ```json
/// { "ids": ["L_...", "L_..."] }
/// ```
pub async fn reorder_links(
    Extension(state_lock): Extension<SharedState>,
    authed: AuthedUser,
    Json(payload): Json<ReorderLinksRequest>,
) -> Result<Json<Vec<SocialLink>>, ApiError> {
    let state = state_lock.read().await.clone();

    let website = state.accounts.website_for_user(&authed.id).await?;
    let links = state.accounts.reorder_links(&website.id, &payload.ids).await?;

    Ok(Json(links))
}

// ============================================================================
// Public page
// ============================================================================

/// GET /api/public/:username
pub async fn public_page(
    Extension(state_lock): Extension<SharedState>,
    Path(username): Path<String>,
) -> Result<Json<PublicPage>, ApiError> {
    let state = state_lock.read().await.clone();

    let user = state
        .accounts
        .find_user_by_username(&username)
        .await?
        .ok_or_else(|| ApiError::NotFound("page not found".to_string()))?;
    let website = state
        .accounts
        .find_website_by_user(&user.id)
        .await?
        .ok_or_else(|| ApiError::NotFound("page not found".to_string()))?;
    let links = state.accounts.list_links(&website.id).await?;

    Ok(Json(PublicPage {
        username: user.username,
        display_name: website.display_name,
        bio: website.bio,
        avatar_url: website.avatar_url,
        theme: website.theme,
        links: links
            .into_iter()
            .map(|l| PublicLink {
                title: l.title,
                url: l.url,
            })
            .collect(),
    }))
}
