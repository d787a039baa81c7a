// src/website/models.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

pub const THEMES: &[&str] = &["light", "dark", "sunset", "ocean", "forest"];
pub const DEFAULT_THEME: &str = "light";
pub const MAX_LINKS_PER_WEBSITE: i64 = 50;

/// Public profile page owned by exactly one user
#[derive(FromRow, Serialize, Deserialize, Debug, Clone)]
pub struct Website {
    pub id: String,
    pub user_id: String,
    pub display_name: Option<String>,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    pub theme: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(FromRow, Serialize, Deserialize, Debug, Clone)]
pub struct SocialLink {
    pub id: String,
    pub website_id: String,
    pub title: String,
    pub url: String,
    pub position: i64,
    pub created_at: String,
}

/// Initial website values written at account creation
#[derive(Debug, Clone, Default)]
pub struct NewWebsite {
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
pub struct UpdateWebsiteRequest {
    pub display_name: Option<String>,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    pub theme: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct CreateLinkRequest {
    pub title: String,
    pub url: String,
}

#[derive(Deserialize, Debug, Default)]
pub struct UpdateLinkRequest {
    pub title: Option<String>,
    pub url: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct ReorderLinksRequest {
    pub ids: Vec<String>,
}

/// What visitors see at the public page
#[derive(Serialize, Debug)]
pub struct PublicPage {
    pub username: String,
    pub display_name: Option<String>,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    pub theme: String,
    pub links: Vec<PublicLink>,
}

#[derive(Serialize, Debug)]
pub struct PublicLink {
    pub title: String,
    pub url: String,
}
