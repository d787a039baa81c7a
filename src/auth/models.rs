//! Authentication data models

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// User database model
#[derive(FromRow, Serialize, Deserialize, Debug, Clone)]
pub struct User {
    pub id: String,
    pub email: String,
    pub username: String,
    #[serde(skip_serializing, default)]
    pub password_hash: Option<String>,
    pub provider: Option<String>,
    pub created_at: String,
}

/// Join record tying a (provider, external id) pair to one local user
#[derive(FromRow, Serialize, Deserialize, Debug, Clone)]
pub struct OAuthLink {
    pub id: String,
    pub provider: String,
    pub external_id: String,
    pub email: String,
    pub user_id: String,
    pub created_at: String,
}

#[derive(Deserialize, Debug)]
pub struct RegisterRequest {
    pub email: String,
    pub username: String,
    pub password: String,
}

#[derive(Deserialize, Debug)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize, Debug)]
pub struct FinishOAuthRequest {
    pub token: String,
    pub password: String,
}

#[derive(Deserialize, Debug, Default)]
pub struct OAuthStartParams {
    pub link_account: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
pub struct OAuthCallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}
