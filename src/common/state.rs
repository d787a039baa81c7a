// Application state shared across all modules

use reqwest::Client;
use sqlx::SqlitePool;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::config::AppConfig;
use crate::services::{AccountStore, ImageHostService, OAuthService, PasswordHasher, TokenService};

/// Application state: configuration plus every service handlers use
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub http: Client,
    pub tokens: Arc<TokenService>,
    pub passwords: PasswordHasher,
    pub accounts: Arc<AccountStore>,
    pub oauth: Arc<OAuthService>,
    pub images: Arc<ImageHostService>,
}

/// How handlers receive the state (via `Extension`)
pub type SharedState = Arc<RwLock<AppState>>;

impl AppState {
    /// Wires every service from one config, pool and HTTP client.
    pub fn new(config: AppConfig, db: SqlitePool, http: Client) -> Self {
        let tokens = TokenService::new(&config.access_token_secret, &config.refresh_token_secret);
        let passwords = PasswordHasher::new(config.bcrypt_cost);
        let accounts = AccountStore::new(db);
        let oauth = OAuthService::new(http.clone(), &config);
        let images = ImageHostService::new(http.clone(), config.image_host.clone());

        Self {
            config: Arc::new(config),
            http,
            tokens: Arc::new(tokens),
            passwords,
            accounts: Arc::new(accounts),
            oauth: Arc::new(oauth),
            images: Arc::new(images),
        }
    }

    pub fn secure_cookies(&self) -> bool {
        self.config.secure_cookies()
    }

    pub fn into_shared(self) -> SharedState {
        Arc::new(RwLock::new(self))
    }
}
