// src/common/config.rs
//! Runtime configuration read from the environment (after `.env` is loaded).

use std::env;
use thiserror::Error;
use tracing::warn;

const DEV_ACCESS_SECRET: &str = "dev_access_secret_change_me";
const DEV_REFRESH_SECRET: &str = "dev_refresh_secret_change_me";

/// bcrypt cost used for every password hash, regardless of how the account
/// was created.
pub const DEFAULT_BCRYPT_COST: u32 = 12;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set when APP_ENV=production")]
    MissingSecret(&'static str),

    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

/// How the `link_account` callback branch decides to fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkAccountMode {
    /// Link only when an OAuth link already exists for the external id.
    Literal,
    /// Link when no OAuth link exists yet for the external id.
    Direct,
}

#[derive(Debug, Clone)]
pub struct ProviderCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
}

#[derive(Debug, Clone)]
pub struct ImageHostConfig {
    pub api_key: String,
    pub upload_url: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub port: u16,
    pub environment: Environment,
    pub access_token_secret: String,
    pub refresh_token_secret: String,
    pub bcrypt_cost: u32,
    pub frontend_url: String,
    pub cors_origins: Vec<String>,
    pub google: Option<ProviderCredentials>,
    pub discord: Option<ProviderCredentials>,
    pub image_host: Option<ImageHostConfig>,
    pub link_account_mode: LinkAccountMode,
    pub log_bodies: bool,
    pub reset_db: bool,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok().filter(|v| !v.is_empty()))
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let flag = |key: &str| {
            lookup(key)
                .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
                .unwrap_or(false)
        };

        let environment = match lookup("APP_ENV").as_deref() {
            Some(v) if v.eq_ignore_ascii_case("production") => Environment::Production,
            _ => Environment::Development,
        };

        let access_token_secret = secret(&lookup, environment, "ACCESS_TOKEN_SECRET", DEV_ACCESS_SECRET)?;
        let refresh_token_secret =
            secret(&lookup, environment, "REFRESH_TOKEN_SECRET", DEV_REFRESH_SECRET)?;

        let port = match lookup("PORT") {
            Some(p) => p.parse::<u16>().map_err(|_| ConfigError::InvalidValue {
                key: "PORT",
                value: p,
            })?,
            None => 8080,
        };

        let bcrypt_cost = match lookup("BCRYPT_COST") {
            Some(c) => match c.parse::<u32>() {
                Ok(cost) if (4..=31).contains(&cost) => cost,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        key: "BCRYPT_COST",
                        value: c,
                    })
                }
            },
            None => DEFAULT_BCRYPT_COST,
        };

        let link_account_mode = match lookup("OAUTH_LINK_MODE").as_deref() {
            None | Some("literal") => LinkAccountMode::Literal,
            Some("direct") => LinkAccountMode::Direct,
            Some(other) => {
                return Err(ConfigError::InvalidValue {
                    key: "OAUTH_LINK_MODE",
                    value: other.to_string(),
                })
            }
        };

        let frontend_url = lookup("FRONTEND_URL")
            .unwrap_or_else(|| "http://localhost:3000".to_string())
            .trim_end_matches('/')
            .to_string();

        let cors_origins = lookup("CORS_ORIGINS")
            .unwrap_or_else(|| frontend_url.clone())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let image_host = lookup("IMAGE_HOST_API_KEY").map(|api_key| ImageHostConfig {
            api_key,
            upload_url: lookup("IMAGE_HOST_UPLOAD_URL")
                .unwrap_or_else(|| "https://api.imgbb.com/1/upload".to_string()),
        });

        Ok(Self {
            database_url: lookup("DATABASE_URL")
                .unwrap_or_else(|| "sqlite://linkpage.db".to_string()),
            port,
            environment,
            access_token_secret,
            refresh_token_secret,
            bcrypt_cost,
            frontend_url,
            cors_origins,
            google: provider(&lookup, "GOOGLE"),
            discord: provider(&lookup, "DISCORD"),
            image_host,
            link_account_mode,
            log_bodies: flag("LOG_BODIES"),
            reset_db: flag("RESET_DB"),
        })
    }

    /// Cookies carry the `Secure` attribute only in production.
    pub fn secure_cookies(&self) -> bool {
        self.environment == Environment::Production
    }
}

fn secret<F>(
    lookup: &F,
    environment: Environment,
    key: &'static str,
    dev_default: &str,
) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(value) => Ok(value),
        None if environment == Environment::Production => Err(ConfigError::MissingSecret(key)),
        None => {
            warn!(key = key, "Signing secret not set, using development default");
            Ok(dev_default.to_string())
        }
    }
}

fn provider<F>(lookup: &F, prefix: &str) -> Option<ProviderCredentials>
where
    F: Fn(&str) -> Option<String>,
{
    Some(ProviderCredentials {
        client_id: lookup(&format!("{}_CLIENT_ID", prefix))?,
        client_secret: lookup(&format!("{}_CLIENT_SECRET", prefix))?,
        redirect_uri: lookup(&format!("{}_REDIRECT_URI", prefix))?,
    })
}
