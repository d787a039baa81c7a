// src/services/oauth.rs
//! OAuth 2.0 authorization-code client for the supported identity providers.
//!
//! Only the provider-facing half lives here: authorize URL construction,
//! code-for-token exchange and the user-info fetch. Deciding what a callback
//! means for local accounts is done in `auth::oauth`.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::{debug, error, info};

use crate::common::config::{AppConfig, ProviderCredentials};

#[derive(Debug, Error)]
pub enum OAuthError {
    #[error("unknown OAuth provider: {0}")]
    UnknownProvider(String),

    #[error("OAuth provider {0} is not configured")]
    NotConfigured(Provider),

    #[error("token exchange failed: {0}")]
    ExchangeFailed(String),

    #[error("user info request failed: {0}")]
    UserInfoFailed(String),

    #[error("HTTP request failed: {0}")]
    RequestFailed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Google,
    Discord,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Google => "google",
            Provider::Discord => "discord",
        }
    }

    pub fn scopes(&self) -> &'static str {
        match self {
            Provider::Google => "openid email profile",
            Provider::Discord => "identify email",
        }
    }

    pub fn default_endpoints(&self) -> ProviderEndpoints {
        match self {
            Provider::Google => ProviderEndpoints {
                authorize_url: "https://accounts.google.com/o/oauth2/v2/auth".to_string(),
                token_url: "https://oauth2.googleapis.com/token".to_string(),
                userinfo_url: "https://www.googleapis.com/oauth2/v2/userinfo".to_string(),
            },
            Provider::Discord => ProviderEndpoints {
                authorize_url: "https://discord.com/api/oauth2/authorize".to_string(),
                token_url: "https://discord.com/api/oauth2/token".to_string(),
                userinfo_url: "https://discord.com/api/users/@me".to_string(),
            },
        }
    }

    /// Normalizes the provider's user-info payload.
    ///
    /// An email the provider does not report as verified is dropped.
    pub fn parse_profile(&self, body: serde_json::Value) -> Result<ProviderProfile, OAuthError> {
        let invalid = |e: serde_json::Error| OAuthError::UserInfoFailed(e.to_string());

        match self {
            Provider::Google => {
                #[derive(Deserialize)]
                struct GoogleUser {
                    id: String,
                    email: Option<String>,
                    #[serde(default)]
                    verified_email: bool,
                    name: Option<String>,
                    picture: Option<String>,
                }

                let user: GoogleUser = serde_json::from_value(body).map_err(invalid)?;
                Ok(ProviderProfile {
                    external_id: user.id,
                    email: verified(user.email, user.verified_email),
                    name: non_empty(user.name),
                    avatar: non_empty(user.picture),
                })
            }
            Provider::Discord => {
                #[derive(Deserialize)]
                struct DiscordUser {
                    id: String,
                    email: Option<String>,
                    #[serde(default)]
                    verified: bool,
                    username: Option<String>,
                    global_name: Option<String>,
                    avatar: Option<String>,
                }

                let user: DiscordUser = serde_json::from_value(body).map_err(invalid)?;
                let avatar = non_empty(user.avatar).map(|hash| {
                    format!("https://cdn.discordapp.com/avatars/{}/{}.png", user.id, hash)
                });
                Ok(ProviderProfile {
                    email: verified(user.email, user.verified),
                    name: non_empty(user.username).or_else(|| non_empty(user.global_name)),
                    avatar,
                    external_id: user.id,
                })
            }
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = OAuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "google" => Ok(Provider::Google),
            "discord" => Ok(Provider::Discord),
            other => Err(OAuthError::UnknownProvider(other.to_string())),
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn verified(email: Option<String>, is_verified: bool) -> Option<String> {
    non_empty(email).filter(|_| is_verified)
}

#[derive(Debug, Clone)]
pub struct ProviderEndpoints {
    pub authorize_url: String,
    pub token_url: String,
    pub userinfo_url: String,
}

/// Identity as reported by a provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderProfile {
    pub external_id: String,
    pub email: Option<String>,
    pub name: Option<String>,
    pub avatar: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Clone)]
struct ProviderClient {
    credentials: ProviderCredentials,
    endpoints: ProviderEndpoints,
}

#[derive(Debug, Clone)]
pub struct OAuthService {
    client: Client,
    providers: HashMap<Provider, ProviderClient>,
}

impl OAuthService {
    pub fn new(client: Client, config: &AppConfig) -> Self {
        let mut service = Self {
            client,
            providers: HashMap::new(),
        };

        for (provider, credentials) in [
            (Provider::Google, config.google.clone()),
            (Provider::Discord, config.discord.clone()),
        ] {
            match credentials {
                Some(credentials) => {
                    info!(provider = %provider, "OAuth provider configured");
                    service = service.with_provider(provider, credentials, provider.default_endpoints());
                }
                None => debug!(provider = %provider, "OAuth provider not configured"),
            }
        }

        service
    }

    /// Registers (or replaces) a provider with explicit endpoints.
    pub fn with_provider(
        mut self,
        provider: Provider,
        credentials: ProviderCredentials,
        endpoints: ProviderEndpoints,
    ) -> Self {
        self.providers.insert(
            provider,
            ProviderClient {
                credentials,
                endpoints,
            },
        );
        self
    }

    pub fn is_configured(&self, provider: Provider) -> bool {
        self.providers.contains_key(&provider)
    }

    fn provider(&self, provider: Provider) -> Result<&ProviderClient, OAuthError> {
        self.providers
            .get(&provider)
            .ok_or(OAuthError::NotConfigured(provider))
    }

    /// Builds the provider authorize URL carrying `state` verbatim.
    pub fn authorization_url(&self, provider: Provider, state: &str) -> Result<String, OAuthError> {
        let p = self.provider(provider)?;

        let auth_url = format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&state={}&prompt=consent",
            p.endpoints.authorize_url,
            urlencoding::encode(&p.credentials.client_id),
            urlencoding::encode(&p.credentials.redirect_uri),
            urlencoding::encode(provider.scopes()),
            urlencoding::encode(state),
        );

        debug!(provider = %provider, "Generated OAuth authorization URL");
        Ok(auth_url)
    }

    /// Exchanges an authorization code for a provider access token.
    pub async fn exchange_code(&self, provider: Provider, code: &str) -> Result<String, OAuthError> {
        let p = self.provider(provider)?;

        let params = [
            ("client_id", p.credentials.client_id.as_str()),
            ("client_secret", p.credentials.client_secret.as_str()),
            ("code", code),
            ("redirect_uri", p.credentials.redirect_uri.as_str()),
            ("grant_type", "authorization_code"),
        ];

        debug!(provider = %provider, "Exchanging authorization code for tokens");

        let response = self
            .client
            .post(&p.endpoints.token_url)
            .form(&params)
            .send()
            .await
            .map_err(|e| OAuthError::RequestFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            error!(provider = %provider, status = %status, error = %error_text, "Token exchange failed");
            return Err(OAuthError::ExchangeFailed(format!(
                "HTTP {}: {}",
                status, error_text
            )));
        }

        let token = response
            .json::<TokenResponse>()
            .await
            .map_err(|e| OAuthError::ExchangeFailed(e.to_string()))?;

        Ok(token.access_token)
    }

    /// Fetches and normalizes the provider profile for an access token.
    pub async fn fetch_profile(
        &self,
        provider: Provider,
        access_token: &str,
    ) -> Result<ProviderProfile, OAuthError> {
        let p = self.provider(provider)?;

        let response = self
            .client
            .get(&p.endpoints.userinfo_url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| OAuthError::RequestFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            error!(provider = %provider, status = %status, "User info request failed");
            return Err(OAuthError::UserInfoFailed(format!("HTTP {}", status)));
        }

        let body = response
            .json::<serde_json::Value>()
            .await
            .map_err(|e| OAuthError::UserInfoFailed(e.to_string()))?;

        provider.parse_profile(body)
    }
}
