// src/services/tokens.rs
//! Stateless signed tokens: access, refresh, OAuth handoff and link state.
//!
//! All of them are HS256 JWTs. Access and refresh tokens are signed with two
//! distinct secrets; every token class also carries its own audience, so a
//! token minted for one purpose never verifies as another. Nothing is stored
//! server side and there is no revocation: a token stays valid until `exp`.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error};

use crate::common::ApiError;

pub const ACCESS_TOKEN_TTL_SECS: i64 = 6 * 60 * 60;
pub const REFRESH_TOKEN_TTL_SECS: i64 = 7 * 24 * 60 * 60;
pub const HANDOFF_TOKEN_TTL_SECS: i64 = 15 * 60;
pub const LINK_STATE_TTL_SECS: i64 = 10 * 60;

const ACCESS_AUDIENCE: &str = "access";
const REFRESH_AUDIENCE: &str = "refresh";
const HANDOFF_AUDIENCE: &str = "oauth-handoff";
const LINK_AUDIENCE: &str = "oauth-link";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    /// Bad signature, malformed payload, wrong token class or expired.
    #[error("invalid or expired token")]
    Invalid,

    #[error("failed to sign token: {0}")]
    Signing(String),
}

impl From<TokenError> for ApiError {
    fn from(e: TokenError) -> Self {
        match e {
            TokenError::Invalid => ApiError::Unauthorized("invalid or expired token".to_string()),
            TokenError::Signing(msg) => ApiError::InternalServer(format!("token signing failed: {}", msg)),
        }
    }
}

/// Identity carried by access and refresh tokens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user_id: String,
    pub username: String,
}

/// Provider identity carried from the OAuth callback to the password-setup step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandoffIdentity {
    pub provider: String,
    pub external_id: String,
    pub email: String,
    pub name: Option<String>,
    pub avatar: Option<String>,
}

/// Account-link target bound into the OAuth `state` by a signed-in user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkTarget {
    pub provider: String,
    pub user_id: String,
    pub email: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct SessionClaims {
    user_id: String,
    username: String,
    aud: String,
    iat: usize,
    exp: usize,
}

#[derive(Debug, Serialize, Deserialize)]
struct HandoffClaims {
    #[serde(flatten)]
    identity: HandoffIdentity,
    aud: String,
    iat: usize,
    exp: usize,
}

#[derive(Debug, Serialize, Deserialize)]
struct LinkClaims {
    #[serde(flatten)]
    target: LinkTarget,
    aud: String,
    iat: usize,
    exp: usize,
}

#[derive(Clone)]
struct SigningKey {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl SigningKey {
    fn from_secret(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        }
    }
}

/// Access + refresh token pair handed out on login.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Clone)]
pub struct TokenService {
    access: SigningKey,
    refresh: SigningKey,
}

impl TokenService {
    pub fn new(access_secret: &str, refresh_secret: &str) -> Self {
        Self {
            access: SigningKey::from_secret(access_secret),
            refresh: SigningKey::from_secret(refresh_secret),
        }
    }

    pub fn issue_access(&self, user_id: &str, username: &str) -> Result<String, TokenError> {
        self.issue_session_at(&self.access, ACCESS_AUDIENCE, ACCESS_TOKEN_TTL_SECS, user_id, username, Utc::now())
    }

    pub fn issue_refresh(&self, user_id: &str, username: &str) -> Result<String, TokenError> {
        self.issue_session_at(&self.refresh, REFRESH_AUDIENCE, REFRESH_TOKEN_TTL_SECS, user_id, username, Utc::now())
    }

    pub fn issue_pair(&self, user_id: &str, username: &str) -> Result<TokenPair, TokenError> {
        Ok(TokenPair {
            access_token: self.issue_access(user_id, username)?,
            refresh_token: self.issue_refresh(user_id, username)?,
        })
    }

    pub fn verify_access(&self, token: &str) -> Result<Session, TokenError> {
        verify_session(&self.access, ACCESS_AUDIENCE, token)
    }

    pub fn verify_refresh(&self, token: &str) -> Result<Session, TokenError> {
        verify_session(&self.refresh, REFRESH_AUDIENCE, token)
    }

    /// Handoff tokens are signed with the access secret under their own audience.
    pub fn issue_handoff(&self, identity: &HandoffIdentity) -> Result<String, TokenError> {
        self.issue_handoff_at(identity, Utc::now())
    }

    pub fn verify_handoff(&self, token: &str) -> Result<HandoffIdentity, TokenError> {
        let claims: HandoffClaims = verify(&self.access, HANDOFF_AUDIENCE, token)?;
        Ok(claims.identity)
    }

    pub fn issue_link_state(&self, target: &LinkTarget) -> Result<String, TokenError> {
        self.issue_link_state_at(target, Utc::now())
    }

    pub fn verify_link_state(&self, token: &str) -> Result<LinkTarget, TokenError> {
        let claims: LinkClaims = verify(&self.access, LINK_AUDIENCE, token)?;
        Ok(claims.target)
    }

    fn issue_session_at(
        &self,
        key: &SigningKey,
        audience: &str,
        ttl_secs: i64,
        user_id: &str,
        username: &str,
        issued_at: DateTime<Utc>,
    ) -> Result<String, TokenError> {
        let (iat, exp) = window(issued_at, ttl_secs);
        let claims = SessionClaims {
            user_id: user_id.to_string(),
            username: username.to_string(),
            aud: audience.to_string(),
            iat,
            exp,
        };
        sign(key, &claims)
    }

    fn issue_handoff_at(
        &self,
        identity: &HandoffIdentity,
        issued_at: DateTime<Utc>,
    ) -> Result<String, TokenError> {
        let (iat, exp) = window(issued_at, HANDOFF_TOKEN_TTL_SECS);
        let claims = HandoffClaims {
            identity: identity.clone(),
            aud: HANDOFF_AUDIENCE.to_string(),
            iat,
            exp,
        };
        sign(&self.access, &claims)
    }

    fn issue_link_state_at(
        &self,
        target: &LinkTarget,
        issued_at: DateTime<Utc>,
    ) -> Result<String, TokenError> {
        let (iat, exp) = window(issued_at, LINK_STATE_TTL_SECS);
        let claims = LinkClaims {
            target: target.clone(),
            aud: LINK_AUDIENCE.to_string(),
            iat,
            exp,
        };
        sign(&self.access, &claims)
    }
}

fn window(issued_at: DateTime<Utc>, ttl_secs: i64) -> (usize, usize) {
    let iat = issued_at.timestamp().max(0) as usize;
    let exp = (issued_at + Duration::seconds(ttl_secs)).timestamp().max(0) as usize;
    (iat, exp)
}

fn sign<T: Serialize>(key: &SigningKey, claims: &T) -> Result<String, TokenError> {
    encode(&Header::new(Algorithm::HS256), claims, &key.encoding).map_err(|e| {
        error!(error = %e, "JWT encoding error");
        TokenError::Signing(e.to_string())
    })
}

fn verify<T: DeserializeOwned>(key: &SigningKey, audience: &str, token: &str) -> Result<T, TokenError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 0;
    validation.set_audience(&[audience]);

    decode::<T>(token, &key.decoding, &validation)
        .map(|data| data.claims)
        .map_err(|e| {
            debug!(error = %e, audience = audience, "Token verification failed");
            TokenError::Invalid
        })
}

fn verify_session(key: &SigningKey, audience: &str, token: &str) -> Result<Session, TokenError> {
    let claims: SessionClaims = verify(key, audience, token)?;
    Ok(Session {
        user_id: claims.user_id,
        username: claims.username,
    })
}
