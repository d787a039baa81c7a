//! Session cookies

use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use time::Duration;

use crate::services::tokens::{TokenPair, ACCESS_TOKEN_TTL_SECS, REFRESH_TOKEN_TTL_SECS};

pub const ACCESS_COOKIE: &str = "access_token";
pub const REFRESH_COOKIE: &str = "refresh_token";

fn session_cookie(name: &'static str, value: String, max_age_secs: i64, secure: bool) -> Cookie<'static> {
    Cookie::build((name, value))
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Strict)
        .max_age(Duration::seconds(max_age_secs))
        .build()
}

pub fn access_cookie(token: String, secure: bool) -> Cookie<'static> {
    session_cookie(ACCESS_COOKIE, token, ACCESS_TOKEN_TTL_SECS, secure)
}

pub fn refresh_cookie(token: String, secure: bool) -> Cookie<'static> {
    session_cookie(REFRESH_COOKIE, token, REFRESH_TOKEN_TTL_SECS, secure)
}

/// Adds both session cookies to the jar.
pub fn with_session(jar: CookieJar, tokens: TokenPair, secure: bool) -> CookieJar {
    jar.add(access_cookie(tokens.access_token, secure))
        .add(refresh_cookie(tokens.refresh_token, secure))
}

/// Overwrites both session cookies with empty, already-expired values.
pub fn cleared(jar: CookieJar, secure: bool) -> CookieJar {
    jar.add(session_cookie(ACCESS_COOKIE, String::new(), 0, secure))
        .add(session_cookie(REFRESH_COOKIE, String::new(), 0, secure))
}
