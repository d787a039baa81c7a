//! Router-level tests for the auth module
//!
//! Requests go through the full application router (`tower::ServiceExt::oneshot`)
//! against an in-memory database. A local axum server plays the Discord API.

use axum::{
    body::Body,
    http::{header, HeaderMap, Request, StatusCode},
    response::Response,
    routing::{get, post},
    Form, Json, Router,
};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;

use crate::common::test_support::{
    body_json, cookie_header, get_request, json_request, memory_pool, send, set_cookies,
    spawn_mock, test_config_with, test_http, TEST_FRONTEND,
};
use crate::auth::oauth::CallbackState;
use crate::common::AppState;
use crate::services::oauth::ProviderEndpoints;
use crate::services::LinkTarget;
use crate::services::{OAuthService, Provider};

// ============================================================================
// Fixtures
// ============================================================================

struct TestApp {
    router: Router,
    state: AppState,
}

impl TestApp {
    async fn send(&self, request: Request<Body>) -> Response {
        send(&self.router, request).await
    }
}

async fn mock_discord() -> String {
    let app = Router::new()
        .route(
            "/token",
            post(|Form(params): Form<HashMap<String, String>>| async move {
                let grant_ok = params.get("grant_type").map(String::as_str)
                    == Some("authorization_code");
                match params.get("code").map(String::as_str) {
                    Some(code) if grant_ok && code != "rejected" => (
                        StatusCode::OK,
                        Json(json!({ "access_token": format!("at-{}", code), "token_type": "Bearer" })),
                    ),
                    _ => (
                        StatusCode::BAD_REQUEST,
                        Json(json!({ "error": "invalid_grant" })),
                    ),
                }
            }),
        )
        .route(
            "/users/@me",
            get(|headers: HeaderMap| async move {
                let token = headers
                    .get(header::AUTHORIZATION)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or_default()
                    .trim_start_matches("Bearer ")
                    .to_string();
                match token.as_str() {
                    "at-good" => (
                        StatusCode::OK,
                        Json(json!({ "id": "ext123", "email": "c@d.com", "verified": true, "username": "bob", "avatar": "hash1" })),
                    ),
                    "at-noemail" => (
                        StatusCode::OK,
                        Json(json!({ "id": "ext9", "username": "ghost" })),
                    ),
                    "at-other" => (
                        StatusCode::OK,
                        Json(json!({ "id": "ext456", "email": "e@f.com", "verified": true, "username": "no spaces allowed" })),
                    ),
                    "at-unverified" => (
                        StatusCode::OK,
                        Json(json!({ "id": "ext777", "email": "u@v.com", "verified": false, "username": "mallory" })),
                    ),
                    _ => (
                        StatusCode::UNAUTHORIZED,
                        Json(json!({ "message": "401: Unauthorized" })),
                    ),
                }
            }),
        );
    spawn_mock(app).await
}

async fn test_app_with(extra: &[(&str, &str)]) -> TestApp {
    let base = mock_discord().await;

    let mut vars = vec![
        ("DISCORD_CLIENT_ID", "discord-client"),
        ("DISCORD_CLIENT_SECRET", "discord-secret"),
        (
            "DISCORD_REDIRECT_URI",
            "http://api.test/auth/oauth/discord/callback",
        ),
    ];
    vars.extend_from_slice(extra);
    let config = test_config_with(&vars);

    let mut state = AppState::new(config.clone(), memory_pool().await, test_http());
    let endpoints = ProviderEndpoints {
        authorize_url: format!("{}/authorize", base),
        token_url: format!("{}/token", base),
        userinfo_url: format!("{}/users/@me", base),
    };
    let credentials = config.discord.clone().expect("discord configured");
    state.oauth = Arc::new(
        OAuthService::new(state.http.clone(), &config).with_provider(
            Provider::Discord,
            credentials,
            endpoints,
        ),
    );

    let router = crate::build_app(state.clone().into_shared(), &config);
    TestApp { router, state }
}

async fn test_app() -> TestApp {
    test_app_with(&[]).await
}

fn location(response: &Response) -> String {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

async fn register(app: &TestApp, email: &str, username: &str, password: &str) -> Response {
    app.send(json_request(
        "POST",
        "/auth/register",
        json!({ "email": email, "username": username, "password": password }),
        None,
    ))
    .await
}

fn error_reason(location: &str) -> &str {
    location
        .strip_prefix(&format!("{}/auth/error?reason=", TEST_FRONTEND))
        .unwrap_or("")
}

fn callback_uri(code: &str, state: Option<&str>) -> String {
    match state {
        Some(s) => format!(
            "/auth/oauth/discord/callback?code={}&state={}",
            code,
            urlencoding::encode(s)
        ),
        None => format!("/auth/oauth/discord/callback?code={}&state=discord", code),
    }
}

/// Pulls the raw `state` value out of a provider authorize redirect.
fn state_param(location: &str) -> String {
    let raw = location
        .split_once("state=")
        .map(|(_, rest)| rest.split('&').next().unwrap_or(rest))
        .expect("authorize redirect carries a state");
    urlencoding::decode(raw).unwrap().into_owned()
}

/// Registers an account and returns its id and session cookie.
async fn register_with_session(app: &TestApp, email: &str, username: &str) -> (String, String) {
    let response = register(app, email, username, "pass1234").await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let cookie = cookie_header(&response);
    let body = body_json(response).await;
    (body["user"]["id"].as_str().unwrap().to_string(), cookie)
}

/// Starts a Discord link for the signed-in user and returns the issued state.
async fn start_link(app: &TestApp, cookie: &str) -> String {
    let response = app
        .send(get_request("/auth/oauth/discord?link_account=1", Some(cookie)))
        .await;
    let target = location(&response);
    assert!(target.contains("/authorize?"), "unexpected redirect: {}", target);
    state_param(&target)
}

fn handoff_token(location: &str) -> String {
    let prefix = format!("{}/auth/complete-signup?token=", TEST_FRONTEND);
    let raw = location
        .strip_prefix(&prefix)
        .expect("redirected to complete-signup");
    urlencoding::decode(raw).unwrap().into_owned()
}

// ============================================================================
// Registration, login and sessions
// ============================================================================

#[tokio::test]
async fn test_register_then_access_protected_route() {
    let app = test_app().await;

    let response = register(&app, "a@b.com", "alice_01", "pass1234").await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let cookies = set_cookies(&response);
    assert!(cookies.iter().any(|c| c.starts_with("access_token=")
        && c.contains("HttpOnly")
        && c.contains("SameSite=Strict")
        && c.contains("Max-Age=21600")));
    assert!(cookies
        .iter()
        .any(|c| c.starts_with("refresh_token=") && c.contains("Max-Age=604800")));

    let cookie = cookie_header(&response);
    let body = body_json(response).await;
    assert_eq!(body["user"]["username"], "alice_01");
    assert!(body["user"].get("password_hash").is_none());

    let me = app.send(get_request("/api/me", Some(&cookie))).await;
    assert_eq!(me.status(), StatusCode::OK);
    let me = body_json(me).await;
    assert_eq!(me["user"]["email"], "a@b.com");
    assert_eq!(me["website"]["theme"], "light");
}

#[tokio::test]
async fn test_protected_route_rejects_missing_invalid_and_expired_tokens() {
    let app = test_app().await;

    let missing = app.send(get_request("/api/me", None)).await;
    assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);

    let garbage = app
        .send(get_request("/api/me", Some("access_token=not-a-token")))
        .await;
    assert_eq!(garbage.status(), StatusCode::UNAUTHORIZED);

    let now = chrono::Utc::now().timestamp();
    let expired = encode(
        &Header::new(Algorithm::HS256),
        &json!({
            "user_id": "U_GONE",
            "username": "alice_01",
            "aud": "access",
            "iat": now - 7 * 3600,
            "exp": now - 3600,
        }),
        &EncodingKey::from_secret(b"test-access"),
    )
    .unwrap();
    let expired = app
        .send(get_request(
            "/api/me",
            Some(&format!("access_token={}", expired)),
        ))
        .await;
    assert_eq!(expired.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(expired).await["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn test_register_duplicate_email_conflicts() {
    let app = test_app().await;

    assert_eq!(
        register(&app, "a@b.com", "alice_01", "pass1234").await.status(),
        StatusCode::CREATED
    );

    let dup = register(&app, "A@B.com", "someone_else", "pass1234").await;
    assert_eq!(dup.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(dup).await["code"], "CONFLICT");

    let dup_name = register(&app, "other@b.com", "alice_01", "pass1234").await;
    assert_eq!(dup_name.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_register_validation_errors() {
    let app = test_app().await;

    let response = register(&app, "not-an-email", "ab", "short").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = body_json(response).await;
    assert_eq!(body["code"], "VALIDATION_ERROR");
    let message = body["error"].as_str().unwrap();
    assert!(message.contains("email"));
    assert!(message.contains("username"));
    assert!(message.contains("password"));
}

#[tokio::test]
async fn test_login_returns_same_user_and_generic_failures() {
    let app = test_app().await;

    let registered = body_json(register(&app, "a@b.com", "alice_01", "pass1234").await).await;

    let login = app
        .send(json_request(
            "POST",
            "/auth/login",
            json!({ "email": "a@b.com", "password": "pass1234" }),
            None,
        ))
        .await;
    assert_eq!(login.status(), StatusCode::OK);
    assert_eq!(set_cookies(&login).len(), 2);
    let logged_in = body_json(login).await;
    assert_eq!(logged_in["user"]["id"], registered["user"]["id"]);

    let wrong_password = app
        .send(json_request(
            "POST",
            "/auth/login",
            json!({ "email": "a@b.com", "password": "wrong1234" }),
            None,
        ))
        .await;
    let unknown_email = app
        .send(json_request(
            "POST",
            "/auth/login",
            json!({ "email": "nobody@b.com", "password": "pass1234" }),
            None,
        ))
        .await;

    assert_eq!(wrong_password.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(unknown_email.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        body_json(wrong_password).await,
        body_json(unknown_email).await
    );
}

#[tokio::test]
async fn test_refresh_issues_new_access_cookie_only() {
    let app = test_app().await;
    let registered = register(&app, "a@b.com", "alice_01", "pass1234").await;
    let refresh = set_cookies(&registered)
        .into_iter()
        .find(|c| c.starts_with("refresh_token="))
        .and_then(|c| c.split(';').next().map(str::to_string))
        .unwrap();

    let response = app
        .send(json_request("POST", "/auth/refresh", json!({}), Some(&refresh)))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let cookies = set_cookies(&response);
    assert_eq!(cookies.len(), 1);
    assert!(cookies[0].starts_with("access_token="));

    let me = app
        .send(get_request("/api/me", Some(&cookie_header(&response))))
        .await;
    assert_eq!(me.status(), StatusCode::OK);

    let missing = app
        .send(json_request("POST", "/auth/refresh", json!({}), None))
        .await;
    assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);

    // An access token is not accepted as a refresh token.
    let access = cookies[0].split(';').next().unwrap().replace("access_token=", "refresh_token=");
    let wrong_class = app
        .send(json_request("POST", "/auth/refresh", json!({}), Some(&access)))
        .await;
    assert_eq!(wrong_class.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_logout_clears_both_cookies() {
    let app = test_app().await;

    let response = app
        .send(json_request("POST", "/auth/logout", json!({}), None))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let cookies = set_cookies(&response);
    assert_eq!(cookies.len(), 2);
    for name in ["access_token=", "refresh_token="] {
        let cookie = cookies.iter().find(|c| c.starts_with(name)).unwrap();
        assert!(cookie.starts_with(&format!("{};", name)));
        assert!(cookie.contains("Max-Age=0"));
    }
}

// ============================================================================
// OAuth
// ============================================================================

#[tokio::test]
async fn test_oauth_start_redirects_to_provider() {
    let app = test_app().await;

    let response = app.send(get_request("/auth/oauth/discord", None)).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let target = location(&response);
    assert!(target.contains("/authorize?client_id=discord-client"));
    assert!(target.contains("response_type=code"));
    assert!(target.contains("prompt=consent"));
    assert!(target.contains("state=discord&"));
}

#[tokio::test]
async fn test_oauth_link_start_binds_session_user() {
    let app = test_app().await;
    let (user_id, cookie) = register_with_session(&app, "a@b.com", "alice_01").await;

    // The query value is ignored: the target is always the session user.
    let response = app
        .send(get_request("/auth/oauth/discord?link_account=victim%40x.com", Some(&cookie)))
        .await;
    let state = CallbackState::decode(&state_param(&location(&response)));
    assert_eq!(state.provider, "discord");

    let target = app
        .state
        .tokens
        .verify_link_state(state.link_account.as_deref().unwrap())
        .unwrap();
    assert_eq!(target.user_id, user_id);
    assert_eq!(target.email, "a@b.com");
    assert_eq!(target.provider, "discord");
}

#[tokio::test]
async fn test_oauth_link_start_requires_session() {
    let app = test_app().await;

    let anonymous = app
        .send(get_request("/auth/oauth/discord?link_account=a%40b.com", None))
        .await;
    assert_eq!(anonymous.status(), StatusCode::SEE_OTHER);
    assert_eq!(error_reason(&location(&anonymous)), "oauth-failed");

    let forged_cookie = app
        .send(get_request(
            "/auth/oauth/discord?link_account=a%40b.com",
            Some("access_token=not-a-jwt"),
        ))
        .await;
    assert_eq!(error_reason(&location(&forged_cookie)), "oauth-failed");
}

#[tokio::test]
async fn test_oauth_start_rejects_unknown_and_unconfigured_providers() {
    let app = test_app().await;

    for uri in ["/auth/oauth/myspace", "/auth/oauth/google"] {
        let response = app.send(get_request(uri, None)).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(error_reason(&location(&response)), "invalid-provider");
    }
}

#[tokio::test]
async fn test_oauth_callback_failures_redirect_with_reason() {
    let app = test_app().await;

    let missing = app
        .send(get_request("/auth/oauth/discord/callback?state=discord", None))
        .await;
    assert_eq!(error_reason(&location(&missing)), "missing-code");

    let rejected = app
        .send(get_request(&callback_uri("rejected", None), None))
        .await;
    assert_eq!(error_reason(&location(&rejected)), "oauth-failed");

    let denied = app
        .send(get_request(
            "/auth/oauth/discord/callback?error=access_denied&state=discord",
            None,
        ))
        .await;
    assert_eq!(error_reason(&location(&denied)), "oauth-failed");

    let no_email = app
        .send(get_request(&callback_uri("noemail", None), None))
        .await;
    assert_eq!(error_reason(&location(&no_email)), "email-not-available");

    let unverified = app
        .send(get_request(&callback_uri("unverified", None), None))
        .await;
    assert_eq!(error_reason(&location(&unverified)), "email-not-available");
}

#[tokio::test]
async fn test_oauth_handoff_and_finish_creates_account() {
    let app = test_app().await;

    let callback = app.send(get_request(&callback_uri("good", None), None)).await;
    assert_eq!(callback.status(), StatusCode::SEE_OTHER);
    assert!(set_cookies(&callback).is_empty());
    let token = handoff_token(&location(&callback));

    let finish = app
        .send(json_request(
            "POST",
            "/auth/oauth/finish",
            json!({ "token": token, "password": "letters123" }),
            None,
        ))
        .await;
    assert_eq!(finish.status(), StatusCode::CREATED);
    assert_eq!(set_cookies(&finish).len(), 2);

    let body = body_json(finish).await;
    assert_eq!(body["user"]["email"], "c@d.com");
    assert_eq!(body["user"]["username"], "bob");
    assert_eq!(body["user"]["provider"], "discord");
    assert_eq!(body["website"]["display_name"], "bob");
    assert_eq!(
        body["website"]["avatar_url"],
        "https://cdn.discordapp.com/avatars/ext123/hash1.png"
    );
    assert_eq!(body["warnings"], json!([]));

    let link = app
        .state
        .accounts
        .find_oauth_link("discord", "ext123")
        .await
        .unwrap()
        .expect("oauth link created");
    assert_eq!(link.user_id, body["user"]["id"].as_str().unwrap());
    assert!(app
        .state
        .accounts
        .find_website_by_user(&link.user_id)
        .await
        .unwrap()
        .is_some());

    // The same identity now logs straight in.
    let again = app.send(get_request(&callback_uri("good", None), None)).await;
    assert_eq!(location(&again), format!("{}/dashboard", TEST_FRONTEND));
    let cookie = cookie_header(&again);
    let me = body_json(app.send(get_request("/api/me", Some(&cookie))).await).await;
    assert_eq!(me["user"]["id"], body["user"]["id"]);
}

#[tokio::test]
async fn test_oauth_finish_rejections() {
    let app = test_app().await;

    let bad_token = app
        .send(json_request(
            "POST",
            "/auth/oauth/finish",
            json!({ "token": "garbage", "password": "letters123" }),
            None,
        ))
        .await;
    assert_eq!(bad_token.status(), StatusCode::UNAUTHORIZED);

    // A session token is not a handoff token.
    let access = app.state.tokens.issue_access("U_1", "alice_01").unwrap();
    let wrong_class = app
        .send(json_request(
            "POST",
            "/auth/oauth/finish",
            json!({ "token": access, "password": "letters123" }),
            None,
        ))
        .await;
    assert_eq!(wrong_class.status(), StatusCode::UNAUTHORIZED);

    let callback = app.send(get_request(&callback_uri("good", None), None)).await;
    let token = handoff_token(&location(&callback));

    let weak = app
        .send(json_request(
            "POST",
            "/auth/oauth/finish",
            json!({ "token": token, "password": "lettersonly" }),
            None,
        ))
        .await;
    assert_eq!(weak.status(), StatusCode::BAD_REQUEST);

    let first = app
        .send(json_request(
            "POST",
            "/auth/oauth/finish",
            json!({ "token": token, "password": "letters123" }),
            None,
        ))
        .await;
    assert_eq!(first.status(), StatusCode::CREATED);

    let replay = app
        .send(json_request(
            "POST",
            "/auth/oauth/finish",
            json!({ "token": token, "password": "letters123" }),
            None,
        ))
        .await;
    assert_eq!(replay.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_oauth_finish_uses_placeholder_for_invalid_username() {
    let app = test_app().await;

    let callback = app.send(get_request(&callback_uri("other", None), None)).await;
    let token = handoff_token(&location(&callback));

    let finish = app
        .send(json_request(
            "POST",
            "/auth/oauth/finish",
            json!({ "token": token, "password": "letters123" }),
            None,
        ))
        .await;
    assert_eq!(finish.status(), StatusCode::CREATED);

    let username = body_json(finish).await["user"]["username"]
        .as_str()
        .unwrap()
        .to_string();
    assert!(username.starts_with("user_"));
    assert_eq!(username.len(), 13);
}

#[tokio::test]
async fn test_oauth_finish_reports_failed_avatar_upload() {
    let host = spawn_mock(Router::new().route(
        "/upload",
        post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
    ))
    .await;
    let upload_url = format!("{}/upload", host);
    let app = test_app_with(&[
        ("IMAGE_HOST_API_KEY", "key"),
        ("IMAGE_HOST_UPLOAD_URL", upload_url.as_str()),
    ])
    .await;

    let callback = app.send(get_request(&callback_uri("good", None), None)).await;
    let token = handoff_token(&location(&callback));

    let finish = app
        .send(json_request(
            "POST",
            "/auth/oauth/finish",
            json!({ "token": token, "password": "letters123" }),
            None,
        ))
        .await;
    assert_eq!(finish.status(), StatusCode::CREATED);

    let body = body_json(finish).await;
    assert_eq!(body["warnings"], json!(["avatar-upload-failed"]));
    assert!(body["website"]["avatar_url"].is_null());
    assert!(app
        .state
        .accounts
        .find_user_by_email("c@d.com")
        .await
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn test_oauth_callback_email_taken() {
    let app = test_app().await;
    register(&app, "c@d.com", "carol_01", "pass1234").await;

    let callback = app.send(get_request(&callback_uri("good", None), None)).await;
    assert_eq!(error_reason(&location(&callback)), "email-taken");
}

#[tokio::test]
async fn test_link_account_literal_mode_repoints_existing_link() {
    let app = test_app().await;

    // First identity: ext123 becomes its own account.
    let callback = app.send(get_request(&callback_uri("good", None), None)).await;
    let token = handoff_token(&location(&callback));
    app.send(json_request(
        "POST",
        "/auth/oauth/finish",
        json!({ "token": token, "password": "letters123" }),
        None,
    ))
    .await;

    let (target_id, cookie) = register_with_session(&app, "b@x.com", "bea_01").await;
    let link_state = start_link(&app, &cookie).await;

    let linked = app
        .send(get_request(&callback_uri("good", Some(&link_state)), None))
        .await;
    assert_eq!(
        location(&linked),
        format!("{}/dashboard/settings?linked=discord", TEST_FRONTEND)
    );

    let link = app
        .state
        .accounts
        .find_oauth_link("discord", "ext123")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(link.user_id, target_id);
    let user = app
        .state
        .accounts
        .find_user_by_id(&target_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(user.provider.as_deref(), Some("discord"));

    // No existing link for ext456: literal mode falls through to the handoff.
    let unlinked = app
        .send(get_request(&callback_uri("other", Some(&link_state)), None))
        .await;
    assert!(location(&unlinked).starts_with(&format!("{}/auth/complete-signup", TEST_FRONTEND)));
}

#[tokio::test]
async fn test_link_account_direct_mode_links_new_identity() {
    let app = test_app_with(&[("OAUTH_LINK_MODE", "direct")]).await;

    let (target_id, cookie) = register_with_session(&app, "b@x.com", "bea_01").await;
    let link_state = start_link(&app, &cookie).await;

    let linked = app
        .send(get_request(&callback_uri("good", Some(&link_state)), None))
        .await;
    assert_eq!(
        location(&linked),
        format!("{}/dashboard/settings?linked=discord", TEST_FRONTEND)
    );

    let link = app
        .state
        .accounts
        .find_oauth_link("discord", "ext123")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(link.user_id, target_id);

    // A correctly signed state whose account has since disappeared.
    let ghost = app
        .state
        .tokens
        .issue_link_state(&LinkTarget {
            provider: "discord".to_string(),
            user_id: "U_GHOST".to_string(),
            email: "ghost@x.com".to_string(),
        })
        .unwrap();
    let ghost_state = CallbackState {
        provider: "discord".to_string(),
        link_account: Some(ghost),
    };
    let missing_target = app
        .send(get_request(&callback_uri("other", Some(&ghost_state.encode())), None))
        .await;
    assert_eq!(error_reason(&location(&missing_target)), "oauth-failed");
}

#[tokio::test]
async fn test_forged_link_state_cannot_take_over_account() {
    for mode in ["direct", "literal"] {
        let app = test_app_with(&[("OAUTH_LINK_MODE", mode)]).await;
        let (victim_id, victim_cookie) =
            register_with_session(&app, "victim@x.com", "victim_01").await;

        // Hand-written state naming the victim, sent without any session.
        let forged = r#"{"provider":"discord","link_account":"victim@x.com"}"#;
        let rejected = app
            .send(get_request(&callback_uri("good", Some(forged)), None))
            .await;
        assert_eq!(error_reason(&location(&rejected)), "oauth-failed", "mode {}", mode);
        assert!(set_cookies(&rejected).is_empty());
        assert!(app
            .state
            .accounts
            .find_oauth_link("discord", "ext123")
            .await
            .unwrap()
            .is_none());

        // Other signed token classes are not link states either.
        let access = victim_cookie
            .split(';')
            .find_map(|c| c.trim().strip_prefix("access_token="))
            .unwrap()
            .to_string();
        let replayed = CallbackState {
            provider: "discord".to_string(),
            link_account: Some(access),
        };
        let replay = app
            .send(get_request(&callback_uri("good", Some(&replayed.encode())), None))
            .await;
        assert_eq!(error_reason(&location(&replay)), "oauth-failed", "mode {}", mode);

        // A plain OAuth login with the same identity gets no session either.
        let login = app.send(get_request(&callback_uri("good", None), None)).await;
        assert!(!location(&login).starts_with(&format!("{}/dashboard", TEST_FRONTEND)));
        assert!(set_cookies(&login).is_empty());

        let me = app.send(get_request("/api/me", Some(&victim_cookie))).await;
        assert_eq!(body_json(me).await["user"]["id"], victim_id);
    }
}

#[tokio::test]
async fn test_link_state_for_other_provider_rejected() {
    let app = test_app_with(&[("OAUTH_LINK_MODE", "direct")]).await;
    let (user_id, _cookie) = register_with_session(&app, "b@x.com", "bea_01").await;

    let google_state = app
        .state
        .tokens
        .issue_link_state(&LinkTarget {
            provider: "google".to_string(),
            user_id,
            email: "b@x.com".to_string(),
        })
        .unwrap();
    let state = CallbackState {
        provider: "discord".to_string(),
        link_account: Some(google_state),
    };

    let response = app
        .send(get_request(&callback_uri("good", Some(&state.encode())), None))
        .await;
    assert_eq!(error_reason(&location(&response)), "oauth-failed");
}

#[tokio::test]
async fn test_oauth_error_messages() {
    let app = test_app().await;

    let known = app.send(get_request("/auth/errors/email-taken", None)).await;
    assert_eq!(known.status(), StatusCode::OK);
    let body = body_json(known).await;
    assert_eq!(body["reason"], "email-taken");
    assert!(body["message"].as_str().unwrap().contains("already exists"));

    let unknown = app.send(get_request("/auth/errors/bogus", None)).await;
    assert_eq!(unknown.status(), StatusCode::NOT_FOUND);
}
