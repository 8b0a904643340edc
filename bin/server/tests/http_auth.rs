mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use common::{API_KEY, HOST, read_json, set_cookie, test_app};
use realmgate_authz::SystemRole;
use realmgate_core::UserId;
use realmgate_platform_access::{BearerCredentials, CookieCodec, SecurityContext, UserSession};
use std::sync::atomic::Ordering;
use tower::ServiceExt;

fn request(method: &str, uri: &str) -> axum::http::request::Builder {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::HOST, HOST)
}

async fn login(app: &common::TestApp) -> String {
    let response = app
        .router
        .clone()
        .oneshot(
            request("GET", "/auth/link?appCode=acme&providerCode=google")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json(response).await;
    let link = payload["link"].as_str().expect("link").to_string();
    let state = link
        .split("state=")
        .nth(1)
        .and_then(|rest| rest.split('&').next())
        .expect("state")
        .to_string();

    let response = app
        .router
        .clone()
        .oneshot(
            request("POST", &format!("/auth/login?code=c1&state={state}"))
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let cookie = set_cookie(response.headers()).expect("session cookie");
    let payload = read_json(response).await;
    assert_eq!(payload["role"], "user");
    assert_eq!(payload["realm_id"], app.realm_id.to_string());
    cookie
}

#[tokio::test]
async fn provider_link_carries_state() {
    let app = test_app(false);
    let response = app
        .router
        .oneshot(
            request("GET", "/auth/link?appCode=acme&providerCode=google&action=consent")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json(response).await;
    let link = payload["link"].as_str().expect("link");
    assert!(link.contains("state=id0"));
    assert!(link.contains("action=consent"));
}

#[tokio::test]
async fn provider_link_for_disabled_realm_is_not_found() {
    let app = test_app(false);
    let response = app
        .router
        .oneshot(
            request("GET", "/auth/link?appCode=dormant&providerCode=google")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let payload = read_json(response).await;
    assert!(payload["error"].as_str().expect("error").contains("not found"));
}

#[tokio::test]
async fn provider_link_requires_codes() {
    let app = test_app(false);
    let response = app
        .router
        .oneshot(request("GET", "/auth/link?appCode=acme").body(Body::empty()).expect("request"))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn login_with_unissued_state_is_forbidden() {
    let app = test_app(false);
    let response = app
        .router
        .clone()
        .oneshot(
            request("POST", "/auth/login?code=c1&state=s1")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert!(set_cookie(response.headers()).is_none());
    let payload = read_json(response).await;
    assert_eq!(payload["error"], "access denied: invalid state parameter");
    assert_eq!(app.gateway.exchanges.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn failed_exchange_is_a_gateway_error() {
    let app = test_app(false);
    let response = app
        .router
        .clone()
        .oneshot(
            request("GET", "/auth/link?appCode=acme&providerCode=google")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .router
        .clone()
        .oneshot(
            request("POST", "/auth/login?code=bad-code&state=id0")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let payload = read_json(response).await;
    assert_eq!(payload["error"], "identity provider error");

    // The pending session is gone, so the state cannot be replayed.
    let response = app
        .router
        .oneshot(
            request("POST", "/auth/login?code=c1&state=id0")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

/// Re-encodes a session cookie after applying `tamper` to its payload.
fn reissue(cookie: &str, tamper: impl FnOnce(&mut UserSession)) -> String {
    let (name, value) = cookie.split_once('=').expect("cookie pair");
    let codec = CookieCodec::new(&common::config(false).cookie_secret).expect("codec");
    let ctx = SecurityContext::from_host(HOST, false);
    let mut session = codec.decode(&ctx, value).expect("decode");
    tamper(&mut session);
    format!("{name}={}", codec.encode(&ctx, &session).expect("encode"))
}

#[tokio::test]
async fn cookie_for_another_user_is_unauthorized() {
    let app = test_app(false);
    let cookie = reissue(&login(&app).await, |session| {
        session.user_id = Some(UserId::new());
    });

    let response = app
        .router
        .oneshot(
            request("GET", "/auth/me")
                .header(header::COOKIE, &cookie)
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(set_cookie(response.headers()).as_deref(), Some("is_session="));
}

#[tokio::test]
async fn cookie_role_is_replaced_by_the_stored_role() {
    let app = test_app(false);
    let cookie = reissue(&login(&app).await, |session| {
        session.role = SystemRole::Admin;
    });

    let response = app
        .router
        .clone()
        .oneshot(
            request("GET", "/realms")
                .header(header::COOKIE, &cookie)
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .router
        .oneshot(
            request("GET", "/auth/me")
                .header(header::COOKIE, &cookie)
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(read_json(response).await["role"], "user");
}

#[tokio::test]
async fn session_cookie_authenticates_the_actor() {
    let app = test_app(false);
    let cookie = login(&app).await;

    let response = app
        .router
        .oneshot(
            request("GET", "/auth/me")
                .header(header::COOKIE, &cookie)
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json(response).await;
    assert_eq!(payload["role"], "user");
    assert_eq!(payload["realm_id"], app.realm_id.to_string());
    assert_eq!(payload["user_id"], app.seed.users[0].id.to_string());
}

#[tokio::test]
async fn cookie_is_rejected_on_another_domain() {
    let app = test_app(false);
    let cookie = login(&app).await;

    let response = app
        .router
        .oneshot(
            Request::builder()
                .uri("/auth/me")
                .header(header::HOST, "evil.example.com")
                .header(header::COOKIE, &cookie)
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(set_cookie(response.headers()).as_deref(), Some("is_session="));
}

#[tokio::test]
async fn missing_cookie_is_unauthorized() {
    let app = test_app(false);
    let response = app
        .router
        .oneshot(request("GET", "/auth/me").body(Body::empty()).expect("request"))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn user_role_cannot_list_realms() {
    let app = test_app(false);
    let cookie = login(&app).await;

    let response = app
        .router
        .oneshot(
            request("GET", "/realms")
                .header(header::COOKIE, &cookie)
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn fresh_session_refresh_reports_false() {
    let app = test_app(false);
    let cookie = login(&app).await;

    let value = cookie.trim_start_matches("is_session=").to_string();
    let response = app
        .router
        .oneshot(
            request("PUT", "/auth/refresh")
                .header("X-IS-SessionID", value)
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json(response).await;
    assert_eq!(payload["refreshed"], false);
}

#[tokio::test]
async fn logout_ends_the_session() {
    let app = test_app(false);
    let cookie = login(&app).await;

    let response = app
        .router
        .clone()
        .oneshot(
            request("DELETE", "/auth/logout")
                .header(header::COOKIE, &cookie)
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_eq!(set_cookie(response.headers()).as_deref(), Some("is_session="));
    assert_eq!(app.gateway.revocations.load(Ordering::SeqCst), 1);

    let response = app
        .router
        .clone()
        .oneshot(
            request("GET", "/auth/me")
                .header(header::COOKIE, &cookie)
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // Logging out again is not an error.
    let response = app
        .router
        .oneshot(
            request("DELETE", "/auth/session")
                .header(header::COOKIE, &cookie)
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn logout_without_cookie_succeeds() {
    let app = test_app(false);
    let response = app
        .router
        .oneshot(request("DELETE", "/auth/logout").body(Body::empty()).expect("request"))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn verify_resolves_daemon_key() {
    let app = test_app(false);
    let authorization = BearerCredentials {
        realm_id: app.realm_id,
        key: API_KEY.to_string(),
    }
    .to_authorization();

    let response = app
        .router
        .oneshot(
            request("GET", "/auth/verify")
                .header(header::AUTHORIZATION, authorization)
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json(response).await;
    assert_eq!(payload["owner"]["kind"], "daemon");
    assert_eq!(payload["owner"]["id"], app.seed.daemons[0].id.to_string());
    assert_eq!(payload["key_name"], "ci");
}

#[tokio::test]
async fn verify_rejects_unknown_key() {
    let app = test_app(false);
    let authorization = BearerCredentials {
        realm_id: app.realm_id,
        key: "nope".to_string(),
    }
    .to_authorization();

    let response = app
        .router
        .oneshot(
            request("GET", "/auth/verify")
                .header(header::AUTHORIZATION, authorization)
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn verify_rejects_malformed_header() {
    let app = test_app(false);
    let response = app
        .router
        .oneshot(
            request("GET", "/auth/verify")
                .header(header::AUTHORIZATION, "Bearer %%%")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn verify_key_of_another_realm_is_unauthorized() {
    let app = test_app(false);
    let authorization = BearerCredentials {
        realm_id: app.disabled_realm_id,
        key: API_KEY.to_string(),
    }
    .to_authorization();

    let response = app
        .router
        .oneshot(
            request("GET", "/auth/verify")
                .header(header::AUTHORIZATION, authorization)
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
