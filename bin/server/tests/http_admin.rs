mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use common::{HOST, read_json, set_cookie, test_app};
use serde_json::json;
use tower::ServiceExt;

fn request(method: &str, uri: &str) -> axum::http::request::Builder {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::HOST, HOST)
}

async fn local_admin_cookie(app: &common::TestApp) -> String {
    let response = app
        .router
        .clone()
        .oneshot(request("POST", "/auth/local").body(Body::empty()).expect("request"))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    set_cookie(response.headers()).expect("cookie")
}

#[tokio::test]
async fn local_admin_is_not_found_when_disabled() {
    let app = test_app(false);
    let response = app
        .router
        .oneshot(request("POST", "/auth/local").body(Body::empty()).expect("request"))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn local_admin_cookie_is_rejected_once_disabled() {
    let enabled = test_app(true);
    let cookie = local_admin_cookie(&enabled).await;

    // Same cookie secret, bootstrap off.
    let disabled = test_app(false);
    let response = disabled
        .router
        .oneshot(
            request("GET", "/realms")
                .header(header::COOKIE, &cookie)
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn local_admin_lists_realms() {
    let app = test_app(true);
    let cookie = local_admin_cookie(&app).await;

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
    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json(response).await;
    let codes: Vec<&str> = payload
        .as_array()
        .expect("array")
        .iter()
        .filter_map(|realm| realm["code"].as_str())
        .collect();
    assert!(codes.contains(&"acme"));
    assert!(codes.contains(&"dormant"));
}

#[tokio::test]
async fn realm_lifecycle() {
    let app = test_app(true);
    let cookie = local_admin_cookie(&app).await;

    let response = app
        .router
        .clone()
        .oneshot(
            request("POST", "/realms")
                .header(header::COOKIE, &cookie)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json!({"code": "globex", "name": "Globex"}).to_string()))
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::CREATED);
    let realm = read_json(response).await;
    let realm_id = realm["id"].as_str().expect("id").to_string();
    assert_eq!(realm["enabled"], true);

    let response = app
        .router
        .clone()
        .oneshot(
            request("POST", "/realms")
                .header(header::COOKIE, &cookie)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json!({"code": "globex", "name": "Again"}).to_string()))
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = app
        .router
        .clone()
        .oneshot(
            request("DELETE", &format!("/realms/{realm_id}"))
                .header(header::COOKIE, &cookie)
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app
        .router
        .oneshot(
            request("GET", &format!("/realms/{realm_id}"))
                .header(header::COOKIE, &cookie)
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn provider_responses_omit_client_secret() {
    let app = test_app(true);
    let cookie = local_admin_cookie(&app).await;

    let response = app
        .router
        .oneshot(
            request("GET", &format!("/realms/{}/providers", app.realm_id))
                .header(header::COOKIE, &cookie)
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json(response).await;
    let providers = payload.as_array().expect("array");
    assert_eq!(providers.len(), 1);
    assert_eq!(providers[0]["code"], "google");
    assert!(providers[0].get("client_secret").is_none());
}

#[tokio::test]
async fn daemon_key_secret_is_shown_once() {
    let app = test_app(true);
    let cookie = local_admin_cookie(&app).await;
    let daemon_id = app.seed.daemons[0].id;
    let keys = format!("/realms/{}/daemons/{daemon_id}/keys", app.realm_id);

    let response = app
        .router
        .clone()
        .oneshot(
            request("POST", &keys)
                .header(header::COOKIE, &cookie)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json!({"name": "deploy"}).to_string()))
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::CREATED);
    let created = read_json(response).await;
    assert!(!created["key"].as_str().expect("key").is_empty());

    let response = app
        .router
        .oneshot(
            request("GET", &keys)
                .header(header::COOKIE, &cookie)
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let listed = read_json(response).await;
    let listed = listed.as_array().expect("array");
    assert_eq!(listed.len(), 2);
    assert!(listed.iter().all(|key| key["key"] == ""));
}
