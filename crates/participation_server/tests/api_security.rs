use std::net::SocketAddr;

use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{header, Method, Request, StatusCode},
    response::Response,
    Router,
};
use http_body_util::BodyExt;
use participation_server::{
    build_router,
    config::{Config, Environment},
    state::AppState,
};
use serde_json::{json, Value};
use tower::ServiceExt;

const TRUSTED_ORIGIN: &str = "https://participation-app.vercel.app";

fn app_with(config: Config) -> Router {
    build_router(AppState::new(config).unwrap())
}

fn production(keys: &[&str]) -> Config {
    let mut config = Config::for_environment(Environment::Production, ":memory:");
    config.auth.allowed_keys = keys.iter().map(|key| key.to_string()).collect();
    config
}

async fn call(app: &Router, request: Request<Body>) -> Response {
    app.clone().oneshot(request).await.unwrap()
}

async fn json_body(response: Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn get(uri: &str) -> axum::http::request::Builder {
    Request::builder().method(Method::GET).uri(uri)
}

#[tokio::test]
async fn production_requires_a_known_api_key() {
    let app = app_with(production(&["secret-1"]));

    let response = call(&app, get("/api/participants").body(Body::empty()).unwrap()).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        json_body(response).await,
        json!({"error": "Authentication required", "message": "Missing X-API-Key header"})
    );

    let response = call(
        &app,
        get("/api/participants")
            .header("x-api-key", "wrong")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(response).await["message"], "Invalid API key");

    let response = call(
        &app,
        get("/api/participants")
            .header("x-api-key", "secret-1")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn trusted_frontend_origin_skips_the_key_check() {
    let app = app_with(production(&["secret-1"]));
    let response = call(
        &app,
        get("/api/participants")
            .header(header::ORIGIN, TRUSTED_ORIGIN)
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        TRUSTED_ORIGIN
    );
}

#[tokio::test]
async fn development_does_not_check_keys() {
    let app = app_with(Config::for_environment(Environment::Development, ":memory:"));
    let response = call(&app, get("/api/participants").body(Body::empty()).unwrap()).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["x-ratelimit-limit"], "30");
    assert_eq!(response.headers()["x-ratelimit-remaining"], "29");
}

#[tokio::test]
async fn sixth_write_in_a_minute_is_rate_limited() {
    let app = app_with(Config::for_environment(Environment::Development, ":memory:"));

    for n in 0..5 {
        let last_name = format!("Limit {}", "x".repeat(n + 1));
        let body = json!({"firstName": "Rate", "lastName": last_name, "participation": 1});
        let response = call(
            &app,
            Request::builder()
                .method(Method::POST)
                .uri("/api/participants")
                .header("content-type", "application/json")
                .header("x-forwarded-for", "203.0.113.7")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await;
        assert_ne!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    let response = call(
        &app,
        Request::builder()
            .method(Method::POST)
            .uri("/api/participants")
            .header("x-forwarded-for", "203.0.113.7")
            .body(Body::from("{}"))
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    let retry_after: u64 = response.headers()[header::RETRY_AFTER]
        .to_str()
        .unwrap()
        .parse()
        .unwrap();
    assert!(retry_after > 0);
    assert_eq!(response.headers()["x-ratelimit-remaining"], "0");

    let body = json_body(response).await;
    assert_eq!(body["error"], "Too many requests. Please try again later.");
    assert!(body["retryAfter"].as_u64().unwrap() > 0);

    let other_client = call(
        &app,
        Request::builder()
            .method(Method::POST)
            .uri("/api/participants")
            .header("x-forwarded-for", "198.51.100.1")
            .body(Body::from("{}"))
            .unwrap(),
    )
    .await;
    assert_eq!(other_client.status(), StatusCode::BAD_REQUEST);
}

fn empty_post_from(peer: &str) -> Request<Body> {
    let peer: SocketAddr = peer.parse().unwrap();
    let mut request = Request::builder()
        .method(Method::POST)
        .uri("/api/participants")
        .body(Body::from("{}"))
        .unwrap();
    request.extensions_mut().insert(ConnectInfo(peer));
    request
}

#[tokio::test]
async fn peer_address_keys_clients_without_proxy_headers() {
    let app = app_with(Config::for_environment(Environment::Development, ":memory:"));

    for _ in 0..5 {
        let response = call(&app, empty_post_from("192.0.2.10:40000")).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
    let response = call(&app, empty_post_from("192.0.2.10:40001")).await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

    let response = call(&app, empty_post_from("192.0.2.20:40000")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(response.headers()["x-ratelimit-remaining"], "4");
}

#[tokio::test]
async fn unknown_routes_get_a_json_404_under_the_lenient_tier() {
    let app = app_with(Config::for_environment(Environment::Development, ":memory:"));

    let response = call(&app, get("/api/nothing-here").body(Body::empty()).unwrap()).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(response.headers()["x-ratelimit-limit"], "100");
    assert_eq!(response.headers()["x-ratelimit-remaining"], "99");
    assert_eq!(json_body(response).await, json!({"error": "Route not found"}));
}

#[tokio::test]
async fn preflight_is_answered_without_auth() {
    let app = app_with(production(&["secret-1"]));
    let response = call(
        &app,
        Request::builder()
            .method(Method::OPTIONS)
            .uri("/api/participants")
            .header(header::ORIGIN, "https://elsewhere.example")
            .body(Body::empty())
            .unwrap(),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let headers = response.headers();
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], TRUSTED_ORIGIN);
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_CREDENTIALS], "true");
    assert!(headers[header::ACCESS_CONTROL_ALLOW_HEADERS]
        .to_str()
        .unwrap()
        .contains("X-API-Key"));
}

#[tokio::test]
async fn auth_key_is_forbidden_outside_production() {
    let app = app_with(Config::for_environment(Environment::Development, ":memory:"));
    let response = call(&app, get("/api/auth-key").body(Body::empty()).unwrap()).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(json_body(response).await["error"], "Not available in development");
}

#[tokio::test]
async fn auth_key_checks_origin_and_configured_keys() {
    let app = app_with(production(&["first-key", "second-key"]));

    let response = call(
        &app,
        get("/api/auth-key")
            .header(header::ORIGIN, "https://evil.example")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(json_body(response).await["error"], "Unauthorized origin");

    let response = call(
        &app,
        get("/api/auth-key")
            .header(header::REFERER, format!("{TRUSTED_ORIGIN}/dashboard"))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await, json!({"apiKey": "first-key"}));

    let empty = app_with(production(&[]));
    let response = call(
        &empty,
        get("/api/auth-key")
            .header(header::ORIGIN, TRUSTED_ORIGIN)
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json_body(response).await["error"], "API keys not configured");
}

#[tokio::test]
async fn oversized_body_is_rejected() {
    let mut config = Config::for_environment(Environment::Test, ":memory:");
    config.max_body_bytes = 64;
    let app = app_with(config);

    let response = call(
        &app,
        Request::builder()
            .method(Method::POST)
            .uri("/api/participants")
            .header("content-type", "application/json")
            .header(header::CONTENT_LENGTH, "200")
            .body(Body::from("x".repeat(200)))
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
}
