mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::{TestApp, TestOptions};
use serde_json::json;

const GENERATE: &str = "/api/ai/generate";

fn generate_from(ip: &str, prompt: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(GENERATE)
        .header("Content-Type", "application/json")
        .header("X-Forwarded-For", ip)
        .body(Body::from(json!({ "prompt": prompt }).to_string()))
        .unwrap()
}

#[tokio::test]
async fn generate_returns_text_and_raw_body() {
    let app = TestApp::spawn();

    let response = app
        .post_json(GENERATE, None, json!({ "prompt": "Suggest a day in Ubud" }))
        .await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["text"], "Mock response for: Suggest a day in Ubud");
    assert_eq!(
        response.body["raw"]["candidates"][0]["content"]["parts"][0]["text"],
        "Mock response for: Suggest a day in Ubud"
    );
}

#[tokio::test]
async fn missing_prompt_is_bad_request() {
    let app = TestApp::spawn();

    for body in [json!({}), json!({ "prompt": "" }), json!({ "prompt": 42 })] {
        let response = app.post_json(GENERATE, None, body).await;
        assert_eq!(response.status, StatusCode::BAD_REQUEST);
        assert_eq!(response.body["error"], "Missing prompt in request body");
    }
}

#[tokio::test]
async fn generate_is_post_only() {
    let app = TestApp::spawn();
    let response = app.get(GENERATE, None).await;
    assert_eq!(response.status, StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn rate_limit_applies_per_client_ip() {
    let app = TestApp::spawn_with(TestOptions {
        rate_limit: 2,
        ..TestOptions::default()
    });

    for _ in 0..2 {
        let response = app.send(generate_from("203.0.113.10", "hello")).await;
        assert_eq!(response.status, StatusCode::OK);
    }

    let limited = app.send(generate_from("203.0.113.10", "hello")).await;
    assert_eq!(limited.status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(limited.body["success"], false);
    let retry_after: u64 = limited.headers["retry-after"]
        .to_str()
        .unwrap()
        .parse()
        .unwrap();
    assert!(retry_after >= 1);

    let other_client = app.send(generate_from("198.51.100.4", "hello")).await;
    assert_eq!(other_client.status, StatusCode::OK);
}

#[tokio::test]
async fn forwarded_header_is_ignored_without_trusted_proxy() {
    let app = TestApp::spawn_with(TestOptions {
        rate_limit: 2,
        trust_forwarded_for: false,
        ..TestOptions::default()
    });

    for ip in ["203.0.113.1", "203.0.113.2"] {
        let response = app.send(generate_from(ip, "hello")).await;
        assert_eq!(response.status, StatusCode::OK);
    }

    // A fresh header value does not buy a fresh bucket.
    let rotated = app.send(generate_from("203.0.113.3", "hello")).await;
    assert_eq!(rotated.status, StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn unconfigured_provider_is_server_error() {
    let app = TestApp::spawn_with(TestOptions {
        text_provider_enabled: false,
        ..TestOptions::default()
    });

    let response = app
        .post_json(GENERATE, None, json!({ "prompt": "hello" }))
        .await;

    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.body["success"], false);
}
