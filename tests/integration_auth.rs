//! Authentication integration tests
//!
//! Tests account creation and Basic auth on the distutils endpoint:
//! - The `user` action
//! - Challenges for missing or wrong credentials
//! - Rate limiting of repeated failures

mod common;

use std::time::Duration;

use common::*;
use pypi_index::auth::RateLimitConfig;
use pypi_index::index::IndexSettings;
use reqwest::StatusCode;

/// Test 1: Create an account
#[tokio::test]
async fn test_create_user() {
    let index = TestIndex::start().await;

    let response = index.create_user("alice", "secret").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.text().await.unwrap(), "OK\n");

    let response = index
        .post_as("alice", "secret", register_form("demo", "1.0"))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
}

/// Test 2: Duplicate usernames are refused, ignoring case
#[tokio::test]
async fn test_create_user_duplicate() {
    let index = TestIndex::start().await;

    assert_eq!(index.create_user("alice", "secret").await.status(), StatusCode::OK);

    let response = index.create_user("alice", "other").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(response.text().await.unwrap().is_empty());

    let response = index.create_user("ALICE", "other").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

/// Test 3: Missing registration fields
#[tokio::test]
async fn test_create_user_missing_fields() {
    let index = TestIndex::start().await;

    let response = index
        .client
        .post(index.url("/"))
        .form(&[(":action", "user"), ("name", "alice")])
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

/// Test 4: Closed registration
#[tokio::test]
async fn test_registration_closed() {
    let settings = IndexSettings {
        registration_open: false,
        ..IndexSettings::default()
    };
    let index = TestIndex::start_with(settings, RateLimitConfig::default()).await;

    let response = index.create_user("alice", "secret").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

/// Test 5: Upload without credentials is challenged
#[tokio::test]
async fn test_upload_requires_auth() {
    let index = TestIndex::start().await;

    let response = index
        .client
        .post(index.url("/"))
        .multipart(upload_form("demo", "1.0", "demo-1.0.tar.gz", b"data"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        response.headers().get("www-authenticate").unwrap(),
        "Basic realm=\"pypi\""
    );

    let response = index.get("/simple/demo/").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

/// Test 6: Wrong password and unknown user
#[tokio::test]
async fn test_invalid_credentials() {
    let index = TestIndex::start().await;
    assert_eq!(index.create_user("alice", "secret").await.status(), StatusCode::OK);

    let response = index
        .post_as("alice", "wrong", register_form("demo", "1.0"))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = index
        .post_as("mallory", "secret", register_form("demo", "1.0"))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

/// Test 7: Repeated failures are rate limited
#[tokio::test]
async fn test_rate_limit_blocks_client() {
    let rate_limit = RateLimitConfig {
        max_failures: 2,
        block_duration: Duration::from_secs(60),
        window_duration: Duration::from_secs(60),
    };
    let index = TestIndex::start_with(IndexSettings::default(), rate_limit).await;
    assert_eq!(index.create_user("alice", "secret").await.status(), StatusCode::OK);

    for _ in 0..2 {
        let response = index
            .post_as("alice", "wrong", register_form("demo", "1.0"))
            .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    // Even the right password is refused while blocked
    let response = index
        .post_as("alice", "secret", register_form("demo", "1.0"))
        .await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
}

/// Test 8: Unknown and missing actions
#[tokio::test]
async fn test_unknown_action() {
    let index = TestIndex::start().await;

    let response = index
        .client
        .post(index.url("/"))
        .form(&[(":action", "list_classifiers")])
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_IMPLEMENTED);
    assert_eq!(
        response.text().await.unwrap(),
        "The action list_classifiers is not implemented"
    );

    let response = index
        .client
        .post(index.url("/"))
        .form(&[("name", "demo")])
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_IMPLEMENTED);
}
