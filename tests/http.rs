mod common;

use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderValue, StatusCode};
use axum_test::TestServer;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use courier_web::{build_router, AppState, NOT_AUTHORIZED};
use db_tests::{ATHLETE, BRAND, CLUB};

use common::{fast_timeout, fixture_db, messenger, messenger_with, token_for};

fn test_server(db: &mock_db::Db) -> TestServer {
    let state = AppState::new(messenger(db), CancellationToken::new());
    TestServer::new(build_router(state)).expect("failed to create test server")
}

#[tokio::test]
async fn health_reports_online_users() {
    let server = test_server(&fixture_db());
    let resp = server.get("/api/v1/health").await;
    resp.assert_status_ok();

    let body: Value = resp.json();
    assert_eq!(body, json!({ "status": "ok", "online": 0 }));
}

#[tokio::test]
async fn rejects_requests_without_valid_bearer() {
    let server = test_server(&fixture_db());

    let resp = server.get("/api/v1/chat/inbox-preview").await;
    resp.assert_status(StatusCode::UNAUTHORIZED);
    let body: Value = resp.json();
    assert_eq!(body, json!({ "success": false, "message": NOT_AUTHORIZED }));

    let resp = server
        .get("/api/v1/chat/inbox-preview")
        .authorization_bearer(token_for(Uuid::new_v4()))
        .await;
    resp.assert_status(StatusCode::UNAUTHORIZED);
    let body: Value = resp.json();
    assert_eq!(body["message"], "Invalid token or user not found!");

    let resp = server
        .get("/api/v1/chat/inbox-preview")
        .add_header(AUTHORIZATION, HeaderValue::from_static("Basic Zm9vOmJhcg=="))
        .await;
    resp.assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn sends_message_and_reads_history() {
    let db = fixture_db();
    let server = test_server(&db);

    let resp = server
        .post("/api/v1/chat/send-message")
        .authorization_bearer(token_for(ATHLETE))
        .json(&json!({ "receiverId": CLUB, "message": "Hi from HTTP", "images": [] }))
        .await;
    resp.assert_status_ok();
    let body: Value = resp.json();
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], "Message sent successfully");
    assert_eq!(body["data"]["senderId"], json!(ATHLETE));
    assert_eq!(body["data"]["receiverId"], json!(CLUB));
    assert_eq!(body["data"]["isRead"], false);

    let resp = server
        .get(&format!("/api/v1/chat/{ATHLETE}"))
        .authorization_bearer(token_for(CLUB))
        .await;
    resp.assert_status_ok();
    let body: Value = resp.json();
    assert_eq!(body["message"], "Chats fetched successfully");
    assert_eq!(body["data"].as_array().map(Vec::len), Some(1));
    assert_eq!(body["data"][0]["message"], "Hi from HTTP");
}

#[tokio::test]
async fn rejects_bad_message_bodies() {
    let server = test_server(&fixture_db());

    let resp = server
        .post("/api/v1/chat/send-message")
        .authorization_bearer(token_for(ATHLETE))
        .json(&json!({ "message": "who is this for?" }))
        .await;
    resp.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = resp.json();
    assert_eq!(body["success"], false);

    let resp = server
        .post("/api/v1/chat/send-message")
        .authorization_bearer(token_for(ATHLETE))
        .json(&json!({ "receiverId": ATHLETE, "message": "note to self" }))
        .await;
    resp.assert_status(StatusCode::BAD_REQUEST);

    let resp = server
        .get("/api/v1/chat/not-a-user-id")
        .authorization_bearer(token_for(ATHLETE))
        .await;
    resp.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn finds_or_creates_room_for_caller() {
    let server = test_server(&fixture_db());

    let resp = server
        .post("/api/v1/chat/find-or-create-room")
        .authorization_bearer(token_for(BRAND))
        .json(&json!({ "receiverId": ATHLETE }))
        .await;
    resp.assert_status_ok();
    let created: Value = resp.json();
    assert_eq!(created["message"], "Room found or created successfully");
    assert_eq!(created["data"]["senderId"], json!(BRAND));
    assert_eq!(created["data"]["receiverId"], json!(ATHLETE));

    let resp = server
        .post("/api/v1/chat/find-or-create-room")
        .authorization_bearer(token_for(ATHLETE))
        .json(&json!({ "receiverId": BRAND }))
        .await;
    resp.assert_status_ok();
    let found: Value = resp.json();
    assert_eq!(found["data"]["id"], created["data"]["id"]);

    let resp = server
        .post("/api/v1/chat/find-or-create-room")
        .authorization_bearer(token_for(ATHLETE))
        .json(&json!({ "receiverId": Uuid::new_v4() }))
        .await;
    resp.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn inbox_preview_lists_conversations() {
    let db = fixture_db();
    let messenger = messenger(&db);
    messenger.send_message(&CLUB, &ATHLETE, Some("Welcome aboard".into()), vec![]).await.unwrap();
    let server = test_server(&db);

    let resp = server
        .get("/api/v1/chat/inbox-preview")
        .authorization_bearer(token_for(ATHLETE))
        .await;
    resp.assert_status_ok();
    let body: Value = resp.json();
    assert_eq!(body["message"], "Inbox preview fetched successfully");
    assert_eq!(body["data"][0]["user"]["receiverId"], json!(CLUB));
    assert_eq!(body["data"][0]["user"]["name"], "FC Harbor");
    assert_eq!(body["data"][0]["lastMessage"], "Welcome aboard");
    assert_eq!(body["data"][0]["unreadCount"], 0);
}

#[tokio::test]
async fn store_outage_maps_to_server_errors() {
    let db = fixture_db();
    let token = token_for(ATHLETE);
    let state = AppState::new(messenger_with(&db, fast_timeout()), CancellationToken::new());
    let server = TestServer::new(build_router(state)).expect("failed to create test server");

    db.set_unavailable(true);
    let resp = server.get("/api/v1/chat/inbox-preview").authorization_bearer(&token).await;
    resp.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = resp.json();
    assert_eq!(body, json!({ "success": false, "message": "Something went wrong" }));

    db.set_unavailable(false);
    db.set_latency(std::time::Duration::from_millis(500));
    let resp = server.get("/api/v1/chat/inbox-preview").authorization_bearer(&token).await;
    resp.assert_status(StatusCode::SERVICE_UNAVAILABLE);
}
