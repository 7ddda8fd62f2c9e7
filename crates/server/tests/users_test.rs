mod common;

use axum::http::StatusCode;
use axum_test::TestServer;
use common::auth_header;
use serde_json::json;

async fn setup() -> (TestServer, sqlx::SqlitePool) {
    let pool = common::setup_test_db().await;
    let app = common::create_test_app(pool.clone());
    let server = TestServer::new(app).unwrap();
    (server, pool)
}

#[tokio::test]
async fn all_users_excludes_caller() {
    let (server, pool) = setup().await;
    let users = common::create_test_users(&pool, 3).await;

    let (h, v) = auth_header(&users[1].1);
    let res = server.get("/users/all").add_header(h, v).await;
    res.assert_status_ok();
    let body: serde_json::Value = res.json();
    let names: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|u| u["username"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["user0", "user2"]);
    assert!(body[0].get("email").is_none());
}

#[tokio::test]
async fn check_username_availability() {
    let (server, pool) = setup().await;
    let users = common::create_test_users(&pool, 1).await;

    let (h, v) = auth_header(&users[0].1);
    let res = server.get("/users/user0").add_header(h, v).await;
    res.assert_status_ok();
    let body: serde_json::Value = res.json();
    assert_eq!(body["available"], false);

    let (h, v) = auth_header(&users[0].1);
    let res = server.get("/users/fresh_name").add_header(h, v).await;
    let body: serde_json::Value = res.json();
    assert_eq!(body["available"], true);
}

#[tokio::test]
async fn update_profile_changes_fields() {
    let (server, pool) = setup().await;
    let users = common::create_test_users(&pool, 1).await;

    let (h, v) = auth_header(&users[0].1);
    let res = server
        .post("/users/update")
        .add_header(h, v)
        .json(&json!({ "name": "Alice Liddell", "bio": "Down the rabbit hole", "username": "alice" }))
        .await;
    res.assert_status_ok();
    let body: serde_json::Value = res.json();
    assert_eq!(body["user"]["name"], "Alice Liddell");
    assert_eq!(body["user"]["bio"], "Down the rabbit hole");
    assert_eq!(body["user"]["username"], "alice");

    // Omitted fields are left alone
    let (h, v) = auth_header(&users[0].1);
    let res = server
        .post("/users/update")
        .add_header(h, v)
        .json(&json!({ "bio": "" }))
        .await;
    res.assert_status_ok();
    let body: serde_json::Value = res.json();
    assert_eq!(body["user"]["name"], "Alice Liddell");
    assert!(body["user"]["bio"].is_null());
}

#[tokio::test]
async fn update_profile_rejects_taken_or_invalid_username() {
    let (server, pool) = setup().await;
    let users = common::create_test_users(&pool, 2).await;

    let (h, v) = auth_header(&users[0].1);
    let res = server
        .post("/users/update")
        .add_header(h, v)
        .json(&json!({ "username": "user1" }))
        .await;
    res.assert_status(StatusCode::BAD_REQUEST);
    let body: serde_json::Value = res.json();
    assert_eq!(body["error"], "Username already exists");

    let (h, v) = auth_header(&users[0].1);
    let res = server
        .post("/users/update")
        .add_header(h, v)
        .json(&json!({ "username": "no spaces allowed" }))
        .await;
    res.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn friendship_is_symmetric() {
    let (server, pool) = setup().await;
    let users = common::create_test_users(&pool, 2).await;

    let (h, v) = auth_header(&users[0].1);
    let res = server
        .post("/users/addFriend")
        .add_header(h, v)
        .json(&json!({ "friendId": users[1].0 }))
        .await;
    res.assert_status_ok();

    let (h, v) = auth_header(&users[1].1);
    let res = server.get("/auth/me").add_header(h, v).await;
    let body: serde_json::Value = res.json();
    assert_eq!(body["friends"][0]["id"], users[0].0.as_str());

    let (h, v) = auth_header(&users[1].1);
    let res = server
        .post("/users/removeFriend")
        .add_header(h, v)
        .json(&json!({ "friendId": users[0].0 }))
        .await;
    res.assert_status_ok();

    let (h, v) = auth_header(&users[0].1);
    let res = server.get("/auth/me").add_header(h, v).await;
    let body: serde_json::Value = res.json();
    assert!(body["friends"].as_array().unwrap().is_empty());

    let (h, v) = auth_header(&users[0].1);
    let res = server
        .post("/users/removeFriend")
        .add_header(h, v)
        .json(&json!({ "friendId": users[1].0 }))
        .await;
    res.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn add_friend_validation() {
    let (server, pool) = setup().await;
    let users = common::create_test_users(&pool, 1).await;

    let (h, v) = auth_header(&users[0].1);
    let res = server
        .post("/users/addFriend")
        .add_header(h, v)
        .json(&json!({ "friendId": users[0].0 }))
        .await;
    res.assert_status(StatusCode::BAD_REQUEST);

    let (h, v) = auth_header(&users[0].1);
    let res = server
        .post("/users/addFriend")
        .add_header(h, v)
        .json(&json!({ "friendId": "ghost" }))
        .await;
    res.assert_status(StatusCode::NOT_FOUND);
}
