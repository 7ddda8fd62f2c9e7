#![allow(dead_code)]

use argon2::PasswordHasher;
use axum::http::{HeaderName, HeaderValue};
use axum::Router;
use messenger_server::{
    blob::BlobStore,
    chat::{directory, membership},
    config::{BlobBackend, Config},
    db, routes, AppState,
};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use std::sync::Arc;

pub const GLOBAL_CONVERSATION_ID: &str = "global";
pub const PUBLIC_URL: &str = "http://localhost:3000";

/// Create an in-memory SQLite pool with schema applied and the global
/// conversation seeded.
pub async fn setup_test_db() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to create in-memory SQLite pool");

    sqlx::query("PRAGMA foreign_keys = ON")
        .execute(&pool)
        .await
        .unwrap();

    db::apply_schema(&pool).await.unwrap();

    let mut conn = pool.acquire().await.unwrap();
    directory::ensure_global_conversation(&mut conn, GLOBAL_CONVERSATION_ID)
        .await
        .unwrap();
    drop(conn);

    pool
}

pub fn test_config() -> Config {
    let upload_dir = std::env::temp_dir()
        .join(format!("messenger-test-uploads-{}", uuid::Uuid::new_v4()))
        .to_string_lossy()
        .into_owned();

    Config {
        host: "127.0.0.1".into(),
        port: 0,
        database_path: ":memory:".into(),
        session_ttl_days: 7,
        public_url: PUBLIC_URL.into(),
        upload_dir,
        max_upload_bytes: 64 * 1024,
        blob_backend: BlobBackend::Local,
        blob_endpoint: "".into(),
        blob_bucket: "".into(),
        blob_token: None,
        blob_public_url: "".into(),
        avatar_base_url: "https://avatars.test".into(),
        global_conversation_id: GLOBAL_CONVERSATION_ID.into(),
        cors_origins: vec![],
    }
}

/// Build a test Axum app with the given pool.
pub fn create_test_app(pool: SqlitePool) -> Router {
    let config = test_config();
    let blobs = BlobStore::from_config(&config).unwrap();
    let state = Arc::new(AppState {
        db: pool,
        config,
        blobs,
    });

    routes::build_router(state)
}

pub fn auth_header(token: &str) -> (HeaderName, HeaderValue) {
    (
        HeaderName::from_static("authorization"),
        format!("Bearer {}", token).parse().unwrap(),
    )
}

/// Create a test user directly in the database. Returns (user_id, session_token).
pub async fn create_test_user(
    pool: &SqlitePool,
    email: &str,
    username: &str,
    password: &str,
) -> (String, String) {
    let user_id = uuid::Uuid::new_v4().to_string();
    let now = db::timestamp();

    let salt = argon2::password_hash::SaltString::generate(&mut rand::rngs::OsRng);
    let password_hash = argon2::Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .unwrap()
        .to_string();

    sqlx::query(
        r#"INSERT INTO "users" (id, username, email, password_hash, name, avatar, bio, created_at, updated_at)
           VALUES (?, ?, ?, ?, ?, NULL, NULL, ?, ?)"#,
    )
    .bind(&user_id)
    .bind(username)
    .bind(email)
    .bind(&password_hash)
    .bind(username)
    .bind(&now)
    .bind(&now)
    .execute(pool)
    .await
    .unwrap();

    let session_token = uuid::Uuid::new_v4().simple().to_string();
    sqlx::query(
        r#"INSERT INTO "sessions" (token, user_id, expires_at, created_at) VALUES (?, ?, ?, ?)"#,
    )
    .bind(&session_token)
    .bind(&user_id)
    .bind(db::timestamp_in_days(30))
    .bind(&now)
    .execute(pool)
    .await
    .unwrap();

    (user_id, session_token)
}

/// Create `count` users named user0, user1, ... Returns (id, token) pairs.
pub async fn create_test_users(pool: &SqlitePool, count: usize) -> Vec<(String, String)> {
    let mut users = Vec::with_capacity(count);
    for i in 0..count {
        users.push(
            create_test_user(
                pool,
                &format!("user{}@test.com", i),
                &format!("user{}", i),
                "password123",
            )
            .await,
        );
    }
    users
}

pub async fn create_test_group(
    pool: &SqlitePool,
    creator_id: &str,
    member_ids: &[&str],
    name: &str,
) -> String {
    let members: Vec<String> = member_ids.iter().map(|m| m.to_string()).collect();
    let mut conn = pool.acquire().await.unwrap();
    directory::create_group(&mut conn, creator_id, name, &members, None)
        .await
        .unwrap()
        .id
}

pub async fn create_test_direct(pool: &SqlitePool, user_id: &str, other_id: &str) -> String {
    let mut conn = pool.acquire().await.unwrap();
    directory::create_direct(&mut conn, user_id, other_id)
        .await
        .unwrap()
        .id
}

pub async fn post_test_message(
    pool: &SqlitePool,
    sender_id: &str,
    conversation_id: &str,
    content: &str,
) -> String {
    let mut conn = pool.acquire().await.unwrap();
    messenger_server::chat::messages::post(
        &mut conn,
        sender_id,
        conversation_id,
        messenger_server::models::NewMessage {
            content: Some(content.into()),
            ..Default::default()
        },
    )
    .await
    .unwrap()
    .id
}

/// Ids of active admins of a conversation, in join order.
pub async fn active_admins(pool: &SqlitePool, conversation_id: &str) -> Vec<String> {
    let mut conn = pool.acquire().await.unwrap();
    membership::active_members(&mut conn, conversation_id)
        .await
        .unwrap()
        .into_iter()
        .filter(|m| m.is_admin)
        .map(|m| m.user_id)
        .collect()
}
