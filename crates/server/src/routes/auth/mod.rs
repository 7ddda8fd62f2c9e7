mod session;

pub use session::*;

use argon2::PasswordHasher;
use axum::{
    extract::State,
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::IntoResponse,
    Json,
};
use sqlx::SqliteConnection;
use std::sync::Arc;

use crate::blob::generated_avatar_url;
use crate::chat::directory;
use crate::db::{self, timestamp, timestamp_in_days};
use crate::error::{is_unique_violation, ApiError, ApiResult};
use crate::middleware::auth::SESSION_COOKIE;
use crate::models::{AuthResponse, RegisterRequest, UserProfile};
use crate::AppState;
use messenger_shared::validation::{
    validate_display_name, validate_email, validate_password, validate_username,
};

const PROFILE_COLUMNS: &str =
    "id, username, email, name, avatar, bio, created_at, updated_at";

/// POST /auth/register
pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(body): Json<RegisterRequest>,
) -> ApiResult<impl IntoResponse> {
    let email = body.email.trim().to_lowercase();
    let username = body.username.trim().to_string();
    let name = body
        .name
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty());

    if email.is_empty() || username.is_empty() || body.password.trim().is_empty() {
        return Err(ApiError::validation("All fields are required"));
    }
    validate_email(&email).map_err(ApiError::Validation)?;
    validate_username(&username).map_err(ApiError::Validation)?;
    validate_password(&body.password).map_err(ApiError::Validation)?;
    if let Some(name) = &name {
        validate_display_name(name).map_err(ApiError::Validation)?;
    }

    let password_hash = hash_password(body.password).await?;
    let user_id = uuid::Uuid::new_v4().to_string();
    let now = timestamp();
    let avatar = generated_avatar_url(&state.config.avatar_base_url, "thumbs", &user_id);

    let mut tx = db::begin_write(&state.db).await?;

    let email_taken =
        sqlx::query_scalar::<_, i64>(r#"SELECT COUNT(*) FROM "users" WHERE email = ?"#)
            .bind(&email)
            .fetch_one(&mut *tx)
            .await?;
    if email_taken > 0 {
        return Err(ApiError::conflict("Email already exists"));
    }

    let username_taken =
        sqlx::query_scalar::<_, i64>(r#"SELECT COUNT(*) FROM "users" WHERE username = ?"#)
            .bind(&username)
            .fetch_one(&mut *tx)
            .await?;
    if username_taken > 0 {
        return Err(ApiError::conflict("Username already exists"));
    }

    sqlx::query(
        r#"INSERT INTO "users" (id, username, email, password_hash, name, avatar, bio, created_at, updated_at)
           VALUES (?, ?, ?, ?, ?, ?, NULL, ?, ?)"#,
    )
    .bind(&user_id)
    .bind(&username)
    .bind(&email)
    .bind(&password_hash)
    .bind(&name)
    .bind(&avatar)
    .bind(&now)
    .bind(&now)
    .execute(&mut *tx)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            ApiError::conflict("Email or username already exists")
        } else {
            e.into()
        }
    })?;

    directory::join_global_conversation(&mut tx, &user_id, &state.config.global_conversation_id)
        .await?;
    let token = create_session(&mut tx, &user_id, state.config.session_ttl_days).await?;
    let user = fetch_profile(&mut tx, &user_id).await?;
    tx.commit().await?;

    tracing::info!(%user_id, %username, "user registered");

    let headers = session_cookie(&token, state.config.session_ttl_days)?;
    Ok((
        StatusCode::CREATED,
        headers,
        Json(AuthResponse {
            message: None,
            token,
            user,
        }),
    ))
}

/// Hashing blocks, so it runs on the blocking pool.
pub(crate) async fn hash_password(password: String) -> ApiResult<String> {
    tokio::task::spawn_blocking(move || {
        let salt = argon2::password_hash::SaltString::generate(&mut rand::rngs::OsRng);
        argon2::Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|h| h.to_string())
    })
    .await
    .map_err(|e| ApiError::internal(format!("hashing task failed: {}", e)))?
    .map_err(|e| ApiError::internal(format!("failed to hash password: {}", e)))
}

pub(crate) async fn verify_password(password: String, stored_hash: String) -> ApiResult<bool> {
    use argon2::PasswordVerifier;

    tokio::task::spawn_blocking(move || -> ApiResult<bool> {
        let parsed = argon2::PasswordHash::new(&stored_hash)
            .map_err(|e| ApiError::internal(format!("stored hash is invalid: {}", e)))?;
        Ok(argon2::Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok())
    })
    .await
    .map_err(|e| ApiError::internal(format!("verify task failed: {}", e)))?
}

/// Issue a fresh opaque session token for `user_id`.
pub(crate) async fn create_session(
    conn: &mut SqliteConnection,
    user_id: &str,
    ttl_days: i64,
) -> Result<String, sqlx::Error> {
    let token = uuid::Uuid::new_v4().simple().to_string();
    sqlx::query(
        r#"INSERT INTO "sessions" (token, user_id, expires_at, created_at) VALUES (?, ?, ?, ?)"#,
    )
    .bind(&token)
    .bind(user_id)
    .bind(timestamp_in_days(ttl_days))
    .bind(timestamp())
    .execute(&mut *conn)
    .await?;
    Ok(token)
}

pub(crate) fn session_cookie(token: &str, ttl_days: i64) -> ApiResult<HeaderMap> {
    let cookie = format!(
        "{}={}; HttpOnly; SameSite=Lax; Path=/; Max-Age={}",
        SESSION_COOKIE,
        token,
        ttl_days * 86_400
    );
    let value = HeaderValue::from_str(&cookie)
        .map_err(|e| ApiError::internal(format!("invalid cookie header: {}", e)))?;

    let mut headers = HeaderMap::new();
    headers.insert(header::SET_COOKIE, value);
    Ok(headers)
}

pub(crate) async fn fetch_profile(
    conn: &mut SqliteConnection,
    user_id: &str,
) -> ApiResult<UserProfile> {
    let sql = format!(r#"SELECT {} FROM "users" WHERE id = ?"#, PROFILE_COLUMNS);
    sqlx::query_as::<_, UserProfile>(&sql)
        .bind(user_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))
}
