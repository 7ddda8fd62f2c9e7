use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use std::sync::Arc;

use super::auth::fetch_profile;
use super::require_field;
use crate::db::{self, timestamp};
use crate::error::{is_unique_violation, ApiError, ApiResult};
use crate::models::{AuthUser, FriendRequest, UpdateProfileRequest, UserSummary};
use crate::AppState;
use messenger_shared::validation::{validate_bio, validate_display_name, validate_username};

/// GET /users/all
pub async fn all_users(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> ApiResult<impl IntoResponse> {
    let users = sqlx::query_as::<_, UserSummary>(
        r#"SELECT id, username, name, avatar FROM "users" WHERE id != ? ORDER BY username ASC"#,
    )
    .bind(&user.id)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(users))
}

/// GET /users/:username
pub async fn check_username(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    Path(username): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let taken = sqlx::query_scalar::<_, i64>(r#"SELECT COUNT(*) FROM "users" WHERE username = ?"#)
        .bind(username.trim())
        .fetch_one(&state.db)
        .await?;

    Ok(Json(serde_json::json!({"available": taken == 0})))
}

/// POST /users/update
pub async fn update_profile(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(body): Json<UpdateProfileRequest>,
) -> ApiResult<impl IntoResponse> {
    let username = body.username.map(|u| u.trim().to_string());
    let name = body.name.map(|n| n.trim().to_string());
    let bio = body.bio.map(|b| b.trim().to_string());

    if let Some(username) = &username {
        validate_username(username).map_err(ApiError::Validation)?;
    }
    if let Some(name) = name.as_deref().filter(|n| !n.is_empty()) {
        validate_display_name(name).map_err(ApiError::Validation)?;
    }
    if let Some(bio) = &bio {
        validate_bio(bio).map_err(ApiError::Validation)?;
    }

    let mut conn = state.db.acquire().await?;
    let current = fetch_profile(&mut conn, &user.id).await?;

    let name = match name {
        Some(n) if n.is_empty() => None,
        Some(n) => Some(n),
        None => current.name,
    };
    let bio = match bio {
        Some(b) if b.is_empty() => None,
        Some(b) => Some(b),
        None => current.bio,
    };

    sqlx::query(
        r#"UPDATE "users" SET username = ?, name = ?, bio = ?, updated_at = ? WHERE id = ?"#,
    )
    .bind(username.unwrap_or(current.username))
    .bind(&name)
    .bind(&bio)
    .bind(timestamp())
    .bind(&user.id)
    .execute(&mut *conn)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            ApiError::conflict("Username already exists")
        } else {
            e.into()
        }
    })?;

    let profile = fetch_profile(&mut conn, &user.id).await?;
    Ok(Json(serde_json::json!({
        "message": "Profile updated successfully",
        "user": profile,
    })))
}

/// POST /users/addFriend
pub async fn add_friend(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(body): Json<FriendRequest>,
) -> ApiResult<impl IntoResponse> {
    let friend_id = require_field(body.friend_id, "Friend ID is required")?;
    if friend_id == user.id {
        return Err(ApiError::validation("You cannot add yourself as a friend"));
    }

    let mut tx = db::begin_write(&state.db).await?;
    let friend = sqlx::query_as::<_, UserSummary>(
        r#"SELECT id, username, name, avatar FROM "users" WHERE id = ?"#,
    )
    .bind(&friend_id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| ApiError::not_found("User not found"))?;

    let now = timestamp();
    for (a, b) in [(&user.id, &friend_id), (&friend_id, &user.id)] {
        sqlx::query(
            r#"INSERT OR IGNORE INTO "friendships" (user_id, friend_id, created_at) VALUES (?, ?, ?)"#,
        )
        .bind(a)
        .bind(b)
        .bind(&now)
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;

    Ok(Json(serde_json::json!({
        "message": "Friend added successfully",
        "friend": friend,
    })))
}

/// POST /users/removeFriend
pub async fn remove_friend(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(body): Json<FriendRequest>,
) -> ApiResult<impl IntoResponse> {
    let friend_id = require_field(body.friend_id, "Friend ID is required")?;

    let mut tx = db::begin_write(&state.db).await?;
    let removed = sqlx::query(
        r#"DELETE FROM "friendships"
           WHERE (user_id = ? AND friend_id = ?) OR (user_id = ? AND friend_id = ?)"#,
    )
    .bind(&user.id)
    .bind(&friend_id)
    .bind(&friend_id)
    .bind(&user.id)
    .execute(&mut *tx)
    .await?;

    if removed.rows_affected() == 0 {
        return Err(ApiError::not_found("Friendship not found"));
    }
    tx.commit().await?;

    Ok(Json(serde_json::json!({"message": "Friend removed successfully"})))
}
