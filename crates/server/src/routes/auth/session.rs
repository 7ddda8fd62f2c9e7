use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use std::sync::Arc;

use super::{create_session, fetch_profile, session_cookie, verify_password};
use crate::error::{ApiError, ApiResult};
use crate::models::{AuthResponse, AuthUser, LoginRequest, ProfileWithFriends, UserSummary};
use crate::AppState;
use messenger_shared::constants::GUEST_USERNAME;

/// POST /auth/login
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(body): Json<LoginRequest>,
) -> ApiResult<impl IntoResponse> {
    let identifier = body.email.trim().to_string();
    if identifier.is_empty() || body.password.trim().is_empty() {
        return Err(ApiError::validation(
            "Email/Username and password are required",
        ));
    }

    // The identifier may be an email or a username
    let user = sqlx::query_as::<_, (String, String)>(
        r#"SELECT id, password_hash FROM "users" WHERE email = ? OR username = ? LIMIT 1"#,
    )
    .bind(identifier.to_lowercase())
    .bind(&identifier)
    .fetch_optional(&state.db)
    .await?;

    let (user_id, stored_hash) = match user {
        Some(u) => u,
        None => return Err(ApiError::Unauthenticated("Invalid credentials".into())),
    };

    if !verify_password(body.password, stored_hash).await? {
        tracing::warn!(%user_id, "failed login attempt");
        return Err(ApiError::Unauthenticated("Invalid credentials".into()));
    }

    sign_in(&state, &user_id).await
}

/// POST /auth/guest
pub async fn guest(State(state): State<Arc<AppState>>) -> ApiResult<impl IntoResponse> {
    let user_id = sqlx::query_scalar::<_, String>(r#"SELECT id FROM "users" WHERE username = ?"#)
        .bind(GUEST_USERNAME)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| ApiError::Unauthenticated("Guest not found".into()))?;

    sign_in(&state, &user_id).await
}

async fn sign_in(state: &AppState, user_id: &str) -> ApiResult<impl IntoResponse> {
    let mut conn = state.db.acquire().await?;
    let token = create_session(&mut conn, user_id, state.config.session_ttl_days).await?;
    let user = fetch_profile(&mut conn, user_id).await?;

    tracing::info!(%user_id, "user signed in");

    let headers = session_cookie(&token, state.config.session_ttl_days)?;
    Ok((
        headers,
        Json(AuthResponse {
            message: Some("Login successful".into()),
            token,
            user,
        }),
    ))
}

/// POST /auth/logout
pub async fn logout(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> ApiResult<impl IntoResponse> {
    sqlx::query(r#"DELETE FROM "sessions" WHERE token = ?"#)
        .bind(&user.token)
        .execute(&state.db)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

/// GET /auth/me
pub async fn me(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> ApiResult<impl IntoResponse> {
    let mut conn = state.db.acquire().await?;
    let profile = fetch_profile(&mut conn, &user.id).await?;

    let friends = sqlx::query_as::<_, UserSummary>(
        r#"SELECT u.id, u.username, u.name, u.avatar
           FROM "friendships" f
           INNER JOIN "users" u ON u.id = f.friend_id
           WHERE f.user_id = ?
           ORDER BY u.username ASC"#,
    )
    .bind(&user.id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(Json(ProfileWithFriends { profile, friends }))
}
