pub mod auth;
pub mod conversations;
pub mod files;
pub mod messages;
pub mod users;

use axum::{
    extract::{DefaultBodyLimit, State},
    routing::{delete, get, post, put},
    Json, Router,
};
use std::sync::Arc;

use crate::error::ApiResult;
use crate::AppState;

// Multipart framing on top of the file itself
const MULTIPART_OVERHEAD: usize = 64 * 1024;

pub fn build_router(state: Arc<AppState>) -> Router {
    let auth_routes = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/guest", post(auth::guest))
        .route("/auth/logout", post(auth::logout))
        .route("/auth/me", get(auth::me));

    let upload_limit = state.config.max_upload_bytes as usize + MULTIPART_OVERHEAD;
    let file_routes = Router::new()
        .route("/files/avatar", post(files::upload_avatar))
        .route("/files/image", post(files::upload_image))
        .route("/files/groupAvatar", post(files::upload_group_avatar))
        .layer(DefaultBodyLimit::max(upload_limit));

    Router::new()
        .route("/health", get(health))
        // Conversations
        .route("/conv", get(conversations::list_conversations))
        .route("/conv/new", post(conversations::create_conversation))
        .route("/conv/leave", post(conversations::leave_conversation))
        .route("/conv/addParticipants", put(conversations::add_participants))
        .route("/conv/remove", post(conversations::remove_participant))
        .route("/conv/editName", put(conversations::edit_name))
        .route("/conv/promote", put(conversations::promote_participant))
        .route("/conv/{id}", get(conversations::get_conversation))
        // Messages
        .route("/messages/new", post(messages::create_message))
        .route("/messages/edit", put(messages::edit_message))
        .route("/messages/delete", delete(messages::delete_message))
        .route("/messages/read", put(messages::mark_read))
        .route("/messages/{conversationId}", get(messages::list_messages))
        // Users
        .route("/users/all", get(users::all_users))
        .route("/users/update", post(users::update_profile))
        .route("/users/addFriend", post(users::add_friend))
        .route("/users/removeFriend", post(users::remove_friend))
        .route("/users/{username}", get(users::check_username))
        // Blobs written by the local backend
        .route("/uploads/{*key}", get(files::serve_upload))
        .merge(auth_routes)
        .merge(file_routes)
        .with_state(state)
}

/// Unwrap an optional body field, treating blank strings as missing.
pub(crate) fn require_field(value: Option<String>, message: &str) -> ApiResult<String> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v.trim().to_string()),
        _ => Err(crate::error::ApiError::validation(message)),
    }
}

/// GET /health
async fn health(State(state): State<Arc<AppState>>) -> ApiResult<Json<serde_json::Value>> {
    sqlx::query("SELECT 1").execute(&state.db).await?;
    Ok(Json(serde_json::json!({"status": "ok"})))
}
