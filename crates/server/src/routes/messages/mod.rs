use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use std::sync::Arc;

use super::require_field;
use crate::chat::messages;
use crate::error::ApiResult;
use crate::models::{
    AuthUser, ConversationRef, DeleteMessageRequest, EditMessageRequest, NewMessage,
    NewMessageRequest,
};
use crate::AppState;

/// GET /messages/:conversationId
pub async fn list_messages(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(conversation_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let mut conn = state.db.acquire().await?;
    let messages = messages::list(&mut conn, &user.id, &conversation_id).await?;
    Ok(Json(messages))
}

/// POST /messages/new
pub async fn create_message(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(body): Json<NewMessageRequest>,
) -> ApiResult<impl IntoResponse> {
    let conversation_id = require_field(body.conversation_id, "Conversation ID is required")?;

    let mut conn = state.db.acquire().await?;
    let message = messages::post(
        &mut conn,
        &user.id,
        &conversation_id,
        NewMessage {
            content: body.content,
            image_url: body.image_url,
            notification: body.notification,
        },
    )
    .await?;

    Ok((StatusCode::CREATED, Json(message)))
}

/// PUT /messages/edit
pub async fn edit_message(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(body): Json<EditMessageRequest>,
) -> ApiResult<impl IntoResponse> {
    let message_id = require_field(body.message_id, "Message ID is required")?;
    let content = body.content.unwrap_or_default();

    let mut conn = state.db.acquire().await?;
    let message = messages::edit(&mut conn, &user.id, &message_id, &content).await?;
    Ok(Json(message))
}

/// DELETE /messages/delete
pub async fn delete_message(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(body): Json<DeleteMessageRequest>,
) -> ApiResult<impl IntoResponse> {
    let message_id = require_field(body.message_id, "Message ID is required")?;

    let mut conn = state.db.acquire().await?;
    messages::delete(&mut conn, &user.id, &message_id).await?;
    Ok(Json(serde_json::json!({"message": "Message deleted successfully"})))
}

/// PUT /messages/read
pub async fn mark_read(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(body): Json<ConversationRef>,
) -> ApiResult<impl IntoResponse> {
    let conversation_id = require_field(body.conversation_id, "Conversation ID is required")?;

    let mut conn = state.db.acquire().await?;
    let marked = messages::mark_read(&mut conn, &user.id, &conversation_id).await?;
    Ok(Json(serde_json::json!({"marked": marked})))
}
