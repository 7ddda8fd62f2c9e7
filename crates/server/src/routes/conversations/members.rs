use axum::{extract::State, response::IntoResponse, Json};
use std::sync::Arc;

use crate::chat::{access, membership};
use crate::db;
use crate::error::{ApiError, ApiResult};
use crate::models::{
    AddParticipantsRequest, AuthUser, ConversationRef, PromoteRequest, RemoveParticipantRequest,
};
use crate::routes::require_field;
use crate::AppState;

/// POST /conv/leave
pub async fn leave_conversation(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(body): Json<ConversationRef>,
) -> ApiResult<impl IntoResponse> {
    let conversation_id = require_field(body.conversation_id, "Conversation ID is required")?;

    let mut tx = db::begin_write(&state.db).await?;
    let conversation = access::require_conversation(&mut tx, &conversation_id).await?;
    let outcome = membership::leave(&mut tx, &user.id, &conversation).await?;
    tx.commit().await?;

    Ok(Json(serde_json::json!({
        "message": "You have left the conversation",
        "membership": outcome.membership,
        "promoted": outcome.promoted,
    })))
}

/// PUT /conv/addParticipants
pub async fn add_participants(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(body): Json<AddParticipantsRequest>,
) -> ApiResult<impl IntoResponse> {
    let conversation_id = require_field(body.conversation_id, "Conversation ID is required")?;

    let mut users_to_add = body.users_to_add.unwrap_or_default();
    if let Some(single) = body.user_to_add {
        users_to_add.push(single);
    }
    if users_to_add.iter().all(|u| u.trim().is_empty()) {
        return Err(ApiError::validation("No users specified to add"));
    }

    let mut tx = db::begin_write(&state.db).await?;
    let conversation = access::require_conversation(&mut tx, &conversation_id).await?;
    let added =
        membership::add_participants(&mut tx, &user.id, &conversation, &users_to_add).await?;
    tx.commit().await?;

    tracing::info!(%conversation_id, added = added.len(), "participants added");
    Ok(Json(serde_json::json!({
        "message": "Users added successfully",
        "added": added,
    })))
}

/// POST /conv/remove
pub async fn remove_participant(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(body): Json<RemoveParticipantRequest>,
) -> ApiResult<impl IntoResponse> {
    let conversation_id = require_field(body.conversation_id, "Conversation ID is required")?;
    let part_id = require_field(body.part_id, "Participant ID is required")?;

    let mut tx = db::begin_write(&state.db).await?;
    let conversation = access::require_conversation(&mut tx, &conversation_id).await?;
    let outcome = membership::remove(&mut tx, &user.id, &part_id, &conversation).await?;
    tx.commit().await?;

    Ok(Json(serde_json::json!({
        "message": "Participant removed successfully",
        "membership": outcome.membership,
        "promoted": outcome.promoted,
    })))
}

/// PUT /conv/promote
pub async fn promote_participant(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(body): Json<PromoteRequest>,
) -> ApiResult<impl IntoResponse> {
    let conversation_id = require_field(body.conversation_id, "Conversation ID is required")?;
    let target_id = require_field(body.user_id, "User ID is required")?;

    let mut tx = db::begin_write(&state.db).await?;
    let conversation = access::require_conversation(&mut tx, &conversation_id).await?;
    let promoted = membership::promote(&mut tx, &user.id, &target_id, &conversation).await?;
    tx.commit().await?;

    Ok(Json(serde_json::json!({
        "message": "Participant promoted to admin",
        "membership": promoted,
    })))
}
