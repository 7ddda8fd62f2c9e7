mod members;

pub use members::*;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use std::sync::Arc;

use super::require_field;
use crate::chat::directory;
use crate::db;
use crate::error::{ApiError, ApiResult};
use crate::models::{AuthUser, CreateConversationRequest, EditNameRequest};
use crate::AppState;

/// GET /conv
pub async fn list_conversations(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> ApiResult<impl IntoResponse> {
    let mut conn = state.db.acquire().await?;
    let conversations = directory::fetch_for_user(&mut conn, &user.id).await?;
    Ok(Json(conversations))
}

/// GET /conv/:id
pub async fn get_conversation(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(conversation_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let mut conn = state.db.acquire().await?;
    let detail = directory::fetch_one(&mut conn, &user.id, &conversation_id).await?;
    Ok(Json(detail))
}

/// POST /conv/new
pub async fn create_conversation(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(body): Json<CreateConversationRequest>,
) -> ApiResult<impl IntoResponse> {
    let participants = body.participants.unwrap_or_default();

    let mut tx = db::begin_write(&state.db).await?;
    let conversation = if body.is_group {
        let name = body.name.unwrap_or_default();
        directory::create_group(
            &mut tx,
            &user.id,
            &name,
            &participants,
            Some(&state.config.avatar_base_url),
        )
        .await?
    } else {
        let others = crate::chat::dedup_ids(&participants, Some(&user.id));
        let other = match others.as_slice() {
            [other] => other.clone(),
            [] => {
                return Err(ApiError::validation(
                    "A direct conversation needs exactly one other participant",
                ))
            }
            _ => {
                return Err(ApiError::validation(
                    "Direct conversations can only have one other participant",
                ))
            }
        };
        directory::create_direct(&mut tx, &user.id, &other).await?
    };
    let summary = directory::summarize(&mut tx, conversation).await?;
    tx.commit().await?;

    Ok((StatusCode::CREATED, Json(summary)))
}

/// PUT /conv/editName
pub async fn edit_name(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(body): Json<EditNameRequest>,
) -> ApiResult<impl IntoResponse> {
    let conversation_id = require_field(body.conversation_id, "Conversation ID is required")?;
    let group_name = body.group_name.unwrap_or_default();

    let mut tx = db::begin_write(&state.db).await?;
    let conversation = directory::rename(&mut tx, &user.id, &conversation_id, &group_name).await?;
    let summary = directory::summarize(&mut tx, conversation).await?;
    tx.commit().await?;

    tracing::info!(conversation_id = %summary.conversation.id, "conversation renamed");
    Ok(Json(summary))
}
