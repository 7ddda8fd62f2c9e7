use sqlx::SqliteConnection;

use crate::error::{ApiError, ApiResult};
use crate::models::{Conversation, Membership, MembershipRow};

pub const NOT_PARTICIPANT: &str = "You are not a participant in this conversation";
pub const NOT_ADMIN: &str = "Only admins can perform this action";

pub async fn find_conversation(
    conn: &mut SqliteConnection,
    conversation_id: &str,
) -> Result<Option<Conversation>, sqlx::Error> {
    sqlx::query_as::<_, Conversation>(
        r#"SELECT id, name, is_group, group_avatar, created_at, updated_at
           FROM "conversations" WHERE id = ?"#,
    )
    .bind(conversation_id)
    .fetch_optional(&mut *conn)
    .await
}

pub async fn require_conversation(
    conn: &mut SqliteConnection,
    conversation_id: &str,
) -> ApiResult<Conversation> {
    find_conversation(conn, conversation_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Conversation not found"))
}

/// The caller's membership row, active or left. `None` means never joined.
pub async fn check_membership(
    conn: &mut SqliteConnection,
    user_id: &str,
    conversation_id: &str,
) -> Result<Option<Membership>, sqlx::Error> {
    let row = sqlx::query_as::<_, MembershipRow>(
        r#"SELECT user_id, conversation_id, is_admin, joined_at, left_at
           FROM "memberships" WHERE user_id = ? AND conversation_id = ?"#,
    )
    .bind(user_id)
    .bind(conversation_id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(row.map(Membership::from))
}

pub async fn require_participant(
    conn: &mut SqliteConnection,
    user_id: &str,
    conversation_id: &str,
) -> ApiResult<Membership> {
    match check_membership(conn, user_id, conversation_id).await? {
        Some(m) if m.is_active() => Ok(m),
        _ => Err(ApiError::forbidden(NOT_PARTICIPANT)),
    }
}

pub async fn require_admin(
    conn: &mut SqliteConnection,
    user_id: &str,
    conversation_id: &str,
) -> ApiResult<Membership> {
    let membership = require_participant(conn, user_id, conversation_id).await?;
    if !membership.has_authority() {
        return Err(ApiError::forbidden(NOT_ADMIN));
    }
    Ok(membership)
}

/// Read access to history survives leaving: any membership row qualifies.
pub async fn require_history(
    conn: &mut SqliteConnection,
    user_id: &str,
    conversation_id: &str,
) -> ApiResult<Membership> {
    check_membership(conn, user_id, conversation_id)
        .await?
        .ok_or_else(|| ApiError::forbidden(NOT_PARTICIPANT))
}
