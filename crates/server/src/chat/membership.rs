use serde::Serialize;
use sqlx::SqliteConnection;

use super::access::{check_membership, require_admin};
use crate::db::timestamp;
use crate::error::{is_unique_violation, ApiError, ApiResult};
use crate::models::{Conversation, Membership, MembershipState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum JoinOutcome {
    Joined,
    Rejoined,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaveOutcome {
    pub membership: Membership,
    /// Member promoted by admin handoff, if the leave triggered one.
    pub promoted: Option<String>,
}

/// Add `user_id` to a group conversation, or reactivate a left membership.
///
/// Rejoining never restores a previous admin flag; `as_admin` alone decides it.
pub async fn join(
    conn: &mut SqliteConnection,
    user_id: &str,
    conversation: &Conversation,
    as_admin: bool,
) -> ApiResult<JoinOutcome> {
    if !conversation.is_group {
        return Err(ApiError::validation(
            "Cannot add participants to a non-group conversation",
        ));
    }

    let now = timestamp();
    match check_membership(conn, user_id, &conversation.id).await? {
        Some(m) if m.is_active() => Err(ApiError::conflict(
            "User is already a participant in this conversation",
        )),
        Some(_) => {
            let result = sqlx::query(
                r#"UPDATE "memberships" SET left_at = NULL, is_admin = ?, joined_at = ?
                   WHERE user_id = ? AND conversation_id = ? AND left_at IS NOT NULL"#,
            )
            .bind(as_admin)
            .bind(&now)
            .bind(user_id)
            .bind(&conversation.id)
            .execute(&mut *conn)
            .await?;

            if result.rows_affected() == 0 {
                return Err(ApiError::conflict(
                    "User is already a participant in this conversation",
                ));
            }
            tracing::info!(user_id, conversation_id = %conversation.id, "member rejoined");
            Ok(JoinOutcome::Rejoined)
        }
        None => {
            insert_membership(conn, user_id, &conversation.id, as_admin, &now)
                .await
                .map_err(|e| {
                    if is_unique_violation(&e) {
                        ApiError::conflict("User is already a participant in this conversation")
                    } else {
                        e.into()
                    }
                })?;
            tracing::info!(user_id, conversation_id = %conversation.id, "member joined");
            Ok(JoinOutcome::Joined)
        }
    }
}

pub(crate) async fn insert_membership(
    conn: &mut SqliteConnection,
    user_id: &str,
    conversation_id: &str,
    is_admin: bool,
    joined_at: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"INSERT INTO "memberships" (user_id, conversation_id, is_admin, joined_at, left_at)
           VALUES (?, ?, ?, ?, NULL)"#,
    )
    .bind(user_id)
    .bind(conversation_id)
    .bind(is_admin)
    .bind(joined_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn leave(
    conn: &mut SqliteConnection,
    user_id: &str,
    conversation: &Conversation,
) -> ApiResult<LeaveOutcome> {
    match check_membership(conn, user_id, &conversation.id).await? {
        None => Err(ApiError::forbidden(super::access::NOT_PARTICIPANT)),
        Some(m) if !m.is_active() => Err(ApiError::conflict(
            "You have already left this conversation",
        )),
        Some(_) => {
            mark_left(conn, user_id, conversation, "You have already left this conversation")
                .await
        }
    }
}

/// Remove `target_user_id` from a group. Only an active admin may do this;
/// removing oneself is allowed and behaves like leaving.
pub async fn remove(
    conn: &mut SqliteConnection,
    acting_user_id: &str,
    target_user_id: &str,
    conversation: &Conversation,
) -> ApiResult<LeaveOutcome> {
    if !conversation.is_group {
        return Err(ApiError::validation(
            "Cannot remove participants from a non-group conversation",
        ));
    }
    require_admin(conn, acting_user_id, &conversation.id).await?;

    match check_membership(conn, target_user_id, &conversation.id).await? {
        None => Err(ApiError::not_found("Participant not found in conversation")),
        Some(m) if !m.is_active() => Err(ApiError::conflict(
            "User has already left the conversation",
        )),
        Some(_) => {
            mark_left(conn, target_user_id, conversation, "User has already left the conversation")
                .await
        }
    }
}

pub async fn promote(
    conn: &mut SqliteConnection,
    acting_user_id: &str,
    target_user_id: &str,
    conversation: &Conversation,
) -> ApiResult<Membership> {
    if !conversation.is_group {
        return Err(ApiError::validation(
            "Cannot promote participants in a non-group conversation",
        ));
    }
    require_admin(conn, acting_user_id, &conversation.id).await?;

    let target = match check_membership(conn, target_user_id, &conversation.id).await? {
        None => return Err(ApiError::not_found("Participant not found in conversation")),
        Some(m) if !m.is_active() => {
            return Err(ApiError::conflict("User has already left the conversation"))
        }
        Some(m) => m,
    };

    if target.is_admin {
        return Ok(target);
    }

    sqlx::query(
        r#"UPDATE "memberships" SET is_admin = 1
           WHERE user_id = ? AND conversation_id = ? AND left_at IS NULL"#,
    )
    .bind(target_user_id)
    .bind(&conversation.id)
    .execute(&mut *conn)
    .await?;

    tracing::info!(
        acting_user_id,
        target_user_id,
        conversation_id = %conversation.id,
        "member promoted"
    );
    Ok(Membership {
        is_admin: true,
        ..target
    })
}

/// Admin-only bulk join. Users already active are skipped; returns who was added.
pub async fn add_participants(
    conn: &mut SqliteConnection,
    acting_user_id: &str,
    conversation: &Conversation,
    user_ids: &[String],
) -> ApiResult<Vec<String>> {
    if !conversation.is_group {
        return Err(ApiError::validation(
            "Cannot add participants to a non-group conversation",
        ));
    }
    require_admin(conn, acting_user_id, &conversation.id).await?;

    let user_ids = super::dedup_ids(user_ids, None);
    if user_ids.is_empty() {
        return Err(ApiError::validation("No users specified to add"));
    }
    if !super::all_users_exist(conn, &user_ids).await? {
        return Err(ApiError::validation("One or more users to add do not exist"));
    }

    let mut added = Vec::new();
    for user_id in &user_ids {
        if let Some(m) = check_membership(conn, user_id, &conversation.id).await? {
            if m.is_active() {
                continue;
            }
        }
        join(conn, user_id, conversation, false).await?;
        added.push(user_id.clone());
    }

    if added.is_empty() {
        return Err(ApiError::conflict(
            "All specified users are already in the conversation",
        ));
    }
    Ok(added)
}

/// Active memberships in join order.
pub async fn active_members(
    conn: &mut SqliteConnection,
    conversation_id: &str,
) -> Result<Vec<Membership>, sqlx::Error> {
    let rows = sqlx::query_as::<_, crate::models::MembershipRow>(
        r#"SELECT user_id, conversation_id, is_admin, joined_at, left_at
           FROM "memberships"
           WHERE conversation_id = ? AND left_at IS NULL
           ORDER BY seq ASC"#,
    )
    .bind(conversation_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows.into_iter().map(Membership::from).collect())
}

async fn mark_left(
    conn: &mut SqliteConnection,
    user_id: &str,
    conversation: &Conversation,
    already_left: &str,
) -> ApiResult<LeaveOutcome> {
    let now = timestamp();
    let result = sqlx::query(
        r#"UPDATE "memberships" SET left_at = ?
           WHERE user_id = ? AND conversation_id = ? AND left_at IS NULL"#,
    )
    .bind(&now)
    .bind(user_id)
    .bind(&conversation.id)
    .execute(&mut *conn)
    .await?;

    // Lost a race with a concurrent leave
    if result.rows_affected() == 0 {
        return Err(ApiError::conflict(already_left));
    }

    let promoted = if conversation.is_group {
        hand_off_admin(conn, &conversation.id).await?
    } else {
        // Frees the pair to start a new direct conversation
        sqlx::query(r#"UPDATE "conversations" SET direct_key = NULL WHERE id = ?"#)
            .bind(&conversation.id)
            .execute(&mut *conn)
            .await?;
        None
    };

    tracing::info!(user_id, conversation_id = %conversation.id, "member left");

    let membership = check_membership(conn, user_id, &conversation.id)
        .await?
        .ok_or_else(|| ApiError::internal("membership vanished after leave"))?;
    debug_assert!(matches!(membership.state, MembershipState::Left { .. }));

    Ok(LeaveOutcome {
        membership,
        promoted,
    })
}

/// Promote the earliest-joined active member when no active admin remains.
async fn hand_off_admin(
    conn: &mut SqliteConnection,
    conversation_id: &str,
) -> Result<Option<String>, sqlx::Error> {
    let active = active_members(conn, conversation_id).await?;
    if active.is_empty() || active.iter().any(|m| m.is_admin) {
        return Ok(None);
    }

    let heir = &active[0].user_id;
    sqlx::query(
        r#"UPDATE "memberships" SET is_admin = 1
           WHERE user_id = ? AND conversation_id = ? AND left_at IS NULL"#,
    )
    .bind(heir)
    .bind(conversation_id)
    .execute(&mut *conn)
    .await?;

    tracing::info!(user_id = %heir, conversation_id, "admin handed off");
    Ok(Some(heir.clone()))
}
