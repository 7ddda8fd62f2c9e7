use sqlx::SqliteConnection;

use super::access::{require_admin, require_conversation, require_participant};
use super::membership::{self, insert_membership};
use crate::blob::generated_avatar_url;
use crate::db::timestamp;
use crate::error::{is_unique_violation, ApiError, ApiResult};
use crate::models::{
    Conversation, ConversationDetail, ConversationSummary, Participant, ParticipantRow,
};
use messenger_shared::constants::{
    CONVERSATION_MESSAGE_WINDOW, CONVERSATION_PAGE_SIZE, GLOBAL_CONVERSATION_NAME,
    MIN_GROUP_PARTICIPANTS,
};
use messenger_shared::validation::validate_group_name;

const CONVERSATION_COLUMNS: &str =
    "c.id, c.name, c.is_group, c.group_avatar, c.created_at, c.updated_at";

/// Canonical key for a pair of users, independent of argument order.
pub fn direct_key(a: &str, b: &str) -> String {
    if a <= b {
        format!("{}:{}", a, b)
    } else {
        format!("{}:{}", b, a)
    }
}

async fn user_exists(conn: &mut SqliteConnection, user_id: &str) -> Result<bool, sqlx::Error> {
    let count = sqlx::query_scalar::<_, i64>(r#"SELECT COUNT(*) FROM "users" WHERE id = ?"#)
        .bind(user_id)
        .fetch_one(&mut *conn)
        .await?;
    Ok(count > 0)
}

async fn find_direct(
    conn: &mut SqliteConnection,
    key: &str,
) -> Result<Option<String>, sqlx::Error> {
    sqlx::query_scalar::<_, String>(r#"SELECT id FROM "conversations" WHERE direct_key = ?"#)
        .bind(key)
        .fetch_optional(&mut *conn)
        .await
}

/// Start a direct conversation. A live one between the same pair is never
/// duplicated; the caller is pointed at it instead.
pub async fn create_direct(
    conn: &mut SqliteConnection,
    user_id: &str,
    other_user_id: &str,
) -> ApiResult<Conversation> {
    if user_id == other_user_id {
        return Err(ApiError::validation(
            "You cannot start a conversation with yourself",
        ));
    }
    if !user_exists(conn, other_user_id).await? {
        return Err(ApiError::not_found("User not found"));
    }

    let key = direct_key(user_id, other_user_id);
    if let Some(conversation_id) = find_direct(conn, &key).await? {
        tracing::debug!(%conversation_id, "direct conversation already exists");
        return Err(ApiError::DirectExists { conversation_id });
    }

    let id = uuid::Uuid::new_v4().to_string();
    let now = timestamp();

    let inserted = sqlx::query(
        r#"INSERT INTO "conversations" (id, name, is_group, group_avatar, direct_key, created_at, updated_at)
           VALUES (?, NULL, 0, NULL, ?, ?, ?)"#,
    )
    .bind(&id)
    .bind(&key)
    .bind(&now)
    .bind(&now)
    .execute(&mut *conn)
    .await;

    if let Err(e) = inserted {
        if is_unique_violation(&e) {
            // A concurrent creator won the race for this pair
            return match find_direct(conn, &key).await? {
                Some(conversation_id) => Err(ApiError::DirectExists { conversation_id }),
                None => Err(ApiError::conflict("Conversation could not be created")),
            };
        }
        return Err(e.into());
    }

    insert_membership(conn, user_id, &id, false, &now).await?;
    insert_membership(conn, other_user_id, &id, false, &now).await?;

    tracing::info!(conversation_id = %id, "direct conversation created");
    require_conversation(conn, &id).await
}

/// Create a group with the creator as its admin. `avatar_base_url`, when set,
/// gives the group a generated avatar seeded by its id.
pub async fn create_group(
    conn: &mut SqliteConnection,
    creator_id: &str,
    name: &str,
    member_ids: &[String],
    avatar_base_url: Option<&str>,
) -> ApiResult<Conversation> {
    validate_group_name(name).map_err(ApiError::Validation)?;

    let members = super::dedup_ids(member_ids, Some(creator_id));
    if members.len() < MIN_GROUP_PARTICIPANTS {
        return Err(ApiError::validation(
            "Group chats require at least 2 participants",
        ));
    }
    if !super::all_users_exist(conn, &members).await? {
        return Err(ApiError::validation("One or more participants do not exist"));
    }

    let id = uuid::Uuid::new_v4().to_string();
    let now = timestamp();
    let group_avatar = avatar_base_url.map(|base| generated_avatar_url(base, "shapes", &id));

    sqlx::query(
        r#"INSERT INTO "conversations" (id, name, is_group, group_avatar, direct_key, created_at, updated_at)
           VALUES (?, ?, 1, ?, NULL, ?, ?)"#,
    )
    .bind(&id)
    .bind(name.trim())
    .bind(&group_avatar)
    .bind(&now)
    .bind(&now)
    .execute(&mut *conn)
    .await?;

    insert_membership(conn, creator_id, &id, true, &now).await?;
    for member_id in &members {
        insert_membership(conn, member_id, &id, false, &now).await?;
    }

    tracing::info!(conversation_id = %id, members = members.len() + 1, "group created");
    require_conversation(conn, &id).await
}

pub async fn rename(
    conn: &mut SqliteConnection,
    acting_user_id: &str,
    conversation_id: &str,
    new_name: &str,
) -> ApiResult<Conversation> {
    validate_group_name(new_name).map_err(ApiError::Validation)?;
    let conversation = require_conversation(conn, conversation_id).await?;
    require_admin(conn, acting_user_id, conversation_id).await?;
    if !conversation.is_group {
        return Err(ApiError::validation("Only group conversations can be renamed"));
    }

    sqlx::query(r#"UPDATE "conversations" SET name = ? WHERE id = ?"#)
        .bind(new_name.trim())
        .bind(conversation_id)
        .execute(&mut *conn)
        .await?;

    Ok(Conversation {
        name: Some(new_name.trim().to_string()),
        ..conversation
    })
}

pub async fn set_group_avatar(
    conn: &mut SqliteConnection,
    acting_user_id: &str,
    conversation_id: &str,
    url: &str,
) -> ApiResult<Conversation> {
    let conversation = require_conversation(conn, conversation_id).await?;
    require_admin(conn, acting_user_id, conversation_id).await?;
    if !conversation.is_group {
        return Err(ApiError::validation(
            "Only group conversations have an avatar",
        ));
    }

    sqlx::query(r#"UPDATE "conversations" SET group_avatar = ? WHERE id = ?"#)
        .bind(url)
        .bind(conversation_id)
        .execute(&mut *conn)
        .await?;

    Ok(Conversation {
        group_avatar: Some(url.to_string()),
        ..conversation
    })
}

/// Participants in join order, with or without those who left.
pub async fn participants(
    conn: &mut SqliteConnection,
    conversation_id: &str,
    active_only: bool,
) -> Result<Vec<Participant>, sqlx::Error> {
    let sql = format!(
        r#"SELECT m.user_id, u.username, u.name, u.avatar, m.is_admin, m.joined_at, m.left_at
           FROM "memberships" m
           INNER JOIN "users" u ON u.id = m.user_id
           WHERE m.conversation_id = ?{}
           ORDER BY m.seq ASC"#,
        if active_only { " AND m.left_at IS NULL" } else { "" }
    );

    let rows = sqlx::query_as::<_, ParticipantRow>(&sql)
        .bind(conversation_id)
        .fetch_all(&mut *conn)
        .await?;

    Ok(rows.into_iter().map(Participant::from).collect())
}

/// List view of one conversation: active participants and the latest message.
pub async fn summarize(
    conn: &mut SqliteConnection,
    conversation: Conversation,
) -> Result<ConversationSummary, sqlx::Error> {
    let participants = participants(conn, &conversation.id, true).await?;
    let last_message = super::messages::latest(conn, &conversation.id).await?;
    Ok(ConversationSummary {
        conversation,
        participants,
        last_message,
    })
}

pub async fn fetch_for_user(
    conn: &mut SqliteConnection,
    user_id: &str,
) -> ApiResult<Vec<ConversationSummary>> {
    let sql = format!(
        r#"SELECT {}
           FROM "conversations" c
           INNER JOIN "memberships" m ON m.conversation_id = c.id
           WHERE m.user_id = ? AND m.left_at IS NULL
           ORDER BY c.updated_at DESC, c.seq DESC
           LIMIT ?"#,
        CONVERSATION_COLUMNS
    );

    let conversations = sqlx::query_as::<_, Conversation>(&sql)
        .bind(user_id)
        .bind(CONVERSATION_PAGE_SIZE)
        .fetch_all(&mut *conn)
        .await?;

    let mut result = Vec::with_capacity(conversations.len());
    for conversation in conversations {
        result.push(summarize(conn, conversation).await?);
    }
    Ok(result)
}

pub async fn fetch_one(
    conn: &mut SqliteConnection,
    user_id: &str,
    conversation_id: &str,
) -> ApiResult<ConversationDetail> {
    let conversation = require_conversation(conn, conversation_id).await?;
    require_participant(conn, user_id, conversation_id).await?;

    let participants = participants(conn, conversation_id, false).await?;
    let messages =
        super::messages::recent(conn, conversation_id, CONVERSATION_MESSAGE_WINDOW).await?;

    Ok(ConversationDetail {
        conversation,
        participants,
        messages,
    })
}

/// Create the shared group every user joins at registration, if missing.
pub async fn ensure_global_conversation(
    conn: &mut SqliteConnection,
    conversation_id: &str,
) -> Result<(), sqlx::Error> {
    let now = timestamp();
    let result = sqlx::query(
        r#"INSERT OR IGNORE INTO "conversations" (id, name, is_group, group_avatar, direct_key, created_at, updated_at)
           VALUES (?, ?, 1, NULL, NULL, ?, ?)"#,
    )
    .bind(conversation_id)
    .bind(GLOBAL_CONVERSATION_NAME)
    .bind(&now)
    .bind(&now)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() > 0 {
        tracing::info!(conversation_id, "global conversation created");
    }
    Ok(())
}

/// Join the global conversation. Whoever joins while it has no active admin
/// becomes one, so the group is never headless.
pub async fn join_global_conversation(
    conn: &mut SqliteConnection,
    user_id: &str,
    conversation_id: &str,
) -> ApiResult<()> {
    let Some(conversation) = super::access::find_conversation(conn, conversation_id).await? else {
        tracing::warn!(conversation_id, "global conversation missing, skipping join");
        return Ok(());
    };

    let has_admin = membership::active_members(conn, conversation_id)
        .await?
        .iter()
        .any(|m| m.is_admin);

    membership::join(conn, user_id, &conversation, !has_admin).await?;
    Ok(())
}
