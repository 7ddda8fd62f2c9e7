use sqlx::SqliteConnection;

use super::access::{require_conversation, require_history, require_participant};
use crate::db::timestamp;
use crate::error::{ApiError, ApiResult};
use crate::models::{Message, MessageRow, NewMessage};
use messenger_shared::validation::{validate_message_content, validate_message_payload};

const MESSAGE_SELECT: &str = r#"SELECT m.id, m.conversation_id, m.sender_id, m.content, m.image_url,
          m.notification, m.is_read, m.read_at, m.created_at,
          u.username AS sender_username, u.name AS sender_name, u.avatar AS sender_avatar
   FROM "messages" m
   INNER JOIN "users" u ON u.id = m.sender_id"#;

fn non_empty(value: Option<String>) -> Option<String> {
    value.and_then(|v| {
        let trimmed = v.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

pub async fn find(
    conn: &mut SqliteConnection,
    message_id: &str,
) -> Result<Option<Message>, sqlx::Error> {
    let sql = format!("{} WHERE m.id = ?", MESSAGE_SELECT);
    let row = sqlx::query_as::<_, MessageRow>(&sql)
        .bind(message_id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(row.map(Message::from))
}

/// Append a message from an active member and bump the conversation's
/// activity timestamp.
pub async fn post(
    conn: &mut SqliteConnection,
    sender_id: &str,
    conversation_id: &str,
    message: NewMessage,
) -> ApiResult<Message> {
    let content = non_empty(message.content);
    let image_url = non_empty(message.image_url);
    validate_message_payload(content.as_deref(), image_url.as_deref())
        .map_err(ApiError::Validation)?;

    require_conversation(conn, conversation_id).await?;
    require_participant(conn, sender_id, conversation_id).await?;

    let id = uuid::Uuid::new_v4().to_string();
    let now = timestamp();

    sqlx::query(
        r#"INSERT INTO "messages" (id, conversation_id, sender_id, content, image_url, notification, is_read, read_at, created_at)
           VALUES (?, ?, ?, ?, ?, ?, 0, NULL, ?)"#,
    )
    .bind(&id)
    .bind(conversation_id)
    .bind(sender_id)
    .bind(&content)
    .bind(&image_url)
    .bind(message.notification)
    .bind(&now)
    .execute(&mut *conn)
    .await?;

    // max() keeps the sort key monotonic when posts finish out of order
    sqlx::query(r#"UPDATE "conversations" SET updated_at = max(updated_at, ?) WHERE id = ?"#)
        .bind(&now)
        .bind(conversation_id)
        .execute(&mut *conn)
        .await?;

    find(conn, &id)
        .await?
        .ok_or_else(|| ApiError::internal("message missing after insert"))
}

async fn require_own_message(
    conn: &mut SqliteConnection,
    acting_user_id: &str,
    message_id: &str,
    denied: &str,
) -> ApiResult<Message> {
    let message = find(conn, message_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Message not found"))?;
    if message.sender_id != acting_user_id {
        return Err(ApiError::forbidden(denied));
    }
    Ok(message)
}

pub async fn edit(
    conn: &mut SqliteConnection,
    acting_user_id: &str,
    message_id: &str,
    new_content: &str,
) -> ApiResult<Message> {
    validate_message_content(new_content).map_err(ApiError::Validation)?;
    let mut message = require_own_message(
        conn,
        acting_user_id,
        message_id,
        "You can only edit your own messages",
    )
    .await?;

    let content = new_content.trim().to_string();
    sqlx::query(r#"UPDATE "messages" SET content = ? WHERE id = ?"#)
        .bind(&content)
        .bind(message_id)
        .execute(&mut *conn)
        .await?;

    message.content = Some(content);
    Ok(message)
}

pub async fn delete(
    conn: &mut SqliteConnection,
    acting_user_id: &str,
    message_id: &str,
) -> ApiResult<()> {
    require_own_message(
        conn,
        acting_user_id,
        message_id,
        "You can only delete your own messages",
    )
    .await?;

    sqlx::query(r#"DELETE FROM "messages" WHERE id = ?"#)
        .bind(message_id)
        .execute(&mut *conn)
        .await?;

    tracing::debug!(message_id, "message deleted");
    Ok(())
}

/// Full history, oldest first. Left members keep read access.
pub async fn list(
    conn: &mut SqliteConnection,
    user_id: &str,
    conversation_id: &str,
) -> ApiResult<Vec<Message>> {
    require_conversation(conn, conversation_id).await?;
    require_history(conn, user_id, conversation_id).await?;

    let sql = format!(
        "{} WHERE m.conversation_id = ? ORDER BY m.created_at ASC, m.seq ASC",
        MESSAGE_SELECT
    );
    let rows = sqlx::query_as::<_, MessageRow>(&sql)
        .bind(conversation_id)
        .fetch_all(&mut *conn)
        .await?;

    Ok(rows.into_iter().map(Message::from).collect())
}

/// The most recent `limit` messages, returned oldest first.
pub async fn recent(
    conn: &mut SqliteConnection,
    conversation_id: &str,
    limit: i64,
) -> Result<Vec<Message>, sqlx::Error> {
    let sql = format!(
        "{} WHERE m.conversation_id = ? ORDER BY m.created_at DESC, m.seq DESC LIMIT ?",
        MESSAGE_SELECT
    );
    let rows = sqlx::query_as::<_, MessageRow>(&sql)
        .bind(conversation_id)
        .bind(limit)
        .fetch_all(&mut *conn)
        .await?;

    let mut messages: Vec<Message> = rows.into_iter().map(Message::from).collect();
    messages.reverse();
    Ok(messages)
}

pub async fn latest(
    conn: &mut SqliteConnection,
    conversation_id: &str,
) -> Result<Option<Message>, sqlx::Error> {
    Ok(recent(conn, conversation_id, 1).await?.pop())
}

/// Mark every unread message from other senders as read. Returns how many changed.
pub async fn mark_read(
    conn: &mut SqliteConnection,
    user_id: &str,
    conversation_id: &str,
) -> ApiResult<u64> {
    require_conversation(conn, conversation_id).await?;
    require_participant(conn, user_id, conversation_id).await?;

    let result = sqlx::query(
        r#"UPDATE "messages" SET is_read = 1, read_at = ?
           WHERE conversation_id = ? AND sender_id != ? AND is_read = 0"#,
    )
    .bind(timestamp())
    .bind(conversation_id)
    .bind(user_id)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected())
}
