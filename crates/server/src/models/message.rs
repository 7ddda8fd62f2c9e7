use serde::{Deserialize, Serialize};

use super::UserSummary;

/// Message joined with its sender, as read from the store.
#[derive(Debug, sqlx::FromRow)]
pub struct MessageRow {
    pub id: String,
    pub conversation_id: String,
    pub sender_id: String,
    pub content: Option<String>,
    pub image_url: Option<String>,
    pub notification: bool,
    pub is_read: bool,
    pub read_at: Option<String>,
    pub created_at: String,
    pub sender_username: String,
    pub sender_name: Option<String>,
    pub sender_avatar: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub conversation_id: String,
    pub sender_id: String,
    pub content: Option<String>,
    pub image_url: Option<String>,
    pub notification: bool,
    pub is_read: bool,
    pub read_at: Option<String>,
    pub created_at: String,
    pub sender: UserSummary,
}

impl From<MessageRow> for Message {
    fn from(row: MessageRow) -> Self {
        Self {
            sender: UserSummary {
                id: row.sender_id.clone(),
                username: row.sender_username,
                name: row.sender_name,
                avatar: row.sender_avatar,
            },
            id: row.id,
            conversation_id: row.conversation_id,
            sender_id: row.sender_id,
            content: row.content,
            image_url: row.image_url,
            notification: row.notification,
            is_read: row.is_read,
            read_at: row.read_at,
            created_at: row.created_at,
        }
    }
}

/// Input to the message ledger's `post`.
#[derive(Debug, Clone, Default)]
pub struct NewMessage {
    pub content: Option<String>,
    pub image_url: Option<String>,
    pub notification: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMessageRequest {
    pub conversation_id: Option<String>,
    pub content: Option<String>,
    pub image_url: Option<String>,
    #[serde(default)]
    pub notification: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditMessageRequest {
    pub message_id: Option<String>,
    pub content: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteMessageRequest {
    pub message_id: Option<String>,
}
