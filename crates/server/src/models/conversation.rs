use serde::{Deserialize, Serialize};

use super::Message;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: String,
    pub name: Option<String>,
    pub is_group: bool,
    pub group_avatar: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct MembershipRow {
    pub user_id: String,
    pub conversation_id: String,
    pub is_admin: bool,
    pub joined_at: String,
    pub left_at: Option<String>,
}

/// Soft-leave marker. A left membership keeps its row (and its admin flag as
/// history) so the user retains read access to earlier messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum MembershipState {
    Active,
    Left {
        #[serde(rename = "leftAt")]
        left_at: String,
    },
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Membership {
    pub user_id: String,
    pub conversation_id: String,
    pub is_admin: bool,
    pub joined_at: String,
    #[serde(flatten)]
    pub state: MembershipState,
}

impl Membership {
    pub fn is_active(&self) -> bool {
        self.state == MembershipState::Active
    }

    /// Admin flag only counts while the membership is active.
    pub fn has_authority(&self) -> bool {
        self.is_active() && self.is_admin
    }
}

impl From<MembershipRow> for Membership {
    fn from(row: MembershipRow) -> Self {
        let state = match row.left_at {
            Some(left_at) => MembershipState::Left { left_at },
            None => MembershipState::Active,
        };
        Self {
            user_id: row.user_id,
            conversation_id: row.conversation_id,
            is_admin: row.is_admin,
            joined_at: row.joined_at,
            state,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
pub struct ParticipantRow {
    pub user_id: String,
    pub username: String,
    pub name: Option<String>,
    pub avatar: Option<String>,
    pub is_admin: bool,
    pub joined_at: String,
    pub left_at: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub user_id: String,
    pub username: String,
    pub name: Option<String>,
    pub avatar: Option<String>,
    pub is_admin: bool,
    pub active: bool,
    pub joined_at: String,
    pub left_at: Option<String>,
}

impl From<ParticipantRow> for Participant {
    fn from(row: ParticipantRow) -> Self {
        Self {
            active: row.left_at.is_none(),
            user_id: row.user_id,
            username: row.username,
            name: row.name,
            avatar: row.avatar,
            is_admin: row.is_admin,
            joined_at: row.joined_at,
            left_at: row.left_at,
        }
    }
}

/// Conversation list entry: active participants plus the latest message.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSummary {
    #[serde(flatten)]
    pub conversation: Conversation,
    pub participants: Vec<Participant>,
    pub last_message: Option<Message>,
}

/// Single conversation view: every participant ever, recent messages oldest first.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationDetail {
    #[serde(flatten)]
    pub conversation: Conversation,
    pub participants: Vec<Participant>,
    pub messages: Vec<Message>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateConversationRequest {
    pub name: Option<String>,
    #[serde(default)]
    pub is_group: bool,
    pub participants: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationRef {
    pub conversation_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddParticipantsRequest {
    pub conversation_id: Option<String>,
    pub users_to_add: Option<Vec<String>>,
    pub user_to_add: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveParticipantRequest {
    pub conversation_id: Option<String>,
    pub part_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditNameRequest {
    pub conversation_id: Option<String>,
    pub group_name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromoteRequest {
    pub conversation_id: Option<String>,
    pub user_id: Option<String>,
}
