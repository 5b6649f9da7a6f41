//! WebSocket push message DTOs.

use serde::{Deserialize, Serialize};

/// Chat event type
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ChatEventType {
    UserJoined,
    UserLeft,
    Message,
    ConversationStarted,
    ConversationEnded,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessageDto {
    pub id: String,
    pub user_id: String,
    pub username: String,
    pub content: String,
    pub created_at: String,
}

/// Event pushed to room / conversation-event subscribers
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatEventDto {
    pub r#type: ChatEventType,
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<ChatMessageDto>,
    pub timestamp: String,
}
