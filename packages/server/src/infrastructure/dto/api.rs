//! HTTP API request / response DTOs (client-facing schema).

use serde::{Deserialize, Serialize};

/// Persona used when the client does not choose one
pub const DEFAULT_CHARACTER: &str = "friend";

fn default_character() -> String {
    DEFAULT_CHARACTER.to_string()
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StartConversationRequestDto {
    /// Filled from the caller identity when empty
    #[serde(default)]
    pub user_id: String,
    pub username: String,
    pub language: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StartConversationResponseDto {
    pub session_id: String,
    pub success: bool,
    #[serde(default)]
    pub error_message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EndConversationRequestDto {
    pub session_id: String,
    #[serde(default)]
    pub user_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EndConversationResponseDto {
    pub success: bool,
    #[serde(default)]
    pub error_message: String,
}

/// Conversation message: exactly one of `text_message` / `audio_data` (base64)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConversationRequestDto {
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub username: String,
    pub language: String,
    #[serde(default = "default_character")]
    pub character: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_data: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConversationResponseDto {
    pub response_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_data: Option<String>,
    pub language: String,
    #[serde(default = "default_true")]
    pub is_final: bool,
    pub timestamp: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct JoinRoomRequestDto {
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub username: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct JoinRoomResponseDto {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PostMessageRequestDto {
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub username: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PostMessageResponseDto {
    pub success: bool,
    pub message_id: String,
}

/// Room summary for the room list endpoint
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoomSummaryDto {
    pub id: String,
    pub subscribers: Vec<String>,
    pub created_at: String,
    pub last_active_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorResponseDto {
    pub error: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HealthResponseDto {
    /// `ok` or `degraded`
    pub status: String,
    pub active_sessions: usize,
    pub rooms: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HistoryMessageDto {
    /// `user` or `assistant`
    pub role: String,
    pub content: String,
    pub created_at: String,
}

/// One conversation in the caller's history
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConversationHistoryDto {
    pub session_id: String,
    pub started_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<String>,
    pub messages: Vec<HistoryMessageDto>,
}
