//! Inference service DTOs (upstream schema).
//!
//! Unary calls use JSON over HTTP; the audio stream uses JSON control frames
//! plus raw binary audio frames over WebSocket.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UpstreamStartRequest {
    pub user_id: String,
    pub username: String,
    pub language: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UpstreamStartResponse {
    #[serde(default)]
    pub session_id: String,
    pub success: bool,
    #[serde(default)]
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UpstreamEndRequest {
    pub session_id: String,
    pub user_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UpstreamEndResponse {
    pub success: bool,
    #[serde(default)]
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UpstreamMessageRequest {
    pub user_id: String,
    pub username: String,
    pub language: String,
    pub character: String,
    pub plan: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_message: Option<String>,
    /// base64
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_data: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UpstreamMessageResponse {
    pub response_id: String,
    #[serde(default)]
    pub text_message: Option<String>,
    /// base64
    #[serde(default)]
    pub audio_data: Option<String>,
    pub language: String,
    /// ISO 8601 / RFC 3339
    #[serde(default)]
    pub timestamp: String,
    #[serde(default = "default_true")]
    pub is_final: bool,
}

fn default_true() -> bool {
    true
}

/// Control frames sent as JSON text on the upstream audio stream
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UpstreamControlFrame {
    Setup {
        user_id: String,
        username: String,
        language: String,
        character: String,
        plan: String,
    },
    EndOfInput {
        end_of_input: bool,
    },
}
