//! Conversion logic between DTOs and domain models.
//!
//! The client-facing schema, the domain model and the inference service schema
//! are kept independent; every hop goes through this module.

use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use chrono::{DateTime, Utc};
use hanashi_shared::time::{parse_rfc3339_or, to_rfc3339};
use thiserror::Error;

use crate::domain::{
    ChatEvent, ChatEventPayload, ChatMessage, Conversation, ConversationContent,
    ConversationRequest, ConversationResponse, HistoryMessage, Language, MIN_AUDIO_RESPONSE_BYTES,
    MessageRole, Plan, RoomSummary, SessionId, SetupConfig, UpstreamError, UserId,
    ValueObjectError,
};
use crate::infrastructure::dto::{api, upstream, websocket};

/// Translation failure
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TranslateError {
    /// Client request is malformed (400)
    #[error("invalid request: {0}")]
    InvalidInput(String),

    /// Inference service reply carries no usable content
    #[error("invalid upstream response: {0}")]
    InvalidUpstreamResponse(String),
}

impl From<ValueObjectError> for TranslateError {
    fn from(err: ValueObjectError) -> Self {
        TranslateError::InvalidInput(err.to_string())
    }
}

impl From<TranslateError> for UpstreamError {
    fn from(err: TranslateError) -> Self {
        match err {
            TranslateError::InvalidInput(msg) => UpstreamError::Protocol(msg),
            TranslateError::InvalidUpstreamResponse(msg) => UpstreamError::InvalidResponse(msg),
        }
    }
}

fn decode_audio(encoded: &str) -> Result<Vec<u8>, TranslateError> {
    BASE64
        .decode(encoded)
        .map_err(|e| TranslateError::InvalidInput(format!("audio_data is not valid base64: {}", e)))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// Pick exactly one content from optional text / base64 audio fields
fn request_content(
    text_message: Option<String>,
    audio_data: Option<String>,
) -> Result<ConversationContent, TranslateError> {
    match (non_empty(text_message), non_empty(audio_data)) {
        (Some(text), None) => Ok(ConversationContent::Text(text)),
        (None, Some(audio)) => Ok(ConversationContent::Audio(decode_audio(&audio)?)),
        (Some(_), Some(_)) => Err(TranslateError::InvalidInput(
            "exactly one of text_message or audio_data must be set".to_string(),
        )),
        (None, None) => Err(TranslateError::InvalidInput(
            "either text_message or audio_data is required".to_string(),
        )),
    }
}

fn content_fields(content: &ConversationContent) -> (Option<String>, Option<String>) {
    match content {
        ConversationContent::Text(text) => (Some(text.clone()), None),
        ConversationContent::Audio(bytes) => (None, Some(BASE64.encode(bytes))),
    }
}

fn optional_session_id(value: Option<String>) -> Result<Option<SessionId>, TranslateError> {
    non_empty(value).map(SessionId::new).transpose().map_err(Into::into)
}

// ========================================
// Client API DTO → Domain
// ========================================

impl TryFrom<api::ConversationRequestDto> for ConversationRequest {
    type Error = TranslateError;

    fn try_from(dto: api::ConversationRequestDto) -> Result<Self, Self::Error> {
        let user_id = UserId::new(dto.user_id)?;
        let username = if dto.username.is_empty() {
            user_id.as_str().to_string()
        } else {
            dto.username
        };
        Ok(Self {
            user_id,
            username,
            language: Language::new(dto.language)?,
            character: dto.character,
            session_id: optional_session_id(dto.session_id)?,
            content: request_content(dto.text_message, dto.audio_data)?,
        })
    }
}

// ========================================
// Domain → Upstream DTO
// ========================================

impl From<&ConversationRequest> for upstream::UpstreamMessageRequest {
    fn from(request: &ConversationRequest) -> Self {
        let (text_message, audio_data) = content_fields(&request.content);
        Self {
            user_id: request.user_id.as_str().to_string(),
            username: request.username.clone(),
            language: request.language.as_str().to_string(),
            character: request.character.clone(),
            plan: Plan::default().as_str().to_string(),
            text_message,
            audio_data,
            session_id: request.session_id.as_ref().map(|id| id.as_str().to_string()),
        }
    }
}

impl From<SetupConfig> for upstream::UpstreamControlFrame {
    fn from(config: SetupConfig) -> Self {
        upstream::UpstreamControlFrame::Setup {
            user_id: config.user_id.into_string(),
            username: config.username,
            language: config.language.into_string(),
            character: config.character,
            plan: config.plan.as_str().to_string(),
        }
    }
}

// ========================================
// Upstream DTO → Domain
// ========================================

impl TryFrom<upstream::UpstreamMessageRequest> for ConversationRequest {
    type Error = TranslateError;

    fn try_from(dto: upstream::UpstreamMessageRequest) -> Result<Self, Self::Error> {
        Ok(Self {
            user_id: UserId::new(dto.user_id)?,
            username: dto.username,
            language: Language::new(dto.language)?,
            character: dto.character,
            session_id: optional_session_id(dto.session_id)?,
            content: request_content(dto.text_message, dto.audio_data)?,
        })
    }
}

/// Translate an inference service reply into a domain response.
///
/// Audio wins when it decodes to more than [`MIN_AUDIO_RESPONSE_BYTES`]
/// bytes; otherwise a non-empty text is used. A malformed timestamp is
/// replaced with `now`.
pub fn response_from_upstream(
    dto: upstream::UpstreamMessageResponse,
    now: DateTime<Utc>,
) -> Result<ConversationResponse, TranslateError> {
    let audio = non_empty(dto.audio_data)
        .and_then(|encoded| BASE64.decode(encoded).ok())
        .filter(|bytes| bytes.len() > MIN_AUDIO_RESPONSE_BYTES);

    let content = match (audio, non_empty(dto.text_message)) {
        (Some(bytes), _) => ConversationContent::Audio(bytes),
        (None, Some(text)) => ConversationContent::Text(text),
        (None, None) => {
            return Err(TranslateError::InvalidUpstreamResponse(format!(
                "response {} has neither valid audio nor text",
                dto.response_id
            )));
        }
    };

    let language = Language::new(dto.language)
        .map_err(|e| TranslateError::InvalidUpstreamResponse(e.to_string()))?;

    Ok(ConversationResponse {
        response_id: dto.response_id,
        content,
        language,
        is_final: dto.is_final,
        timestamp: parse_rfc3339_or(&dto.timestamp, now),
    })
}

// ========================================
// Domain → Client API DTO
// ========================================

impl From<ConversationResponse> for api::ConversationResponseDto {
    fn from(response: ConversationResponse) -> Self {
        let (text_message, audio_data) = content_fields(&response.content);
        Self {
            response_id: response.response_id,
            text_message,
            audio_data,
            language: response.language.into_string(),
            is_final: response.is_final,
            timestamp: to_rfc3339(response.timestamp),
        }
    }
}

impl From<RoomSummary> for api::RoomSummaryDto {
    fn from(summary: RoomSummary) -> Self {
        Self {
            id: summary.id.into_string(),
            subscribers: summary
                .subscribers
                .into_iter()
                .map(UserId::into_string)
                .collect(),
            created_at: to_rfc3339(summary.created_at),
            last_active_at: to_rfc3339(summary.last_active_at),
        }
    }
}

impl From<HistoryMessage> for api::HistoryMessageDto {
    fn from(message: HistoryMessage) -> Self {
        let role = match message.role {
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        };
        Self {
            role: role.to_string(),
            content: message.content,
            created_at: to_rfc3339(message.created_at),
        }
    }
}

impl From<Conversation> for api::ConversationHistoryDto {
    fn from(conversation: Conversation) -> Self {
        Self {
            session_id: conversation.session_id.into_string(),
            started_at: to_rfc3339(conversation.started_at),
            ended_at: conversation.ended_at.map(to_rfc3339),
            messages: conversation.messages.into_iter().map(Into::into).collect(),
        }
    }
}

impl From<ChatMessage> for websocket::ChatMessageDto {
    fn from(message: ChatMessage) -> Self {
        Self {
            id: message.id,
            user_id: message.user_id.into_string(),
            username: message.username,
            content: message.content,
            created_at: to_rfc3339(message.created_at),
        }
    }
}

impl From<ChatEvent> for websocket::ChatEventDto {
    fn from(event: ChatEvent) -> Self {
        let mut dto = Self {
            r#type: websocket::ChatEventType::UserLeft,
            user_id: event.user_id.into_string(),
            username: None,
            session_id: None,
            message: None,
            timestamp: to_rfc3339(event.timestamp),
        };
        match event.payload {
            ChatEventPayload::UserJoined { username } => {
                dto.r#type = websocket::ChatEventType::UserJoined;
                dto.username = Some(username);
            }
            ChatEventPayload::UserLeft => {}
            ChatEventPayload::Message(message) => {
                dto.r#type = websocket::ChatEventType::Message;
                dto.username = Some(message.username.clone());
                dto.message = Some(message.into());
            }
            ChatEventPayload::ConversationStarted { session_id } => {
                dto.r#type = websocket::ChatEventType::ConversationStarted;
                dto.session_id = Some(session_id.into_string());
            }
            ChatEventPayload::ConversationEnded { session_id } => {
                dto.r#type = websocket::ChatEventType::ConversationEnded;
                dto.session_id = Some(session_id.into_string());
            }
        }
        dto
    }
}
