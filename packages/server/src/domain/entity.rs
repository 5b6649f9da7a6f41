//! Entity 定義

use chrono::{DateTime, Utc};

use super::value_object::{SessionId, UserId};

/// チャットルームに投稿されたメッセージ
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub id: String,
    pub user_id: UserId,
    pub username: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// ChatEvent の種類ごとのペイロード
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatEventPayload {
    UserJoined { username: String },
    UserLeft,
    Message(ChatMessage),
    ConversationStarted { session_id: SessionId },
    ConversationEnded { session_id: SessionId },
}

/// 購読者に配信されるイベント
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatEvent {
    pub user_id: UserId,
    pub timestamp: DateTime<Utc>,
    pub payload: ChatEventPayload,
}

impl ChatEvent {
    pub fn user_joined(user_id: UserId, username: String, timestamp: DateTime<Utc>) -> Self {
        Self {
            user_id,
            timestamp,
            payload: ChatEventPayload::UserJoined { username },
        }
    }

    pub fn user_left(user_id: UserId, timestamp: DateTime<Utc>) -> Self {
        Self {
            user_id,
            timestamp,
            payload: ChatEventPayload::UserLeft,
        }
    }

    pub fn message(message: ChatMessage, timestamp: DateTime<Utc>) -> Self {
        Self {
            user_id: message.user_id.clone(),
            timestamp,
            payload: ChatEventPayload::Message(message),
        }
    }

    pub fn conversation_started(
        user_id: UserId,
        session_id: SessionId,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            user_id,
            timestamp,
            payload: ChatEventPayload::ConversationStarted { session_id },
        }
    }

    pub fn conversation_ended(
        user_id: UserId,
        session_id: SessionId,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            user_id,
            timestamp,
            payload: ChatEventPayload::ConversationEnded { session_id },
        }
    }

    /// メッセージイベントの場合は本文を返す
    pub fn message_content(&self) -> Option<&str> {
        match &self.payload {
            ChatEventPayload::Message(message) => Some(message.content.as_str()),
            _ => None,
        }
    }
}

/// 会話履歴メッセージの送信者
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageRole {
    User,
    Assistant,
}

/// 会話履歴の 1 メッセージ
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryMessage {
    pub role: MessageRole,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// ユーザーと AI の会話
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversation {
    pub session_id: SessionId,
    pub user_id: UserId,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub messages: Vec<HistoryMessage>,
}

impl Conversation {
    pub fn new(session_id: SessionId, user_id: UserId, started_at: DateTime<Utc>) -> Self {
        Self {
            session_id,
            user_id,
            started_at,
            ended_at: None,
            messages: Vec::new(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.ended_at.is_none()
    }
}
