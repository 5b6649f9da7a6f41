//! AI 会話のドメインモデル
//!
//! クライアント向け API と推論サービスの両方から独立した、会話リクエスト／レスポンスの表現です。

use chrono::{DateTime, Utc};

use super::value_object::{Language, Plan, SessionId, UserId};

/// 音声レスポンスとして受け付ける最小バイト数（この値を「超える」必要がある）
pub const MIN_AUDIO_RESPONSE_BYTES: usize = 100;

/// 会話の中身（テキストまたは音声のどちらか一方）
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversationContent {
    Text(String),
    Audio(Vec<u8>),
}

impl ConversationContent {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ConversationContent::Text(text) => Some(text),
            ConversationContent::Audio(_) => None,
        }
    }

    /// 履歴に残すための要約表現
    pub fn history_label(&self) -> String {
        match self {
            ConversationContent::Text(text) => text.clone(),
            ConversationContent::Audio(bytes) => format!("[audio: {} bytes]", bytes.len()),
        }
    }
}

/// ユーザーから AI への発話
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationRequest {
    pub user_id: UserId,
    pub username: String,
    pub language: Language,
    /// AI のキャラクター（ペルソナ）
    pub character: String,
    pub session_id: Option<SessionId>,
    pub content: ConversationContent,
}

/// AI からの応答
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationResponse {
    pub response_id: String,
    pub content: ConversationContent,
    pub language: Language,
    pub is_final: bool,
    pub timestamp: DateTime<Utc>,
}

/// 上流ストリームの開始時に一度だけ送る設定
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetupConfig {
    pub user_id: UserId,
    pub username: String,
    pub language: Language,
    pub character: String,
    pub plan: Plan,
}

/// 上流ストリームへ送るフレーム
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpstreamFrame {
    Setup(SetupConfig),
    AudioChunk(Vec<u8>),
    EndOfInput,
}

/// 上流ストリームから受け取るフレーム
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpstreamReply {
    AudioChunk(Vec<u8>),
    TextMessage(String),
}

/// クライアント接続（WebSocket）上のフレーム
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientFrame {
    Binary(Vec<u8>),
    Text(String),
    Close,
}

/// 発話の終了を示すテキストトークン
pub const END_OF_SPEECH_TOKEN: &str = "EOS";
