//! UseCase 層のエラー定義

use thiserror::Error;

use crate::domain::{RepositoryError, UpstreamError};

/// チャットメッセージ投稿のエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PostChatMessageError {
    #[error("message content must not be empty")]
    EmptyContent,
}

/// 会話開始のエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StartConversationError {
    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// 会話終了のエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EndConversationError {
    #[error("session not found: {0}")]
    SessionNotFound(String),

    #[error("session {0} belongs to another user")]
    Forbidden(String),

    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// 会話メッセージ送信のエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SendConversationMessageError {
    #[error("session {0} belongs to another user")]
    Forbidden(String),

    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// 音声ストリームの中継を開始できなかった
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BridgeError {
    #[error(transparent)]
    Upstream(#[from] UpstreamError),
}
