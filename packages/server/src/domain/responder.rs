//! 推論サービスへの単発呼び出しの抽象化
//!
//! 起動時に一度だけ実装（リモート／フォールバック）を選び、各ユースケースはこの trait にのみ依存します。

use async_trait::async_trait;

use super::{ConversationRequest, ConversationResponse, Language, SessionId, UpstreamError, UserId};

/// AI 応答の提供者
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Responder: Send + Sync {
    /// 会話セッションを開始し、セッション ID を返す
    async fn start_conversation(
        &self,
        user_id: &UserId,
        username: &str,
        language: &Language,
    ) -> Result<SessionId, UpstreamError>;

    /// 会話セッションを終了
    async fn end_conversation(
        &self,
        session_id: &SessionId,
        user_id: &UserId,
    ) -> Result<(), UpstreamError>;

    /// 発話を送信し、AI の応答を受け取る
    async fn send_message(
        &self,
        request: &ConversationRequest,
    ) -> Result<ConversationResponse, UpstreamError>;
}
