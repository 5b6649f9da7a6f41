//! UseCase: AI への発話送信
//!
//! セッション ID 付きの発話は、ユーザーの発話と AI の応答を会話履歴に残します。
//! 推論サービスが失敗した場合、履歴には何も追加しません。

use std::sync::Arc;

use hanashi_shared::time::Clock;

use crate::domain::{
    ConversationRepository, ConversationRequest, ConversationResponse, HistoryMessage,
    MessageRole, RepositoryError, Responder,
};

use super::error::SendConversationMessageError;

pub struct SendConversationMessageUseCase {
    responder: Arc<dyn Responder>,
    conversations: Arc<dyn ConversationRepository>,
    clock: Arc<dyn Clock>,
}

impl SendConversationMessageUseCase {
    pub fn new(
        responder: Arc<dyn Responder>,
        conversations: Arc<dyn ConversationRepository>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            responder,
            conversations,
            clock,
        }
    }

    /// 発話を送信する。セッション付きの場合は呼び出し元のセッションであることを確認し、
    /// 応答が返ってから両方の発話を履歴に追加する
    pub async fn execute(
        &self,
        request: &ConversationRequest,
    ) -> Result<ConversationResponse, SendConversationMessageError> {
        if let Some(session_id) = &request.session_id {
            let conversation = self.conversations.find(session_id).await?;
            if conversation.user_id != request.user_id {
                return Err(SendConversationMessageError::Forbidden(
                    session_id.to_string(),
                ));
            }
            if !conversation.is_active() {
                return Err(RepositoryError::ConstraintViolation(format!(
                    "conversation {} has already ended",
                    session_id
                ))
                .into());
            }
        }

        let sent_at = self.clock.now();
        let response = self.responder.send_message(request).await?;

        if let Some(session_id) = &request.session_id {
            let turns = [
                HistoryMessage {
                    role: MessageRole::User,
                    content: request.content.history_label(),
                    created_at: sent_at,
                },
                HistoryMessage {
                    role: MessageRole::Assistant,
                    content: response.content.history_label(),
                    created_at: response.timestamp,
                },
            ];
            for message in turns {
                self.conversations.append_message(session_id, message).await?;
            }
        }

        tracing::debug!(
            "Response {} returned to user '{}'",
            response.response_id,
            request.user_id
        );
        Ok(response)
    }
}
