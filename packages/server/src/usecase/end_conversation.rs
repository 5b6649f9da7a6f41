//! UseCase: AI との会話セッション終了

use std::sync::Arc;

use hanashi_shared::time::Clock;

use crate::domain::{ConversationRepository, Responder, SessionId, SessionRepository, UserId};

use super::error::EndConversationError;

/// 会話終了のユースケース
pub struct EndConversationUseCase {
    responder: Arc<dyn Responder>,
    sessions: Arc<dyn SessionRepository>,
    conversations: Arc<dyn ConversationRepository>,
    clock: Arc<dyn Clock>,
}

impl EndConversationUseCase {
    pub fn new(
        responder: Arc<dyn Responder>,
        sessions: Arc<dyn SessionRepository>,
        conversations: Arc<dyn ConversationRepository>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            responder,
            sessions,
            conversations,
            clock,
        }
    }

    /// 会話を終了する。active でないセッションは `SessionNotFound`、
    /// 他のユーザーのセッションは `Forbidden`
    pub async fn execute(
        &self,
        session_id: &SessionId,
        user_id: &UserId,
    ) -> Result<(), EndConversationError> {
        if !self.sessions.is_active(session_id).await {
            return Err(EndConversationError::SessionNotFound(session_id.to_string()));
        }
        let conversation = self.conversations.find(session_id).await?;
        if &conversation.user_id != user_id {
            return Err(EndConversationError::Forbidden(session_id.to_string()));
        }

        self.responder.end_conversation(session_id, user_id).await?;
        self.sessions.remove(session_id).await;
        self.conversations
            .finish(session_id, self.clock.now())
            .await?;

        tracing::info!("Conversation {} ended for user '{}'", session_id, user_id);
        Ok(())
    }
}
