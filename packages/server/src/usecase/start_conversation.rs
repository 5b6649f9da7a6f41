//! UseCase: AI との会話セッション開始

use std::sync::Arc;

use hanashi_shared::time::Clock;

use crate::domain::{
    Conversation, ConversationRepository, Language, Responder, SessionId, SessionRepository,
    UserId,
};

use super::error::StartConversationError;

/// 会話開始のユースケース
///
/// 1. Responder でセッションを開始
/// 2. セッションを active として登録
/// 3. 会話履歴を作成
pub struct StartConversationUseCase {
    responder: Arc<dyn Responder>,
    sessions: Arc<dyn SessionRepository>,
    conversations: Arc<dyn ConversationRepository>,
    clock: Arc<dyn Clock>,
}

impl StartConversationUseCase {
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

    pub async fn execute(
        &self,
        user_id: &UserId,
        username: &str,
        language: &Language,
    ) -> Result<SessionId, StartConversationError> {
        let session_id = self
            .responder
            .start_conversation(user_id, username, language)
            .await?;

        self.conversations
            .create(Conversation::new(
                session_id.clone(),
                user_id.clone(),
                self.clock.now(),
            ))
            .await?;
        self.sessions.activate(session_id.clone()).await;

        tracing::info!("Conversation {} started for user '{}'", session_id, user_id);
        Ok(session_id)
    }
}
