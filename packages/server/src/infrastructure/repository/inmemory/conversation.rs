//! InMemory Conversation Repository 実装
//!
//! 会話履歴をメモリ上に保持します。永続化層と同じエラー種別
//! （NotFound / Duplicate / ConstraintViolation）を返すことで、
//! 上位層は永続化の実装に依存せずにエラーを扱えます。

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::domain::{
    Conversation, ConversationRepository, HistoryMessage, RepositoryError, SessionId, UserId,
};

#[derive(Default)]
pub struct InMemoryConversationRepository {
    conversations: Mutex<HashMap<SessionId, Conversation>>,
}

impl InMemoryConversationRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConversationRepository for InMemoryConversationRepository {
    async fn create(&self, conversation: Conversation) -> Result<(), RepositoryError> {
        let mut conversations = self.conversations.lock().await;
        if conversations.contains_key(&conversation.session_id) {
            return Err(RepositoryError::Duplicate(
                conversation.session_id.into_string(),
            ));
        }
        conversations.insert(conversation.session_id.clone(), conversation);
        Ok(())
    }

    async fn find(&self, session_id: &SessionId) -> Result<Conversation, RepositoryError> {
        self.conversations
            .lock()
            .await
            .get(session_id)
            .cloned()
            .ok_or_else(|| RepositoryError::NotFound(session_id.to_string()))
    }

    async fn append_message(
        &self,
        session_id: &SessionId,
        message: HistoryMessage,
    ) -> Result<(), RepositoryError> {
        let mut conversations = self.conversations.lock().await;
        let conversation = conversations
            .get_mut(session_id)
            .ok_or_else(|| RepositoryError::NotFound(session_id.to_string()))?;
        if !conversation.is_active() {
            return Err(RepositoryError::ConstraintViolation(format!(
                "conversation {} has already ended",
                session_id
            )));
        }
        conversation.messages.push(message);
        Ok(())
    }

    async fn finish(
        &self,
        session_id: &SessionId,
        ended_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let mut conversations = self.conversations.lock().await;
        let conversation = conversations
            .get_mut(session_id)
            .ok_or_else(|| RepositoryError::NotFound(session_id.to_string()))?;
        conversation.ended_at.get_or_insert(ended_at);
        Ok(())
    }

    async fn find_by_user(&self, user_id: &UserId) -> Vec<Conversation> {
        let mut result: Vec<Conversation> = self
            .conversations
            .lock()
            .await
            .values()
            .filter(|conversation| &conversation.user_id == user_id)
            .cloned()
            .collect();
        result.sort_by_key(|conversation| conversation.started_at);
        result
    }
}
